//! ---
//! pwl_section: "01-core-functionality"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "Control-plane runtime: dispatch, attack sequencing, auto control, supervisor."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
//! One request at a time: classify the payload, route it to the state store
//! or the device manager, produce the reply. Stateless between requests.
//! A malformed envelope fails only its own request with the fixed
//! diagnostic; the dispatcher itself never falls over.

use std::sync::Arc;

use pwrlab_proto::{
    Command, GenPatch, GetTarget, Mode, PlcPatch, Request, CANNOT_HANDLE, SET_DONE,
};
use pwrlab_state::StateError;
use tracing::{debug, warn};

use crate::attack::AttackEngine;
use crate::Plant;

/// What the transport layer should do with a handled request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Write this reply back to the peer.
    Reply(String),
    /// Handled, no reply expected (attack control tokens).
    Silent,
    /// Empty/logout payload: end the current server-side receive loop.
    Terminate,
}

/// Routes decoded requests over the shared plant handle.
#[derive(Clone)]
pub struct CommandDispatcher {
    plant: Arc<Plant>,
    engine: AttackEngine,
}

impl CommandDispatcher {
    pub fn new(plant: Arc<Plant>, engine: AttackEngine) -> Self {
        Self { plant, engine }
    }

    /// Classify and handle one raw payload.
    pub async fn handle(&self, payload: &[u8]) -> Outcome {
        let request = match Request::parse(payload) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "cannot handle request");
                return Outcome::Reply(CANNOT_HANDLE.to_owned());
            }
        };
        debug!(?request, "request decoded");
        match request {
            Request::Terminate => Outcome::Terminate,
            Request::AttackStart(script) => {
                self.engine.start(script);
                Outcome::Silent
            }
            Request::AttackStop => {
                self.engine.stop().await;
                Outcome::Silent
            }
            Request::Command(command) => Outcome::Reply(self.dispatch(command).await),
        }
    }

    async fn dispatch(&self, command: Command) -> String {
        match command {
            Command::Get(GetTarget::Con) => {
                let devices = self.plant.devices.lock().await;
                reply_or_diag(serde_json::to_string(&devices.connectivity()).map_err(Into::into))
            }
            Command::Get(GetTarget::Gen) => reply_or_diag(self.plant.store.gen_json()),
            Command::Get(GetTarget::Load) => reply_or_diag(self.plant.store.load_json()),
            Command::Get(GetTarget::MdBs) => {
                let body = self.plant.store.modbus_string();
                reply_or_diag(
                    serde_json::to_string(&serde_json::json!({"Cmd": "MdBs", "Param": body}))
                        .map_err(Into::into),
                )
            }
            Command::SetGen(patch) => self.set_gen(patch).await,
            Command::SetPLC(patch) => self.set_plc(patch).await,
            Command::SetALC(enabled) => {
                let mode = if enabled { Mode::Auto } else { Mode::Manual };
                self.plant.store.set_mode(mode);
                SET_DONE.to_owned()
            }
            Command::GetSub(_) => {
                reply_or_diag(self.plant.store.sub_json(self.plant.session.stealth_active()))
            }
        }
    }

    /// Merge along the serial-projection path and, when the deployment has a
    /// microcontroller wired, push the fixed-arity delta down the line.
    async fn set_gen(&self, patch: GenPatch) -> String {
        let wire = self.plant.store.merge_gen(&patch);
        if self.plant.forward_serial {
            let mut devices = self.plant.devices.lock().await;
            if let Err(err) = devices.serial_frame(&wire).await {
                warn!(error = %err, "serial forward failed");
            }
        }
        reply_or_diag(self.plant.store.gen_json())
    }

    /// Run the recognized actuator sequences, then merge unconditionally --
    /// the stored panel state reflects the request, not actuator success.
    async fn set_plc(&self, patch: PlcPatch) -> String {
        {
            let mut devices = self.plant.devices.lock().await;
            if let Some(mpwr) = patch.mpwr {
                // a manual main-power action always takes control back
                self.plant.store.set_mode(Mode::Manual);
                devices.set_main_power(mpwr).await;
            }
            if let Some(spwr) = patch.spwr {
                devices.set_sensor_power(spwr).await;
            }
            if let Some(pspd) = patch.pspd {
                devices.set_pump_speed(pspd).await;
            }
            if let Some(mspd) = patch.mspd {
                devices.set_moto_speed(mspd).await;
            }
        }
        self.plant.store.merge_plc(&patch);
        reply_or_diag(self.plant.store.gen_json())
    }
}

fn reply_or_diag(result: Result<String, StateError>) -> String {
    match result {
        Ok(reply) => reply,
        Err(err) => {
            warn!(error = %err, "request handling failed");
            CANNOT_HANDLE.to_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sim_plant;
    use pwrlab_device::PlcId;
    use serde_json::Value;

    async fn dispatcher() -> (CommandDispatcher, Arc<Plant>, pwrlab_device::SimulatedBank) {
        let (plant, bank) = sim_plant().await;
        let engine = AttackEngine::new(Arc::clone(&plant));
        (
            CommandDispatcher::new(Arc::clone(&plant), engine),
            plant,
            bank,
        )
    }

    async fn reply(dispatcher: &CommandDispatcher, payload: &[u8]) -> Value {
        let Outcome::Reply(body) = dispatcher.handle(payload).await else {
            panic!("expected a reply for {:?}", payload);
        };
        serde_json::from_str(&body).expect("reply is json")
    }

    #[tokio::test]
    async fn get_gen_returns_defaults() {
        let (dispatcher, _plant, _bank) = dispatcher().await;
        let gen = reply(&dispatcher, br#"{"Cmd":"Get","Parm":"Gen"}"#).await;
        assert_eq!(gen["Freq"], "50.00");
        assert_eq!(gen["Sirn"], "off");
        assert_eq!(gen["Mpwr"], "on");
        assert_eq!(gen["Mode"], 0);
    }

    #[tokio::test]
    async fn set_plc_runs_actuator_and_merges() {
        let (dispatcher, _plant, bank) = dispatcher().await;
        let gen = reply(&dispatcher, br#"{"Cmd":"SetPLC","Parm":{"Pspd":"high"}}"#).await;
        assert_eq!(gen["Pspd"], "high");
        assert_eq!(gen["Mode"], 0);
        assert_eq!(bank.written(PlcId::Plc1, "M4"), Some(1));
        assert_eq!(bank.written(PlcId::Plc1, "M5"), Some(0));
    }

    #[tokio::test]
    async fn set_main_power_disables_auto_mode() {
        let (dispatcher, plant, bank) = dispatcher().await;
        assert_eq!(
            dispatcher.handle(br#"{"Cmd":"SetALC","Parm":true}"#).await,
            Outcome::Reply(SET_DONE.to_owned())
        );
        assert_eq!(plant.store.mode(), Mode::Auto);

        let gen = reply(&dispatcher, br#"{"Cmd":"SetPLC","Parm":{"Mpwr":"off"}}"#).await;
        assert_eq!(gen["Mpwr"], "off");
        assert_eq!(plant.store.mode(), Mode::Manual);
        assert_eq!(bank.written(PlcId::Plc1, "M0"), Some(0));
    }

    #[tokio::test]
    async fn set_gen_forwards_projection_to_serial() {
        let (dispatcher, _plant, bank) = dispatcher().await;
        let gen = reply(
            &dispatcher,
            br#"{"Cmd":"SetGen","Parm":{"Freq":"49.80","Sirn":"on"}}"#,
        )
        .await;
        assert_eq!(gen["Freq"], "49.80");
        assert_eq!(
            bank.serial_frames().last().map(String::as_str),
            Some("49.80:-:-:-:-:-:-:on")
        );
    }

    #[tokio::test]
    async fn get_sub_returns_full_register_map() {
        let (dispatcher, _plant, _bank) = dispatcher().await;
        let sub = reply(&dispatcher, br#"{"Cmd":"GetSub","Parm":{}}"#).await;
        let map = sub.as_object().expect("object");
        assert_eq!(map.len(), 11);
        assert_eq!(map["ff10"], "1");
    }

    #[tokio::test]
    async fn malformed_envelope_gets_fixed_diagnostic_and_dispatcher_survives() {
        let (dispatcher, _plant, _bank) = dispatcher().await;
        assert_eq!(
            dispatcher.handle(b"{\"Cmd\":\"Reboot\"}").await,
            Outcome::Reply(CANNOT_HANDLE.to_owned())
        );
        // the next request still works
        let gen = reply(&dispatcher, br#"{"Cmd":"Get","Parm":"Gen"}"#).await;
        assert_eq!(gen["Freq"], "50.00");
    }

    #[tokio::test]
    async fn terminate_tokens_end_the_loop() {
        let (dispatcher, _plant, _bank) = dispatcher().await;
        assert_eq!(dispatcher.handle(b"").await, Outcome::Terminate);
        assert_eq!(dispatcher.handle(b"logout").await, Outcome::Terminate);
    }
}
