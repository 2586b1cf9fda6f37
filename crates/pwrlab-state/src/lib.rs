//! ---
//! pwl_section: "01-core-functionality"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "Canonical in-memory model of the simulated plant."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
//! Canonical in-memory model of the simulated plant: the generator front
//! panel, the seven power-load indicators, and the substation telemetry
//! registers. All mutation goes through [`StateStore`], which owns one lock
//! per logical store so a reader never observes a half-applied merge.

pub mod generator;
pub mod load;
pub mod scenario;
pub mod store;

/// Shared result type for state operations.
pub type Result<T> = std::result::Result<T, StateError>;

/// Errors raised by the state store and the scenario table.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Scenario CSV could not be read.
    #[error("scenario table io error: {0}")]
    Io(#[from] std::io::Error),
    /// Scenario CSV could not be parsed.
    #[error("scenario table parse error: {0}")]
    Csv(#[from] csv::Error),
    /// Scenario CSV rows violated the fixed schema.
    #[error("scenario table schema error: {0}")]
    Schema(String),
    /// No canned snapshot exists for the requested (tag, load) bucket.
    #[error("no scenario rows for tag {tag} at load level {load}")]
    EmptyBucket {
        /// Normal/attack tag of the failed lookup.
        tag: &'static str,
        /// Load level of the failed lookup.
        load: usize,
    },
    /// State serialization failed.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub use generator::GeneratorState;
pub use load::{LoadPatch, LoadState};
pub use scenario::{ScenarioTable, ScenarioTag, REGISTER_COUNT};
pub use store::StateStore;
