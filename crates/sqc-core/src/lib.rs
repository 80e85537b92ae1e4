pub mod config;
pub mod coordinator;
pub mod engine;
pub mod entity;
pub mod extract;
pub mod observation;
pub mod session;
pub mod setup;
pub mod snapshot;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod engine_tests;

pub use config::{BridgeConfig, Credentials, StatusPolicy};
pub use coordinator::{Coordinator, RefreshOutcome};
pub use engine::{RefreshEngine, RefreshError};
pub use entity::{entity_states, DeviceIdentity, EntityState};
pub use observation::{observe, ObservationSpec, ObservationValue, Platform, OBSERVATIONS};
pub use session::{DeviceSession, HttpSession, PageResponse, SessionError};
pub use setup::{validate_input, validate_pin, EntryData, EntryStore, SetupError};
pub use snapshot::{BridgeState, RefreshStats, Snapshot};
