use serde::Serialize;

use crate::extract;
use crate::observation::{observe_spec, ObservationSpec, ObservationValue, Platform, StateClass, OBSERVATIONS};
use crate::snapshot::{BridgeState, Snapshot};

pub const DOMAIN: &str = "sqc";
pub const MANUFACTURER: &str = "SeaQuaComp";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    pub identifiers: (String, String),
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

impl DeviceIdentity {
    /// The page title names the device; it doubles as the model.
    pub fn from_snapshot(entry_id: &str, snapshot: &Snapshot) -> Self {
        let title = extract::device_title_or_default(snapshot.body());
        Self {
            identifiers: (DOMAIN.to_string(), entry_id.to_string()),
            name: title.clone(),
            manufacturer: MANUFACTURER.to_string(),
            model: title,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityState {
    pub unique_id: String,
    pub key: &'static str,
    pub name: &'static str,
    pub platform: Platform,
    pub unit: Option<&'static str>,
    pub device_class: Option<&'static str>,
    pub state_class: Option<StateClass>,
    pub value: Option<ObservationValue>,
    pub available: bool,
}

pub fn unique_id(entry_id: &str, key: &str) -> String {
    format!("{entry_id}_{key}")
}

pub fn entity_state(entry_id: &str, state: &BridgeState, spec: &ObservationSpec) -> EntityState {
    EntityState {
        unique_id: unique_id(entry_id, spec.key),
        key: spec.key,
        name: spec.name,
        platform: spec.platform,
        unit: spec.unit,
        device_class: spec.device_class,
        state_class: spec.state_class,
        value: observe_spec(&state.snapshot, spec),
        available: state.available(),
    }
}

pub fn entity_states(entry_id: &str, state: &BridgeState) -> Vec<EntityState> {
    OBSERVATIONS
        .iter()
        .map(|spec| entity_state(entry_id, state, spec))
        .collect()
}
