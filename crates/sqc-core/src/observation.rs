use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::warn;

use crate::extract;
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ObservationValue {
    Float(f64),
    Timestamp(DateTime<Local>),
    Text(String),
    Bool(bool),
}

impl ObservationValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ObservationValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ObservationValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ObservationValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObservationValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObservationValue::Float(v) => write!(f, "{v}"),
            ObservationValue::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            ObservationValue::Text(v) => write!(f, "{v}"),
            ObservationValue::Bool(true) => write!(f, "on"),
            ObservationValue::Bool(false) => write!(f, "off"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Sensor,
    BinarySensor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    Measurement,
    TotalIncreasing,
}

/// One row of the observation table.
#[derive(Clone, Copy)]
pub struct ObservationSpec {
    pub key: &'static str,
    pub name: &'static str,
    pub platform: Platform,
    pub unit: Option<&'static str>,
    pub device_class: Option<&'static str>,
    pub state_class: Option<StateClass>,
    extractor: fn(&str) -> Option<ObservationValue>,
}

impl std::fmt::Debug for ObservationSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservationSpec")
            .field("key", &self.key)
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

impl ObservationSpec {
    pub fn extract(&self, html: &str) -> Option<ObservationValue> {
        (self.extractor)(html)
    }
}

pub static OBSERVATIONS: [ObservationSpec; 7] = [
    ObservationSpec {
        key: "water_temp",
        name: "Water Temperature",
        platform: Platform::Sensor,
        unit: Some("°C"),
        device_class: Some("temperature"),
        state_class: Some(StateClass::Measurement),
        extractor: |html| extract::temperature(html).map(ObservationValue::Float),
    },
    ObservationSpec {
        key: "water_ph",
        name: "Water pH",
        platform: Platform::Sensor,
        unit: None,
        device_class: Some("ph"),
        state_class: Some(StateClass::Measurement),
        extractor: |html| extract::ph(html).map(ObservationValue::Float),
    },
    ObservationSpec {
        key: "water_co2",
        name: "Water CO2",
        platform: Platform::Sensor,
        unit: Some("ppm"),
        device_class: Some("co2"),
        state_class: Some(StateClass::Measurement),
        extractor: |html| extract::co2_ppm(html).map(ObservationValue::Float),
    },
    ObservationSpec {
        key: "co2_runtime",
        name: "CO2 Runtime",
        platform: Platform::Sensor,
        unit: Some("h"),
        device_class: Some("duration"),
        state_class: Some(StateClass::TotalIncreasing),
        extractor: |html| extract::co2_hours(html).map(ObservationValue::Float),
    },
    ObservationSpec {
        key: "co2_restart",
        name: "CO2 Restart",
        platform: Platform::Sensor,
        unit: None,
        device_class: Some("timestamp"),
        state_class: None,
        extractor: |html| extract::co2_restart(html).map(ObservationValue::Timestamp),
    },
    ObservationSpec {
        key: "alarm",
        name: "Alarm",
        platform: Platform::Sensor,
        unit: None,
        device_class: Some("enum"),
        state_class: None,
        extractor: |html| extract::alarm(html).map(ObservationValue::Text),
    },
    ObservationSpec {
        key: "ph_control",
        name: "PH Control",
        platform: Platform::BinarySensor,
        unit: None,
        device_class: None,
        state_class: None,
        extractor: |html| extract::ph_control(html).map(ObservationValue::Bool),
    },
];

pub fn spec_for(key: &str) -> Option<&'static ObservationSpec> {
    OBSERVATIONS.iter().find(|spec| spec.key == key)
}

/// Derives one observation from `snapshot`, or `None` when it is unknown.
///
/// An offline snapshot or one without a body never yields a value.
pub fn observe(snapshot: &Snapshot, key: &str) -> Option<ObservationValue> {
    let Some(spec) = spec_for(key) else {
        warn!(key, "no such observation");
        return None;
    };
    observe_spec(snapshot, spec)
}

pub fn observe_spec(snapshot: &Snapshot, spec: &ObservationSpec) -> Option<ObservationValue> {
    let Some(html) = snapshot.body() else {
        warn!(key = spec.key, "no sensor data available");
        return None;
    };

    let value = spec.extract(html);
    if value.is_none() {
        warn!(key = spec.key, "pattern not found on status page");
    }
    value
}
