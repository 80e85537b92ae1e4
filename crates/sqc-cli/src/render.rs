use std::fmt::Write;

use chrono::Local;
use sqc_core::{BridgeState, DeviceIdentity, EntityState};

pub fn to_json(device: &DeviceIdentity, state: &BridgeState, entities: &[EntityState]) -> serde_json::Value {
    serde_json::json!({
        "device": device,
        "online": state.snapshot.online,
        "fetched_at": state.snapshot.fetched_at,
        "last_update_success": state.last_update_success,
        "last_error": state.last_error,
        "snapshot_error": state.snapshot.error,
        "stats": state.stats,
        "entities": entities,
    })
}

pub fn human(
    device: &DeviceIdentity,
    state: &BridgeState,
    entities: &[EntityState],
) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    writeln!(out, "=== SQC Snapshot ===")?;
    writeln!(
        out,
        "Time:       {}",
        state.snapshot.fetched_at.with_timezone(&Local).to_rfc3339()
    )?;
    writeln!(out, "Device:     {} ({})", device.name, device.manufacturer)?;
    writeln!(
        out,
        "State:      online={} updated={} available={} ok={} err={} logins={}",
        state.snapshot.online,
        state.last_update_success,
        state.available(),
        state.stats.cycles_ok,
        state.stats.cycles_err,
        state.stats.logins,
    )?;

    if let Some(err) = &state.last_error {
        writeln!(out, "Error:      {err}")?;
    } else if let Some(err) = &state.snapshot.error {
        writeln!(out, "Offline:    {err}")?;
    }

    for entity in entities {
        let value = match (&entity.value, entity.available) {
            (Some(value), true) => value.to_string(),
            (_, false) => "unavailable".to_string(),
            (None, true) => "unknown".to_string(),
        };
        let unit = entity.unit.map(|u| format!(" {u}")).unwrap_or_default();
        writeln!(out, "  {:<18} {value}{unit}", entity.name)?;
    }

    Ok(out)
}
