//! Fixed-pattern extraction of controller readings from the dashboard HTML.
//!
//! Every function here is pure and returns `None` when its pattern is not on
//! the page. Only the first occurrence of a regex pattern is considered.

use std::sync::LazyLock;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use regex::Regex;
use tracing::warn;

pub const UNKNOWN_DEVICE: &str = "Unknown Device";

pub const RESTART_FORMAT: &str = "%Y-%m-%d %H:%M";

pub const ALARM_VOCABULARY: [&str; 9] = [
    "brak",
    "none",
    "wysoka temperatura",
    "niska temperatura",
    "wysokie ph",
    "niskie ph",
    "wysokie co2",
    "niskie co2",
    "awaria czujnika",
];

const PH_CONTROL_ON: [&str; 2] = ["Sterowanie pH:  <b>ON</b>", "Sterowanie pH:  ON"];
const PH_CONTROL_OFF: [&str; 2] = ["Sterowanie pH:  <b>OFF</b>", "Sterowanie pH:  OFF"];

static TITLE: LazyLock<Regex> = LazyLock::new(|| compile(r"<title>(.+)</title>"));
static TEMPERATURE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"Temperatura = (\d+(?:\.\d+)?)ºC"));
static PH: LazyLock<Regex> = LazyLock::new(|| compile(r"pH = (\d+(?:\.\d+)?) \[pH\]"));
static CO2: LazyLock<Regex> =
    LazyLock::new(|| compile(r"CO<sub>2</sub> = <b>(\d+(?:\.\d+)?) ppm</b>"));
static CO2_HOURS: LazyLock<Regex> =
    LazyLock::new(|| compile(r"Licznik CO2: (?:<b>)?(\d+(?:\.\d+)?)(?:</b>)? godz\."));
static CO2_RESTART: LazyLock<Regex> =
    LazyLock::new(|| compile(r"Data restartu CO2: (?:<b>)?(\d{4}-\d{2}-\d{2} \d{2}:\d{2})"));
static ALARM: LazyLock<Regex> = LazyLock::new(|| compile(r"Alarm: <b>([^<]+)</b>"));

// Patterns are literals; every one is exercised by extract_tests.
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("extraction pattern must compile")
}

fn capture<'a>(re: &Regex, html: &'a str) -> Option<&'a str> {
    re.captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn capture_number(re: &Regex, html: &str) -> Option<f64> {
    capture(re, html).and_then(|raw| raw.parse::<f64>().ok())
}

pub fn device_title(html: &str) -> Option<String> {
    capture(&TITLE, html).map(str::to_string)
}

pub fn device_title_or_default(html: Option<&str>) -> String {
    html.and_then(device_title)
        .unwrap_or_else(|| UNKNOWN_DEVICE.to_string())
}

pub fn temperature(html: &str) -> Option<f64> {
    capture_number(&TEMPERATURE, html)
}

pub fn ph(html: &str) -> Option<f64> {
    capture_number(&PH, html)
}

pub fn co2_ppm(html: &str) -> Option<f64> {
    capture_number(&CO2, html)
}

pub fn co2_hours(html: &str) -> Option<f64> {
    capture_number(&CO2_HOURS, html)
}

pub fn co2_restart(html: &str) -> Option<DateTime<Local>> {
    capture(&CO2_RESTART, html).and_then(|raw| parse_restart(raw, &Local))
}

/// Parses a restart stamp as wall-clock time in `tz`.
///
/// Invalid or nonexistent local times are logged and dropped.
pub fn parse_restart<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<DateTime<Tz>> {
    let naive = match NaiveDateTime::parse_from_str(raw.trim(), RESTART_FORMAT) {
        Ok(naive) => naive,
        Err(err) => {
            warn!(value = raw, %err, "unparseable co2 restart date");
            return None;
        }
    };

    let localized = tz.from_local_datetime(&naive).earliest();
    if localized.is_none() {
        warn!(value = raw, "co2 restart date does not exist in local zone");
    }
    localized
}

pub fn alarm(html: &str) -> Option<String> {
    capture(&ALARM, html)
        .map(|raw| raw.trim().to_lowercase())
        .filter(|text| !text.is_empty())
}

pub fn is_known_alarm(value: &str) -> bool {
    ALARM_VOCABULARY.contains(&value)
}

/// Literal match anywhere on the page; the ON forms win over the OFF forms.
pub fn ph_control(html: &str) -> Option<bool> {
    if PH_CONTROL_ON.iter().any(|literal| html.contains(literal)) {
        Some(true)
    } else if PH_CONTROL_OFF.iter().any(|literal| html.contains(literal)) {
        Some(false)
    } else {
        None
    }
}
