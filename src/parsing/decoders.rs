//! One pure decoder per topic suffix.

use super::payload::{number, number_field, str_field};
use super::tables::{self, TableEntry};
use super::{DecodeError, Decoded, Payload, Reading, Scale, TopicSuffix};
use crate::datamodel::unit::Unit;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

type Object = Map<String, Value>;

/// Keys of an alarm report that are not alarm flags.
const ALARM_NON_FLAG_KEYS: [&str; 2] = ["timestamp", "warnings_summary"];
/// Temperatures piggybacked on the alarm report.
const ALARM_TEMPERATURE_KEYS: [&str; 3] = [
    "inverter_temperature",
    "boost_temperature",
    "inner_temperature",
];

pub fn decode(suffix: TopicSuffix, payload: &Payload) -> Result<Decoded, DecodeError> {
    match suffix {
        TopicSuffix::StateOfCharge => decode_state_of_charge(payload),
        TopicSuffix::InverterMeasurements => {
            decode_table(suffix, payload, tables::INVERTER_MEASUREMENTS)
        }
        TopicSuffix::InverterAlarms => decode_inverter_alarms(payload),
        TopicSuffix::InverterCharge => decode_fields(
            suffix,
            payload,
            &[("power", "battery_power", Unit::Watt)],
        ),
        TopicSuffix::BatteryModuleInfo => {
            decode_table(suffix, payload, tables::BATTERY_MODULE_INFO)
        }
        TopicSuffix::CurrentTransformers => {
            decode_table(suffix, payload, tables::CURRENT_TRANSFORMERS)
        }
        TopicSuffix::ScheduleEvent => decode_fields(
            suffix,
            payload,
            &[
                ("event", "schedule_event", Unit::None),
                ("setpoint", "schedule_setpoint", Unit::Watt),
            ],
        ),
        TopicSuffix::MaxPower => decode_fields(
            suffix,
            payload,
            &[
                ("ChgPower", "max_charge_power", Unit::Watt),
                ("DchgPower", "max_discharge_power", Unit::Watt),
            ],
        ),
        TopicSuffix::EpsStatus => decode_fields(
            suffix,
            payload,
            &[
                ("Reserve", "eps_reserve", Unit::Percent),
                ("Mode", "eps_mode", Unit::None),
            ],
        ),
        TopicSuffix::EpsSchedule => decode_eps_schedule(payload),
        TopicSuffix::SafetyCheck => decode_safety_check(payload),
    }
}

/// Tuple-list payloads, a bare object counts as a one-element list.
fn tuple_list(suffix: TopicSuffix, payload: &Payload) -> Result<Vec<&Object>, DecodeError> {
    match payload.as_json() {
        Some(Value::Array(items)) => Ok(items.iter().filter_map(Value::as_object).collect()),
        Some(Value::Object(object)) => Ok(vec![object]),
        _ => Err(DecodeError::UnexpectedShape {
            suffix,
            expected: "a list of measurement objects",
        }),
    }
}

/// Object payloads, a list is reduced to its first element.
fn single_object(suffix: TopicSuffix, payload: &Payload) -> Result<Option<&Object>, DecodeError> {
    match payload.as_json() {
        Some(Value::Object(object)) => Ok(Some(object)),
        Some(Value::Array(items)) => Ok(items.first().and_then(Value::as_object)),
        _ => Err(DecodeError::UnexpectedShape {
            suffix,
            expected: "an object",
        }),
    }
}

fn table_reading(entry: &TableEntry, raw_value: f64) -> Reading {
    Reading::new(entry.metric, raw_value, entry.unit, entry.scale)
}

fn decode_table(
    suffix: TopicSuffix,
    payload: &Payload,
    table: &[TableEntry],
) -> Result<Decoded, DecodeError> {
    let mut readings = Vec::new();
    for item in tuple_list(suffix, payload)? {
        let Some(raw_value) = number_field(item, "value") else {
            debug!("Skipping tuple without a numeric value on {}: {:?}", suffix, item);
            continue;
        };
        let entry = tables::lookup(
            table,
            str_field(item, "channel"),
            str_field(item, "measurement"),
            str_field(item, "type"),
        );
        if let Some(entry) = entry {
            readings.push(table_reading(entry, raw_value));
        }
    }
    Ok(Decoded::from_readings(readings))
}

fn decode_fields(
    suffix: TopicSuffix,
    payload: &Payload,
    fields: &[(&str, &str, Unit)],
) -> Result<Decoded, DecodeError> {
    let Some(object) = single_object(suffix, payload)? else {
        return Ok(Decoded::default());
    };
    let readings = fields
        .iter()
        .filter_map(|(key, metric, unit)| {
            number_field(object, key).map(|raw| Reading::new(*metric, raw, *unit, Scale::IDENTITY))
        })
        .collect();
    Ok(Decoded::from_readings(readings))
}

fn soc_reading(raw_value: f64) -> Reading {
    Reading::new("soc", raw_value, Unit::Percent, Scale::CENTI)
}

/// `bms/soc`, either a measurement list or the legacy `{usable_soc}` object.
///
/// The reading produced here has not been through the outlier filter yet.
fn decode_state_of_charge(payload: &Payload) -> Result<Decoded, DecodeError> {
    let suffix = TopicSuffix::StateOfCharge;
    if let Some(Value::Object(object)) = payload.as_json() {
        if !object.contains_key("measurement") {
            let raw = number_field(object, "usable_soc")
                .or_else(|| number_field(object, "StateOfCharge"));
            return Ok(Decoded::from_readings(raw.map(soc_reading).into_iter().collect()));
        }
    }

    let reading = tuple_list(suffix, payload)?
        .into_iter()
        .find(|item| str_field(item, "measurement") == Some("StateOfCharge"))
        .and_then(|item| number_field(item, "value"))
        .map(soc_reading);
    Ok(Decoded::from_readings(reading.into_iter().collect()))
}

fn alarm_flag(value: &Value) -> bool {
    match value {
        Value::String(s) => s.trim() == "1",
        Value::Number(n) => n.as_f64() == Some(1.0),
        Value::Bool(b) => *b,
        _ => false,
    }
}

fn decode_inverter_alarms(payload: &Payload) -> Result<Decoded, DecodeError> {
    let suffix = TopicSuffix::InverterAlarms;
    let Some(object) = single_object(suffix, payload)? else {
        return Ok(Decoded::default());
    };

    let mut readings = Vec::new();
    let mut alarms = BTreeMap::new();
    for (key, value) in object {
        if ALARM_TEMPERATURE_KEYS.contains(&key.as_str()) {
            if let Some(raw) = number(value) {
                readings.push(Reading::new(key.as_str(), raw, Unit::Celsius, Scale::IDENTITY));
            }
        } else if !ALARM_NON_FLAG_KEYS.contains(&key.as_str()) {
            alarms.insert(key.clone(), alarm_flag(value));
        }
    }

    Ok(Decoded {
        readings,
        alarms: (!alarms.is_empty()).then_some(alarms),
    })
}

fn decode_eps_schedule(payload: &Payload) -> Result<Decoded, DecodeError> {
    let suffix = TopicSuffix::EpsSchedule;
    let Some(object) = single_object(suffix, payload)? else {
        return Ok(Decoded::default());
    };

    let mut readings = Vec::new();
    if let Some(raw) = number_field(object, "reserved_soc") {
        readings.push(Reading::new(
            "eps_schedule_reserve",
            raw,
            Unit::Percent,
            Scale::IDENTITY,
        ));
    }
    match object.get("event") {
        None | Some(Value::Null) => {}
        Some(event) => {
            let raw = if event.as_str() == Some("on") { 1.0 } else { 0.0 };
            readings.push(Reading::new(
                "eps_schedule_event",
                raw,
                Unit::None,
                Scale::IDENTITY,
            ));
        }
    }
    Ok(Decoded::from_readings(readings))
}

fn decode_safety_check(payload: &Payload) -> Result<Decoded, DecodeError> {
    let suffix = TopicSuffix::SafetyCheck;
    let Some(object) = single_object(suffix, payload)? else {
        return Ok(Decoded::default());
    };

    let readings = object
        .iter()
        .filter_map(|(key, value)| {
            let raw = match value {
                Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
                Value::Number(_) => number(value),
                _ => None,
            };
            raw.map(|raw| {
                Reading::new(
                    format!("safetycheck_{}", key),
                    raw,
                    Unit::None,
                    Scale::IDENTITY,
                )
            })
        })
        .collect();
    Ok(Decoded::from_readings(readings))
}
