//! Lookup tables mapping `(channel, measurement, type)` tuples to canonical metrics.
//!
//! A `None` channel or type matches anything. Matching ignores ASCII case.

use super::Scale;
use crate::datamodel::unit::Unit;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableEntry {
    pub channel: Option<&'static str>,
    pub measurement: &'static str,
    pub kind: Option<&'static str>,
    pub metric: &'static str,
    pub unit: Unit,
    pub scale: Scale,
}

const fn row(
    channel: Option<&'static str>,
    measurement: &'static str,
    kind: Option<&'static str>,
    metric: &'static str,
    unit: Unit,
    scale: Scale,
) -> TableEntry {
    TableEntry {
        channel,
        measurement,
        kind,
        metric,
        unit,
        scale,
    }
}

pub const INVERTER_MEASUREMENTS: &[TableEntry] = &[
    row(Some("BATTERY"), "Voltage", None, "battery_voltage", Unit::Volt, Scale::MILLI),
    row(Some("BATTERY"), "ChargeCurrent", None, "battery_current", Unit::Ampere, Scale::MILLI),
    row(Some("BATTERY"), "Capacity", None, "battery_capacity", Unit::Percent, Scale::IDENTITY),
    row(Some("GRID"), "Voltage", Some("Ac"), "grid_voltage", Unit::Volt, Scale::MILLI),
    row(Some("GRID"), "Frequency", None, "grid_frequency", Unit::Hertz, Scale::MILLI),
    // The current transformers own `grid_power`, the inverter's own reading is kept apart.
    row(Some("GRID"), "Power", Some("Active"), "inverter_grid_power", Unit::Watt, Scale::MILLI),
];

pub const BATTERY_MODULE_INFO: &[TableEntry] = &[
    row(None, "StateOfHealth", Some("Avg"), "soh", Unit::Percent, Scale::IDENTITY),
    row(None, "StateOfHealth", Some("Min"), "soh_min", Unit::Percent, Scale::IDENTITY),
    row(None, "CycleNumber", Some("Avg"), "cycle_count_avg", Unit::Cycles, Scale::IDENTITY),
    row(None, "CycleNumber", Some("Max"), "cycle_count_max", Unit::Cycles, Scale::IDENTITY),
    row(None, "CellTemperature", Some("Avg"), "cell_temp_avg", Unit::Celsius, Scale::MILLI),
    row(None, "CellTemperature", Some("Max"), "cell_temp_max", Unit::Celsius, Scale::MILLI),
    row(None, "CellTemperature", Some("Min"), "cell_temp_min", Unit::Celsius, Scale::MILLI),
    row(None, "BMSTemperature", Some("Avg"), "bms_temp_avg", Unit::Celsius, Scale::MILLI),
    row(None, "BMSTemperature", Some("Max"), "bms_temp_max", Unit::Celsius, Scale::MILLI),
    row(None, "CellVoltage", Some("Max"), "cell_voltage_max", Unit::Volt, Scale::MILLI),
    row(None, "CellVoltage", Some("Min"), "cell_voltage_min", Unit::Volt, Scale::MILLI),
    row(None, "ModuleVoltage", Some("Avg"), "module_voltage_avg", Unit::Volt, Scale::MILLI),
    row(None, "Current", Some("Total"), "battery_current_total", Unit::Ampere, Scale::MILLI),
    row(None, "ChargeVoltageLimit", None, "charge_voltage_limit", Unit::Volt, Scale::MILLI),
    row(None, "DischargeVoltageLimit", None, "discharge_voltage_limit", Unit::Volt, Scale::MILLI),
    row(None, "ChargeCurrentLimit", None, "charge_current_limit", Unit::Ampere, Scale::MILLI),
    row(
        None,
        "DischargeCurrentLimit",
        None,
        "discharge_current_limit",
        Unit::Ampere,
        Scale::MILLI.absolute(),
    ),
];

/// Current-transformer clamps. The HOUSE and LOCAL clamps are cross-wired in the
/// installation: HOUSE reads the grid connection and LOCAL (GRID on some firmware)
/// reads the house consumption.
pub const CURRENT_TRANSFORMERS: &[TableEntry] = &[
    row(Some("HOUSE"), "Power", Some("Active"), "grid_power", Unit::Watt, Scale::MILLI),
    row(Some("LOCAL"), "Power", Some("Active"), "house_power", Unit::Watt, Scale::MILLI),
    row(Some("GRID"), "Power", Some("Active"), "house_power", Unit::Watt, Scale::MILLI),
    row(Some("AUX1"), "Power", Some("Active"), "aux_power", Unit::Watt, Scale::MILLI),
];

fn matches(expected: Option<&str>, actual: Option<&str>) -> bool {
    match expected {
        None => true,
        Some(expected) => actual.is_some_and(|actual| actual.eq_ignore_ascii_case(expected)),
    }
}

pub fn lookup<'t>(
    table: &'t [TableEntry],
    channel: Option<&str>,
    measurement: Option<&str>,
    kind: Option<&str>,
) -> Option<&'t TableEntry> {
    table.iter().find(|entry| {
        matches(entry.channel, channel)
            && matches(Some(entry.measurement), measurement)
            && matches(entry.kind, kind)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_wildcards() {
        let entry = lookup(
            INVERTER_MEASUREMENTS,
            Some("BATTERY"),
            Some("Voltage"),
            Some("Dc"),
        )
        .unwrap();
        assert_eq!(entry.metric, "battery_voltage");

        let entry = lookup(INVERTER_MEASUREMENTS, Some("BATTERY"), Some("Voltage"), None).unwrap();
        assert_eq!(entry.metric, "battery_voltage");
    }

    #[test]
    fn test_lookup_requires_type_when_specified() {
        assert!(lookup(INVERTER_MEASUREMENTS, Some("GRID"), Some("Voltage"), Some("Dc")).is_none());
        assert!(lookup(INVERTER_MEASUREMENTS, Some("GRID"), Some("Voltage"), None).is_none());
    }

    #[test]
    fn test_lookup_ignores_case() {
        let entry = lookup(CURRENT_TRANSFORMERS, Some("house"), Some("power"), Some("active")).unwrap();
        assert_eq!(entry.metric, "grid_power");
    }

    #[test]
    fn test_lookup_missing_measurement() {
        assert!(lookup(BATTERY_MODULE_INFO, None, None, Some("Avg")).is_none());
    }

    #[test]
    fn test_tables_have_unique_keys() {
        for table in [INVERTER_MEASUREMENTS, BATTERY_MODULE_INFO, CURRENT_TRANSFORMERS] {
            for (i, a) in table.iter().enumerate() {
                for b in &table[i + 1..] {
                    assert!(
                        !(a.channel == b.channel && a.measurement == b.measurement && a.kind == b.kind),
                        "duplicate table key for {}",
                        a.metric
                    );
                }
            }
        }
    }
}
