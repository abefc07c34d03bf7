//! Topics and payloads as published by a PV3 device.

pub const DEVICE_ID: &str = "PV001001DEV";

pub fn topic(suffix: &str) -> String {
    topic_for(DEVICE_ID, suffix)
}

pub fn topic_for(device_id: &str, suffix: &str) -> String {
    format!("pv/PV3/{}/{}", device_id, suffix)
}

pub fn state_of_health(avg: u32) -> String {
    format!(
        r#"[{{"measurement":"StateOfHealth","type":"Avg","value":{}}}]"#,
        avg
    )
}

/// `usable_soc` is reported in hundredths of a percent.
pub fn state_of_charge(centi_percent: u32) -> String {
    format!(r#"{{"usable_soc":{}}}"#, centi_percent)
}

pub fn current_transformers(house_mw: i64, local_mw: i64) -> String {
    format!(
        r#"[{{"channel":"HOUSE","measurement":"Power","type":"Active","value":{}}},{{"channel":"LOCAL","measurement":"Power","type":"Active","value":{}}}]"#,
        house_mw, local_mw
    )
}

pub fn battery_voltage(millivolts: u32) -> String {
    format!(
        r#"[{{"channel":"BATTERY","measurement":"Voltage","type":"Dc","value":{}}}]"#,
        millivolts
    )
}

pub fn alarms(entries: &[(&str, bool)]) -> String {
    let fields: Vec<String> = entries
        .iter()
        .map(|(name, active)| format!(r#""{}":"{}""#, name, u8::from(*active)))
        .collect();
    format!("{{{}}}", fields.join(","))
}
