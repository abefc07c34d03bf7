use std::fmt;

/// Units a decoded metric can be expressed in.
///
/// Every canonical metric name maps to exactly one of these, whatever the raw
/// fixed-point encoding used by the device firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Volt,
    Ampere,
    Watt,
    Percent,
    Hertz,
    Celsius,
    Cycles,
    /// Dimensionless values such as modes, events and counters.
    None,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Volt => "V",
            Unit::Ampere => "A",
            Unit::Watt => "W",
            Unit::Percent => "%",
            Unit::Hertz => "Hz",
            Unit::Celsius => "C",
            Unit::Cycles => "cycles",
            Unit::None => "",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
