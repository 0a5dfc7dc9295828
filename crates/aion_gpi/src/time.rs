//! Simulation time as reported by backends.
//!
//! Backends count time in ticks of their precision (a power-of-ten exponent
//! of seconds, e.g. `-12` for picoseconds). [`SimTime`] carries the raw tick
//! count and splits it into the high/low 32-bit words used across the
//! procedural boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit suffixes indexed by `-exponent / 3`, starting at seconds.
const UNITS: [&str; 6] = ["s", "ms", "us", "ns", "ps", "fs"];

/// A simulation timestamp in backend precision ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimTime(pub u64);

impl SimTime {
    /// Time zero.
    pub const ZERO: SimTime = SimTime(0);

    /// Reassembles a timestamp from its high and low 32-bit words.
    pub fn from_parts(high: u32, low: u32) -> Self {
        Self((u64::from(high) << 32) | u64::from(low))
    }

    /// Returns the upper 32 bits of the tick count.
    pub fn high(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Returns the lower 32 bits of the tick count.
    pub fn low(self) -> u32 {
        self.0 as u32
    }

    /// Returns `(high, low)`.
    pub fn split(self) -> (u32, u32) {
        (self.high(), self.low())
    }

    /// Returns the raw tick count.
    pub fn ticks(self) -> u64 {
        self.0
    }

    /// Returns this time advanced by `delay` ticks, saturating at the maximum.
    pub fn after(self, delay: u64) -> Self {
        Self(self.0.saturating_add(delay))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Renders a precision exponent as a time unit, e.g. `-9` → `"1ns"`,
/// `-11` → `"10ps"`.
///
/// Exponents outside femtoseconds..seconds are rendered as `1e<exp>s`.
pub fn precision_to_string(exponent: i32) -> String {
    if !(-15..=2).contains(&exponent) {
        return format!("1e{exponent}s");
    }
    let unit_index = ((-exponent + 2) / 3).clamp(0, 5);
    let scale = exponent + unit_index * 3;
    let multiplier = 10u32.pow(scale as u32);
    format!("{multiplier}{}", UNITS[unit_index as usize])
}

/// Parses a unit string such as `"ns"`, `"10ps"` or `"100fs"` into a precision
/// exponent.
///
/// Returns `None` for unknown units or multipliers other than 1, 10 and 100.
pub fn parse_precision(s: &str) -> Option<i32> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let base = UNITS.iter().position(|u| *u == unit)? as i32 * -3;
    let offset = match digits {
        "" | "1" => 0,
        "10" => 1,
        "100" => 2,
        _ => return None,
    };
    Some(base + offset)
}
