//! Logic characters, edge classes, and value-set actions.
//!
//! Binary-string values exchanged with backends use one character per element,
//! most significant element first. Both the four Verilog states and the nine
//! VHDL `std_logic` states are accepted.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GpiError, GpiResult};

/// A single element of a binary-string signal value.
///
/// Covers the nine IEEE 1164 `std_ulogic` states; Verilog four-state values
/// map onto `Zero`, `One`, `X`, and `Z`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Logic {
    /// Uninitialized (`U`).
    U,
    /// Forcing unknown (`X`).
    X,
    /// Forcing low (`0`).
    Zero,
    /// Forcing high (`1`).
    One,
    /// High impedance (`Z`).
    Z,
    /// Weak unknown (`W`).
    W,
    /// Weak low (`L`).
    L,
    /// Weak high (`H`).
    H,
    /// Don't care (`-`).
    DontCare,
}

impl Logic {
    /// Converts a character to a [`Logic`] value, case-insensitively.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'U' => Some(Logic::U),
            'X' => Some(Logic::X),
            '0' => Some(Logic::Zero),
            '1' => Some(Logic::One),
            'Z' => Some(Logic::Z),
            'W' => Some(Logic::W),
            'L' => Some(Logic::L),
            'H' => Some(Logic::H),
            '-' => Some(Logic::DontCare),
            _ => None,
        }
    }

    /// Returns the canonical character for this value.
    pub fn to_char(self) -> char {
        match self {
            Logic::U => 'U',
            Logic::X => 'X',
            Logic::Zero => '0',
            Logic::One => '1',
            Logic::Z => 'Z',
            Logic::W => 'W',
            Logic::L => 'L',
            Logic::H => 'H',
            Logic::DontCare => '-',
        }
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// Checks that every character of `value` is a logic value.
pub fn validate_binstr(value: &str) -> GpiResult<()> {
    match value.chars().find(|c| Logic::from_char(*c).is_none()) {
        Some(bad) => Err(GpiError::InvalidLogic(bad)),
        None => Ok(()),
    }
}

/// The edge class a value-change or edge callback waits for.
///
/// The numeric codes (`1`, `2`, `3`) match the ones engines pass across the
/// procedural boundary.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Edge {
    /// Transition to logic `1`.
    Rising,
    /// Transition to logic `0`.
    Falling,
    /// Any change.
    ValueChange,
}

impl Edge {
    /// All edge classes, in counter-slot order.
    pub const ALL: [Edge; 3] = [Edge::Rising, Edge::Falling, Edge::ValueChange];

    /// Decodes a numeric edge code.
    pub fn from_raw(code: i32) -> GpiResult<Self> {
        match code {
            1 => Ok(Edge::Rising),
            2 => Ok(Edge::Falling),
            3 => Ok(Edge::ValueChange),
            other => Err(GpiError::InvalidEdgeRequest(format!(
                "unknown edge code {other}"
            ))),
        }
    }

    /// Returns the numeric edge code.
    pub fn as_raw(self) -> i32 {
        match self {
            Edge::Rising => 1,
            Edge::Falling => 2,
            Edge::ValueChange => 3,
        }
    }

    /// Slot index used by per-class tables.
    pub(crate) fn slot(self) -> usize {
        match self {
            Edge::Rising => 0,
            Edge::Falling => 1,
            Edge::ValueChange => 2,
        }
    }

    /// Returns `true` if a change to `new_value` qualifies as this edge.
    pub fn matches(self, new_value: &str) -> bool {
        match self {
            Edge::Rising => new_value == "1",
            Edge::Falling => new_value == "0",
            Edge::ValueChange => true,
        }
    }

    /// Returns every edge class implicated by a change to `new_value`.
    pub fn implicated_by(new_value: &str) -> impl Iterator<Item = Edge> + '_ {
        Edge::ALL.into_iter().filter(move |e| e.matches(new_value))
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Rising => write!(f, "rising"),
            Edge::Falling => write!(f, "falling"),
            Edge::ValueChange => write!(f, "value-change"),
        }
    }
}

/// How a value write is applied by the simulator.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum SetAction {
    /// Deposit the value; the design may overwrite it on its next update.
    #[default]
    Deposit,
    /// Force the value until released.
    Force,
    /// Release a previous force.
    Release,
    /// Deposit immediately, without scheduling.
    NoDelay,
}

impl fmt::Display for SetAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetAction::Deposit => write!(f, "deposit"),
            SetAction::Force => write!(f, "force"),
            SetAction::Release => write!(f, "release"),
            SetAction::NoDelay => write!(f, "no-delay"),
        }
    }
}
