//! Signal values and the set-action rules applied to them.

use aion_gpi::{Logic, SetAction};

use crate::design::{SignalSpec, SignalType};

/// The stored value of one signal.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Value {
    /// One logic character per bit, most significant first.
    Bits(String),
    /// A real.
    Real(f64),
    /// A 32-bit integer.
    Int(i32),
    /// A string.
    Text(String),
}

fn normalize_bits(s: &str, width: usize) -> Result<String, String> {
    let bits: Option<String> = s
        .chars()
        .map(|c| Logic::from_char(c).map(Logic::to_char))
        .collect();
    let bits = bits.ok_or_else(|| format!("'{s}' is not a logic value"))?;
    if bits.len() != width {
        return Err(format!("expected {width} bits, got {}", bits.len()));
    }
    Ok(bits)
}

fn long_to_bits(v: i64, width: usize) -> String {
    let full = format!("{:064b}", v as u64);
    if width <= 64 {
        full[64 - width..].to_string()
    } else {
        let pad = if v < 0 { '1' } else { '0' };
        let mut bits: String = std::iter::repeat(pad).take(width - 64).collect();
        bits.push_str(&full);
        bits
    }
}

impl Value {
    /// The initial value of a signal: its declared `init`, or all `X` for
    /// logic and zero or empty otherwise.
    pub(crate) fn initial(spec: &SignalSpec) -> Result<Self, String> {
        let blank = match spec.ty {
            SignalType::Logic => Value::Bits("X".repeat(spec.width)),
            SignalType::Real => Value::Real(0.0),
            SignalType::Integer => Value::Int(0),
            SignalType::String => Value::Text(String::new()),
        };
        match &spec.init {
            Some(init) => blank.with_str(init),
            None => Ok(blank),
        }
    }

    /// Binary-string form. Integers render as 32 bits.
    pub(crate) fn binstr(&self) -> Result<String, String> {
        match self {
            Value::Bits(bits) => Ok(bits.clone()),
            Value::Int(v) => Ok(format!("{:032b}", *v as u32)),
            Value::Real(_) => Err("real values have no binary form".to_string()),
            Value::Text(_) => Err("string values have no binary form".to_string()),
        }
    }

    /// Display form: bits, decimal numbers, or the string itself.
    pub(crate) fn text(&self) -> String {
        match self {
            Value::Bits(bits) => bits.clone(),
            Value::Real(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Text(s) => s.clone(),
        }
    }

    pub(crate) fn real(&self) -> Result<f64, String> {
        match self {
            Value::Real(v) => Ok(*v),
            Value::Int(v) => Ok(f64::from(*v)),
            _ => Err("value is not numeric".to_string()),
        }
    }

    /// Integer form. Logic values must be fully `0`/`1` and at most 64 bits.
    pub(crate) fn long(&self) -> Result<i64, String> {
        match self {
            Value::Int(v) => Ok(i64::from(*v)),
            Value::Bits(bits) if bits.len() > 64 => Err(format!("{} bits do not fit a long", bits.len())),
            Value::Bits(bits) if bits.is_empty() => Ok(0),
            Value::Bits(bits) => u64::from_str_radix(bits, 2)
                .map(|v| v as i64)
                .map_err(|_| format!("'{bits}' has non-binary bits")),
            Value::Real(_) => Err("real values have no integer form".to_string()),
            Value::Text(_) => Err("string values have no integer form".to_string()),
        }
    }

    /// A value of the same type parsed from a binary string.
    pub(crate) fn with_binstr(&self, s: &str) -> Result<Self, String> {
        match self {
            Value::Bits(old) => normalize_bits(s, old.len()).map(Value::Bits),
            Value::Int(_) => {
                if s.is_empty() || s.len() > 32 {
                    return Err(format!("expected up to 32 bits, got {}", s.len()));
                }
                u32::from_str_radix(s, 2)
                    .map(|v| Value::Int(v as i32))
                    .map_err(|_| format!("'{s}' has non-binary bits"))
            }
            Value::Real(_) | Value::Text(_) => Err("binary strings not accepted".to_string()),
        }
    }

    /// A value of the same type parsed from its display form.
    pub(crate) fn with_str(&self, s: &str) -> Result<Self, String> {
        match self {
            Value::Bits(_) => self.with_binstr(s),
            Value::Real(_) => s
                .trim()
                .parse()
                .map(Value::Real)
                .map_err(|_| format!("'{s}' is not a real")),
            Value::Int(_) => s
                .trim()
                .parse()
                .map(Value::Int)
                .map_err(|_| format!("'{s}' is not a 32-bit integer")),
            Value::Text(_) => Ok(Value::Text(s.to_string())),
        }
    }

    pub(crate) fn with_real(&self, v: f64) -> Result<Self, String> {
        match self {
            Value::Real(_) => Ok(Value::Real(v)),
            _ => Err("real values not accepted".to_string()),
        }
    }

    /// A value of the same type from an integer; logic vectors are
    /// truncated or sign-extended to their width.
    pub(crate) fn with_long(&self, v: i64) -> Result<Self, String> {
        match self {
            Value::Bits(old) => Ok(Value::Bits(long_to_bits(v, old.len()))),
            Value::Int(_) => i32::try_from(v)
                .map(Value::Int)
                .map_err(|_| format!("{v} does not fit 32 bits")),
            Value::Real(_) => Ok(Value::Real(v as f64)),
            Value::Text(_) => Err("integer values not accepted".to_string()),
        }
    }
}

/// A signal's current value and force state.
#[derive(Clone, Debug)]
pub(crate) struct SignalState {
    pub(crate) value: Value,
    pub(crate) forced: bool,
    pub(crate) constant: bool,
}

impl SignalState {
    pub(crate) fn new(spec: &SignalSpec) -> Result<Self, String> {
        Ok(Self {
            value: Value::initial(spec)?,
            forced: false,
            constant: spec.constant,
        })
    }

    /// Applies a write. Returns whether the value changed.
    ///
    /// Constants reject every write. While forced, deposits are ignored;
    /// a release keeps the forced value but lets later deposits through.
    pub(crate) fn write(&mut self, new: Value, action: SetAction) -> Result<bool, String> {
        if self.constant {
            return Err("object is constant".to_string());
        }
        match action {
            SetAction::Release => {
                self.forced = false;
                Ok(false)
            }
            SetAction::Force => {
                self.forced = true;
                Ok(self.replace(new))
            }
            SetAction::Deposit | SetAction::NoDelay if self.forced => Ok(false),
            SetAction::Deposit | SetAction::NoDelay => Ok(self.replace(new)),
        }
    }

    fn replace(&mut self, new: Value) -> bool {
        let changed = self.value != new;
        self.value = new;
        changed
    }
}
