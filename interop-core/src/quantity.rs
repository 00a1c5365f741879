use crate::error::{InteropError, Result};
use std::cmp::Ordering;
use std::fmt;

/// Largest supported precision, in bits
pub const MAX_PRECISION: u32 = 128;

/// A non-negative integer bounded by a fixed number of binary digits.
///
/// All quantities handled by one scheme instance share the same precision;
/// mixing precisions is an error rather than a silent comparison of raw values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quantity {
    value: u128,
    precision: u32,
}

fn check_precision(precision: u32) -> Result<()> {
    if precision == 0 || precision > MAX_PRECISION {
        return Err(InteropError::InvalidPrecision(precision));
    }
    Ok(())
}

fn fits(value: u128, precision: u32) -> bool {
    precision >= MAX_PRECISION || value >> precision == 0
}

impl Quantity {
    /// Create a quantity
    ///
    /// # Parameters
    /// * `value` - The unsigned value
    /// * `precision` - Number of bits the value may use, 1 to 128
    ///
    /// # Returns
    /// The quantity, `InvalidPrecision` or `PrecisionOverflow`
    pub fn new(value: u128, precision: u32) -> Result<Self> {
        check_precision(precision)?;
        if !fits(value, precision) {
            return Err(InteropError::PrecisionOverflow {
                value: value.to_string(),
                precision,
            });
        }
        Ok(Quantity { value, precision })
    }

    pub fn from_u64(value: u64, precision: u32) -> Result<Self> {
        Self::new(value as u128, precision)
    }

    pub fn zero(precision: u32) -> Result<Self> {
        Self::new(0, precision)
    }

    /// Parse the canonical `0x`-prefixed hex encoding
    pub fn from_hex(encoded: &str, precision: u32) -> Result<Self> {
        let digits = encoded
            .strip_prefix("0x")
            .or_else(|| encoded.strip_prefix("0X"))
            .ok_or_else(|| {
                InteropError::InvalidRequest(format!("quantity [{}] is missing the 0x prefix", encoded))
            })?;
        if digits.is_empty() {
            return Err(InteropError::InvalidRequest("empty quantity".to_string()));
        }
        let value = u128::from_str_radix(digits, 16).map_err(|e| {
            InteropError::InvalidRequest(format!("invalid quantity [{}]: {}", encoded, e))
        })?;
        Self::new(value, precision)
    }

    pub fn to_hex(&self) -> String {
        format!("{:#x}", self.value)
    }

    pub fn value(&self) -> u128 {
        self.value
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    fn same_precision(&self, other: &Quantity) -> Result<()> {
        if self.precision != other.precision {
            return Err(InteropError::PrecisionMismatch {
                left: self.precision,
                right: other.precision,
            });
        }
        Ok(())
    }

    pub fn checked_add(&self, other: &Quantity) -> Result<Quantity> {
        self.same_precision(other)?;
        let sum = self.value.checked_add(other.value).ok_or_else(|| InteropError::PrecisionOverflow {
            value: format!("{} + {}", self.value, other.value),
            precision: self.precision,
        })?;
        Quantity::new(sum, self.precision)
    }

    pub fn checked_sub(&self, other: &Quantity) -> Result<Quantity> {
        self.same_precision(other)?;
        let diff = self.value.checked_sub(other.value).ok_or_else(|| {
            InteropError::InvalidRequest(format!("cannot subtract {} from {}", other.value, self.value))
        })?;
        Quantity::new(diff, self.precision)
    }

    /// Compare two quantities, failing when their precision differs
    pub fn compare(&self, other: &Quantity) -> Result<Ordering> {
        self.same_precision(other)?;
        Ok(self.value.cmp(&other.value))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}
