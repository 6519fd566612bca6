use std::{fmt, str::FromStr};

use crate::EngineError;

/// Amount of money in integer minor units (cents).
///
/// Balances and payment amounts are stored as raw `i64` minor units; this
/// type is the boundary helper used to parse operator input and to render
/// amounts in log lines and notification messages.
///
/// ```rust
/// use engine::MoneyCents;
///
/// assert_eq!(MoneyCents::new(12_34).to_string(), "12.34");
/// assert_eq!("10,5".parse::<MoneyCents>().unwrap().cents(), 1050);
/// assert!("12.345".parse::<MoneyCents>().is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct MoneyCents(i64);

impl MoneyCents {
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for MoneyCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

fn invalid(reason: &str) -> EngineError {
    EngineError::Validation(format!("invalid amount: {reason}"))
}

impl FromStr for MoneyCents {
    type Err = EngineError;

    /// Parses `12`, `12.3`, `12.30` or `12,30` (optional leading sign).
    /// More than two fractional digits are rejected, never rounded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };
        let digits = digits.trim().replace(',', ".");
        if digits.is_empty() {
            return Err(invalid("empty"));
        }

        let (units, fraction) = match digits.split_once('.') {
            Some((_, "")) => return Err(invalid("missing decimals")),
            Some((units, fraction)) => (units, fraction),
            None => (digits.as_str(), ""),
        };
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if units.is_empty() || !all_digits(units) || !all_digits(fraction) {
            return Err(invalid("not a decimal number"));
        }
        if fraction.len() > 2 {
            return Err(invalid("too many decimals"));
        }

        let units: i64 = units.parse().map_err(|_| invalid("too large"))?;
        let cents: i64 = match fraction.len() {
            0 => 0,
            1 => i64::from(fraction.as_bytes()[0] - b'0') * 10,
            _ => fraction.parse().map_err(|_| invalid("not a decimal number"))?,
        };

        let total = units
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .ok_or_else(|| invalid("too large"))?;

        Ok(MoneyCents(if negative { -total } else { total }))
    }
}
