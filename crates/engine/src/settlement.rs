//! Settlement split arithmetic.
//!
//! An approved payment is partitioned between the receiver and the platform
//! (system) wallet. The ratio is expressed in basis points so the split is
//! exact integer arithmetic on minor units; the receiver share is rounded down
//! and the remainder always goes to the system share, so
//! `receiver + system == amount` for every amount.

use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Basis points in a whole (100%).
pub const BPS_SCALE: u32 = 10_000;

/// Proportion of an approved payment credited to the receiver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitRatio {
    receiver_bps: u32,
}

/// Result of splitting an amount with a [`SplitRatio`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Split {
    pub receiver_minor: i64,
    pub system_minor: i64,
}

impl SplitRatio {
    /// 90% receiver / 10% system.
    pub const DEFAULT: SplitRatio = SplitRatio { receiver_bps: 9_000 };

    /// Creates a ratio giving `receiver_bps / 10000` of each payment to the
    /// receiver.
    pub fn new(receiver_bps: u32) -> ResultEngine<Self> {
        if receiver_bps > BPS_SCALE {
            return Err(EngineError::Validation(format!(
                "receiver share must be <= {BPS_SCALE} bps, got {receiver_bps}"
            )));
        }
        Ok(Self { receiver_bps })
    }

    #[must_use]
    pub const fn receiver_bps(self) -> u32 {
        self.receiver_bps
    }

    /// Splits a non-negative amount of minor units.
    ///
    /// ```rust
    /// use engine::SplitRatio;
    ///
    /// let split = SplitRatio::DEFAULT.split(5_000);
    /// assert_eq!(split.receiver_minor, 4_500);
    /// assert_eq!(split.system_minor, 500);
    /// ```
    #[must_use]
    pub fn split(self, amount_minor: i64) -> Split {
        assert!(amount_minor >= 0, "cannot split a negative amount");

        // i128 keeps `amount * bps` from overflowing for any i64 amount.
        let receiver =
            i128::from(amount_minor) * i128::from(self.receiver_bps) / i128::from(BPS_SCALE);
        // receiver <= amount, so it fits back into i64.
        let receiver_minor = receiver as i64;

        Split {
            receiver_minor,
            system_minor: amount_minor - receiver_minor,
        }
    }
}

impl Default for SplitRatio {
    fn default() -> Self {
        Self::DEFAULT
    }
}
