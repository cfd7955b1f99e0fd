//! Fixed-point signed duration.
//!
//! A [`TimeInterval`] is a count of 2⁻¹⁶-second ticks held in an `i64`.
//! Whole seconds live in the upper bits and the fraction in the low
//! [`FRACTION_BITS`] bits, so every accessor is a shift or a mask:
//!
//! ```text
//!  63                    16 15                0
//! ┌────────────────────────┬──────────────────┐
//! │  signed whole seconds  │ fraction (2⁻¹⁶ s) │
//! └────────────────────────┴──────────────────┘
//! ```
//!
//! Arithmetic wraps on overflow; at 2⁻¹⁶ s that is ~4.4 million years.
//! "Never happened" is modelled as `Option` by callers, not as a tick value.

use core::fmt;
use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Number of fractional bits in the tick representation.
pub const FRACTION_BITS: u32 = 16;

const TICKS_PER_SECOND: i64 = 1 << FRACTION_BITS;

/// Signed fixed-point duration at 2⁻¹⁶ s resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeInterval {
    ticks: i64,
}

impl TimeInterval {
    pub const ZERO: Self = Self { ticks: 0 };

    pub const fn from_ticks(ticks: i64) -> Self {
        Self { ticks }
    }

    pub const fn from_secs(secs: i64) -> Self {
        Self {
            ticks: secs << FRACTION_BITS,
        }
    }

    /// Milliseconds are rounded to the nearest tick, half away from zero.
    /// One tick is ~15 µs, so `from_millis(ms).as_millis() == ms` holds.
    pub const fn from_millis(ms: i64) -> Self {
        Self {
            ticks: div_round(ms as i128 * TICKS_PER_SECOND as i128, 1000) as i64,
        }
    }

    /// Build from an unsigned millisecond count wider than 64 bits can
    /// hold once scaled (device time with overflow epochs).
    pub(crate) const fn from_millis_u64(ms: u64) -> Self {
        Self {
            ticks: div_round(ms as i128 * TICKS_PER_SECOND as i128, 1000) as i64,
        }
    }

    pub const fn ticks(self) -> i64 {
        self.ticks
    }

    /// Whole seconds, truncated toward zero.
    pub const fn secs(self) -> i64 {
        self.ticks / TICKS_PER_SECOND
    }

    /// Fractional part in milliseconds, carrying the interval's sign
    /// (`-999..=999`).
    pub const fn subsec_millis(self) -> i16 {
        let frac = self.ticks % TICKS_PER_SECOND;
        ((frac * 1000) / TICKS_PER_SECOND) as i16
    }

    /// Total milliseconds, rounded to nearest.
    pub const fn as_millis(self) -> i64 {
        div_round(self.ticks as i128 * 1000, TICKS_PER_SECOND as i128) as i64
    }

    pub const fn is_positive(self) -> bool {
        self.ticks > 0
    }

    pub const fn is_negative(self) -> bool {
        self.ticks < 0
    }

    /// Absolute value, saturating at the most negative interval.
    pub const fn abs(self) -> Self {
        Self {
            ticks: self.ticks.saturating_abs(),
        }
    }

    /// Truncate to whole seconds, dropping the fraction (toward zero).
    pub const fn whole_secs(self) -> Self {
        Self::from_secs(self.secs())
    }
}

/// Signed division rounding half away from zero.
const fn div_round(num: i128, den: i128) -> i128 {
    if num >= 0 {
        (num + den / 2) / den
    } else {
        (num - den / 2) / den
    }
}

impl Add for TimeInterval {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            ticks: self.ticks.wrapping_add(rhs.ticks),
        }
    }
}

impl AddAssign for TimeInterval {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for TimeInterval {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            ticks: self.ticks.wrapping_sub(rhs.ticks),
        }
    }
}

impl SubAssign for TimeInterval {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Neg for TimeInterval {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            ticks: self.ticks.wrapping_neg(),
        }
    }
}

/// Human-readable `"_h _m _s"` form with zero components omitted.
///
/// `"0s"` for anything under a second, and a leading `-` for negative
/// intervals.
impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.secs();
        if total == 0 {
            return f.write_str("0s");
        }
        if total < 0 {
            f.write_str("-")?;
        }

        let total = total.unsigned_abs();
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;

        let mut sep = "";
        if hours > 0 {
            write!(f, "{hours}h")?;
            sep = " ";
        }
        if minutes > 0 {
            write!(f, "{sep}{minutes}m")?;
            sep = " ";
        }
        if seconds > 0 {
            write!(f, "{sep}{seconds}s")?;
        }
        Ok(())
    }
}

/// Display adapter for an interval that may not exist yet; `None` renders
/// as `never`.
#[derive(Debug, Clone, Copy)]
pub struct OrNever(pub Option<TimeInterval>);

impl fmt::Display for OrNever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(interval) => interval.fmt(f),
            None => f.write_str("never"),
        }
    }
}
