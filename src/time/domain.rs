//! Time-domain points.
//!
//! A [`TimePoint<D>`] is a [`TimeInterval`] measured from the epoch of
//! domain `D`.  The domain is a zero-sized marker, so subtracting a
//! [`DeviceTime`] from a [`UnixTime`] does not compile; crossing domains
//! always goes through the [`Clock`](crate::clock::Clock).

use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::ops::{Add, AddAssign, Sub, SubAssign};

use super::TimeInterval;

/// Marker trait for time-domain tags.
pub trait TimeDomain {
    const NAME: &'static str;
}

/// Milliseconds since the current boot.
#[derive(Debug)]
pub enum Device {}

/// Seconds since 1970-01-01T00:00:00Z.
#[derive(Debug)]
pub enum Unix {}

/// Persisted uptime from earlier boots plus the current boot's uptime.
#[derive(Debug)]
pub enum Cumulative {}

impl TimeDomain for Device {
    const NAME: &'static str = "DeviceTime";
}

impl TimeDomain for Unix {
    const NAME: &'static str = "UnixTime";
}

impl TimeDomain for Cumulative {
    const NAME: &'static str = "CumulativeTime";
}

pub type DeviceTime = TimePoint<Device>;
pub type UnixTime = TimePoint<Unix>;
pub type CumulativeTime = TimePoint<Cumulative>;

/// A point in time within domain `D`.
pub struct TimePoint<D> {
    since_epoch: TimeInterval,
    _domain: PhantomData<D>,
}

impl<D> TimePoint<D> {
    pub const fn from_interval(since_epoch: TimeInterval) -> Self {
        Self {
            since_epoch,
            _domain: PhantomData,
        }
    }

    pub const fn from_secs(secs: i64) -> Self {
        Self::from_interval(TimeInterval::from_secs(secs))
    }

    /// Elapsed interval since the domain epoch.
    pub const fn since_epoch(self) -> TimeInterval {
        self.since_epoch
    }

    pub const fn secs(self) -> i64 {
        self.since_epoch.secs()
    }

    /// `self - earlier`; negative when `earlier` is actually later.
    pub fn interval_since(self, earlier: Self) -> TimeInterval {
        self.since_epoch - earlier.since_epoch
    }
}

impl DeviceTime {
    /// Reconstruct device time from a 32-bit millisecond counter reading
    /// and the number of times that counter has wrapped since boot.
    pub const fn from_counter(millis: u32, overflow: u16) -> Self {
        let ms = ((overflow as u64) << 32) | millis as u64;
        Self::from_interval(TimeInterval::from_millis_u64(ms))
    }
}

impl UnixTime {
    pub const fn from_unix_secs(secs: u32) -> Self {
        Self::from_secs(secs as i64)
    }
}

impl CumulativeTime {
    /// Current boot's uptime offset by the uptime persisted from earlier boots.
    pub fn from_device_time(dt: DeviceTime, previous_uptime: TimeInterval) -> Self {
        Self::from_interval(dt.since_epoch() + previous_uptime)
    }
}

// Manual impls: deriving would demand the same bounds on the marker types.

impl<D> Clone for TimePoint<D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D> Copy for TimePoint<D> {}

impl<D> PartialEq for TimePoint<D> {
    fn eq(&self, other: &Self) -> bool {
        self.since_epoch == other.since_epoch
    }
}

impl<D> Eq for TimePoint<D> {}

impl<D> PartialOrd for TimePoint<D> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<D> Ord for TimePoint<D> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.since_epoch.cmp(&other.since_epoch)
    }
}

impl<D> Hash for TimePoint<D> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.since_epoch.hash(state);
    }
}

impl<D: TimeDomain> fmt::Debug for TimePoint<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({} ticks)", D::NAME, self.since_epoch.ticks())
    }
}

impl<D> fmt::Display for TimePoint<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.since_epoch, self.since_epoch.secs())
    }
}

impl<D> Add<TimeInterval> for TimePoint<D> {
    type Output = Self;

    fn add(self, rhs: TimeInterval) -> Self {
        Self::from_interval(self.since_epoch + rhs)
    }
}

impl<D> AddAssign<TimeInterval> for TimePoint<D> {
    fn add_assign(&mut self, rhs: TimeInterval) {
        self.since_epoch += rhs;
    }
}

impl<D> Sub<TimeInterval> for TimePoint<D> {
    type Output = Self;

    fn sub(self, rhs: TimeInterval) -> Self {
        Self::from_interval(self.since_epoch - rhs)
    }
}

impl<D> SubAssign<TimeInterval> for TimePoint<D> {
    fn sub_assign(&mut self, rhs: TimeInterval) {
        self.since_epoch -= rhs;
    }
}

impl<D> Sub for TimePoint<D> {
    type Output = TimeInterval;

    fn sub(self, rhs: Self) -> TimeInterval {
        self.interval_since(rhs)
    }
}
