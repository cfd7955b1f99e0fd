//! Fixed-point time arithmetic.
//!
//! [`TimeInterval`] is the shared duration type.  [`TimePoint`] tags an
//! interval with the epoch it is measured from:
//!
//! | Domain            | Epoch                       | Available            |
//! |-------------------|-----------------------------|----------------------|
//! | [`DeviceTime`]    | current boot                | always               |
//! | [`UnixTime`]      | 1970-01-01 UTC              | after a network sync |
//! | [`CumulativeTime`]| first boot (approximate)    | always               |

mod domain;
mod interval;

pub use domain::{
    Cumulative, CumulativeTime, Device, DeviceTime, TimeDomain, TimePoint, Unix, UnixTime,
};
pub use interval::{FRACTION_BITS, OrNever, TimeInterval};
