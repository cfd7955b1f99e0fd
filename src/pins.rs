//! GPIO pin assignments for the irrigation controller board.
//!
//! Single source of truth for every driver.  Change a pin here and it
//! propagates everywhere.

// ---------------------------------------------------------------------------
// Zone valves (one MOSFET-driven 24 V solenoid per zone)
// ---------------------------------------------------------------------------

/// Zone valve outputs, indexed by valve id.  HIGH = coil energized.
pub const VALVE_GPIOS: [i32; crate::actuator::NUM_VALVES] = [4, 5, 6, 7, 15, 16];

// ---------------------------------------------------------------------------
// Master valve (supply line, upstream of every zone)
// ---------------------------------------------------------------------------

/// Master supply valve.  Opened only while a zone valve is open.
pub const MASTER_VALVE_GPIO: i32 = 17;

/// Human-readable driver labels, indexed like [`VALVE_GPIOS`].
pub const VALVE_LABELS: [&str; crate::actuator::NUM_VALVES] =
    ["zone0", "zone1", "zone2", "zone3", "zone4", "zone5"];
