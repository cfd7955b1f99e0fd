//! Persistent layout and typed cell access.
//!
//! The store is a flat byte array.  Every persisted value lives in a fixed,
//! disjoint cell of [`layout`]; integers are little-endian and records carry
//! no delimiters, so reader and writer must agree on sizes exactly.
//!
//! ```text
//!   0      2        6        10       14                  134     138     142        222
//!   ┌──────┬────────┬────────┬────────┬───────────────────┬───────┬───────┬──────────┐
//!   │ ver  │ lastCT │ lastUT │ uptime │ tasks 6 × 20      │ intvl │ once  │ settings │
//!   └──────┴────────┴────────┴────────┴───────────────────┴───────┴───────┴──────────┘
//! ```

use heapless::String;
use log::{info, warn};

use crate::actuator::{NUM_VALVES, ValveId};
use crate::app::ports::{ConfigError, PersistentStore, StorageError};
use crate::config::{IrrigatorConfig, validate_config};
use crate::scheduler::{DESCRIPTION_CAPACITY, ScheduledTask};

/// Bumped whenever the layout changes; a mismatch reformats the store.
pub const FIRMWARE_VERSION: u16 = 3;

/// Marker stored in a 4-byte seconds cell that holds no value.
pub const UNSET: u32 = u32::MAX;

pub mod layout {
    /// A fixed byte range in the persistent store.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Cell {
        pub offset: usize,
        pub len: usize,
    }

    impl Cell {
        const fn after(prev: Cell, len: usize) -> Cell {
            Cell {
                offset: prev.offset + prev.len,
                len,
            }
        }

        pub const fn end(self) -> usize {
            self.offset + self.len
        }
    }

    pub const TASK_RECORD_LEN: usize = 20;
    pub const DESCRIPTION_LEN: usize = 16;

    pub const FIRMWARE_VERSION: Cell = Cell { offset: 0, len: 2 };
    pub const LAST_CYCLE_CUMULATIVE_SECS: Cell = Cell::after(FIRMWARE_VERSION, 4);
    pub const LAST_CYCLE_UNIX_SECS: Cell = Cell::after(LAST_CYCLE_CUMULATIVE_SECS, 4);
    pub const PREVIOUS_UPTIME_SECS: Cell = Cell::after(LAST_CYCLE_UNIX_SECS, 4);
    pub const TASKS: Cell = Cell::after(
        PREVIOUS_UPTIME_SECS,
        super::NUM_VALVES * TASK_RECORD_LEN,
    );
    pub const CYCLE_INTERVAL_SECS: Cell = Cell::after(TASKS, 4);
    pub const ONE_OFF_CUMULATIVE_SECS: Cell = Cell::after(CYCLE_INTERVAL_SECS, 4);
    pub const SETTINGS: Cell = Cell::after(ONE_OFF_CUMULATIVE_SECS, 80);

    /// Bytes a backing store must provide.
    pub const TOTAL: usize = SETTINGS.end();

    /// Record cell for the task at physical index `index`.
    pub const fn task(index: usize) -> Cell {
        Cell {
            offset: TASKS.offset + index * TASK_RECORD_LEN,
            len: TASK_RECORD_LEN,
        }
    }
}

use layout::{Cell, DESCRIPTION_LEN, TASK_RECORD_LEN};

// ── Scalar cells ──────────────────────────────────────────────

pub fn read_u16<S: PersistentStore + ?Sized>(store: &S, cell: Cell) -> Result<u16, StorageError> {
    debug_assert_eq!(cell.len, 2);
    let mut buf = [0u8; 2];
    store.read(cell.offset, &mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub fn write_u16<S: PersistentStore + ?Sized>(
    store: &mut S,
    cell: Cell,
    value: u16,
) -> Result<(), StorageError> {
    debug_assert_eq!(cell.len, 2);
    store.write(cell.offset, &value.to_le_bytes())
}

pub fn read_u32<S: PersistentStore + ?Sized>(store: &S, cell: Cell) -> Result<u32, StorageError> {
    debug_assert_eq!(cell.len, 4);
    let mut buf = [0u8; 4];
    store.read(cell.offset, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn write_u32<S: PersistentStore + ?Sized>(
    store: &mut S,
    cell: Cell,
    value: u32,
) -> Result<(), StorageError> {
    debug_assert_eq!(cell.len, 4);
    store.write(cell.offset, &value.to_le_bytes())
}

/// Read a seconds cell, mapping [`UNSET`] to `None`.
pub fn read_optional_secs<S: PersistentStore + ?Sized>(
    store: &S,
    cell: Cell,
) -> Result<Option<u32>, StorageError> {
    read_u32(store, cell).map(|v| (v != UNSET).then_some(v))
}

pub fn write_optional_secs<S: PersistentStore + ?Sized>(
    store: &mut S,
    cell: Cell,
    value: Option<u32>,
) -> Result<(), StorageError> {
    write_u32(store, cell, value.unwrap_or(UNSET))
}

// ── Task records ──────────────────────────────────────────────
//
//   0      1         2          4                    20
//   ┌──────┬─────────┬──────────┬────────────────────┐
//   │ id   │ enabled │ dur (LE) │ description, NUL   │
//   └──────┴─────────┴──────────┴────────────────────┘

/// Serialize one task into its fixed-size record.
pub fn encode_task(task: &ScheduledTask) -> [u8; TASK_RECORD_LEN] {
    let mut rec = [0u8; TASK_RECORD_LEN];
    rec[0] = task.valve.get();
    rec[1] = u8::from(task.enabled);
    rec[2..4].copy_from_slice(&task.duration_secs.to_le_bytes());
    let desc = task.description.as_bytes();
    rec[4..4 + desc.len()].copy_from_slice(desc);
    rec
}

/// Deserialize a record read from slot `slot`.
///
/// The valve id is taken from the slot, not the record, so a corrupt id
/// byte cannot alias another valve.  Only `1` counts as enabled.  The
/// description stops at the first NUL or at the first invalid UTF-8 byte.
pub fn decode_task(slot: ValveId, rec: &[u8; TASK_RECORD_LEN]) -> ScheduledTask {
    let raw = &rec[4..4 + DESCRIPTION_LEN];
    let raw = &raw[..raw.iter().position(|&b| b == 0).unwrap_or(raw.len())];
    let raw = &raw[..raw.len().min(DESCRIPTION_CAPACITY)];
    let text = match core::str::from_utf8(raw) {
        Ok(s) => s,
        // Everything before the first bad byte is valid.
        Err(e) => core::str::from_utf8(&raw[..e.valid_up_to()]).unwrap_or_default(),
    };

    let mut description = String::new();
    let _ = description.push_str(text);

    ScheduledTask {
        valve: slot,
        enabled: rec[1] == 1,
        duration_secs: u16::from_le_bytes([rec[2], rec[3]]),
        description,
    }
}

pub fn read_task<S: PersistentStore + ?Sized>(
    store: &S,
    valve: ValveId,
) -> Result<ScheduledTask, StorageError> {
    let mut rec = [0u8; TASK_RECORD_LEN];
    store.read(layout::task(valve.index()).offset, &mut rec)?;
    Ok(decode_task(valve, &rec))
}

pub fn write_task<S: PersistentStore + ?Sized>(
    store: &mut S,
    task: &ScheduledTask,
) -> Result<(), StorageError> {
    store.write(layout::task(task.valve.index()).offset, &encode_task(task))
}

// ── Formatting ────────────────────────────────────────────────

/// Write factory defaults unless the stored firmware version matches.
///
/// Returns `true` when the store was (re)formatted.  The version cell is
/// written last, so an interrupted format is retried on the next boot.
pub fn ensure_formatted<S: PersistentStore + ?Sized>(
    store: &mut S,
    default_cycle_interval_secs: u32,
) -> Result<bool, StorageError> {
    if store.len() < layout::TOTAL {
        warn!(
            "storage: backing store holds {} bytes, layout needs {}",
            store.len(),
            layout::TOTAL
        );
        return Err(StorageError::OutOfBounds);
    }

    let stored = read_u16(store, layout::FIRMWARE_VERSION)?;
    if stored == FIRMWARE_VERSION {
        return Ok(false);
    }

    info!(
        "storage: version {:#06x} != {:#06x}, writing defaults",
        stored, FIRMWARE_VERSION
    );
    write_u32(store, layout::LAST_CYCLE_CUMULATIVE_SECS, 0)?;
    write_optional_secs(store, layout::LAST_CYCLE_UNIX_SECS, None)?;
    write_u32(store, layout::PREVIOUS_UPTIME_SECS, 0)?;
    for valve in ValveId::all() {
        write_task(store, &ScheduledTask::disabled(valve))?;
    }
    write_u32(store, layout::CYCLE_INTERVAL_SECS, default_cycle_interval_secs)?;
    write_optional_secs(store, layout::ONE_OFF_CUMULATIVE_SECS, None)?;
    store.write(layout::SETTINGS.offset, &[0])?;
    write_u16(store, layout::FIRMWARE_VERSION, FIRMWARE_VERSION)?;
    Ok(true)
}

// ── Settings blob ─────────────────────────────────────────────

/// Load the persisted configuration.
///
/// Missing, corrupt or out-of-range blobs fall back to defaults.
pub fn load_settings<S: PersistentStore + ?Sized>(store: &S) -> IrrigatorConfig {
    match try_load_settings(store) {
        Ok(Some(cfg)) => {
            info!("storage: loaded settings");
            cfg
        }
        Ok(None) => {
            info!("storage: no stored settings, using defaults");
            IrrigatorConfig::default()
        }
        Err(e) => {
            warn!("storage: settings unusable ({}), using defaults", e);
            IrrigatorConfig::default()
        }
    }
}

fn try_load_settings<S: PersistentStore + ?Sized>(
    store: &S,
) -> Result<Option<IrrigatorConfig>, ConfigError> {
    let mut buf = [0u8; layout::SETTINGS.len];
    store.read(layout::SETTINGS.offset, &mut buf)?;
    let len = usize::from(buf[0]);
    // 0xFF is erased memory.
    if len == 0 || len == 0xFF {
        return Ok(None);
    }
    if len >= buf.len() {
        return Err(ConfigError::Corrupted);
    }
    let cfg: IrrigatorConfig =
        postcard::from_bytes(&buf[1..=len]).map_err(|_| ConfigError::Corrupted)?;
    validate_config(&cfg)?;
    Ok(Some(cfg))
}

/// Validate and persist the configuration.
pub fn save_settings<S: PersistentStore + ?Sized>(
    store: &mut S,
    cfg: &IrrigatorConfig,
) -> Result<(), ConfigError> {
    validate_config(cfg)?;
    let mut buf = [0u8; layout::SETTINGS.len];
    let used = postcard::to_slice(cfg, &mut buf[1..])
        .map_err(|_| ConfigError::TooLarge)?
        .len();
    buf[0] = used as u8;
    store.write(layout::SETTINGS.offset, &buf[..=used])?;
    info!("storage: settings saved ({} bytes)", used);
    Ok(())
}
