//! EEPROM-style persistent store adapter.
//!
//! Implements [`PersistentStore`] and [`ConfigPort`].  The whole
//! [`layout`](crate::storage::layout) is kept in a RAM shadow; reads never
//! touch flash.
//!
//! - **`target_os = "espidf"`**: the shadow is one NVS blob, loaded at
//!   construction and rewritten and committed on every `write`.  An absent
//!   blob reads as erased memory (`0xFF`).
//! - **`not(target_os = "espidf")`**: in-memory only, starting erased.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{ConfigError, ConfigPort, PersistentStore, StorageError};
use crate::config::IrrigatorConfig;
use crate::storage::{self, layout};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
const NAMESPACE: &[u8] = b"irrigator\0";
#[cfg(target_os = "espidf")]
const BLOB_KEY: &[u8] = b"eeprom\0";

pub struct EepromStore {
    shadow: [u8; layout::TOTAL],
}

impl EepromStore {
    /// Open the store.  On ESP-IDF this initialises NVS flash, erasing the
    /// partition if its format is outdated.
    pub fn new() -> Result<Self, StorageError> {
        #[allow(unused_mut)]
        let mut store = Self {
            shadow: [0xFF; layout::TOTAL],
        };

        #[cfg(target_os = "espidf")]
        {
            init_flash()?;
            store.load_blob()?;
            info!("EepromStore: loaded {} bytes from NVS", layout::TOTAL);
        }

        #[cfg(not(target_os = "espidf"))]
        info!("EepromStore: simulation backend ({} bytes)", layout::TOTAL);

        Ok(store)
    }

    /// Raw view of the shadow, for diagnostics and tests.
    pub fn as_bytes(&self) -> &[u8] {
        &self.shadow
    }

    fn range(&self, offset: usize, len: usize) -> Result<core::ops::Range<usize>, StorageError> {
        let end = offset.checked_add(len).ok_or(StorageError::OutOfBounds)?;
        if end > self.shadow.len() {
            return Err(StorageError::OutOfBounds);
        }
        Ok(offset..end)
    }

    #[cfg(target_os = "espidf")]
    fn load_blob(&mut self) -> Result<(), StorageError> {
        let shadow = &mut self.shadow;
        let result = with_nvs_handle(false, |handle| {
            let mut size = shadow.len();
            // SAFETY: `shadow` is valid for `size` bytes and outlives the call.
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    BLOB_KEY.as_ptr() as *const _,
                    shadow.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(size)
        });
        match result {
            Ok(size) if size == layout::TOTAL => Ok(()),
            Ok(size) => {
                // Older, shorter layout: the version check will reformat.
                warn!("EepromStore: blob is {} bytes, expected {}", size, layout::TOTAL);
                self.shadow[size..].fill(0xFF);
                Ok(())
            }
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => {
                info!("EepromStore: no blob yet, starting erased");
                Ok(())
            }
            Err(e) if e == ESP_ERR_NVS_INVALID_LENGTH => {
                warn!("EepromStore: blob larger than layout, starting erased");
                self.shadow.fill(0xFF);
                Ok(())
            }
            Err(e) => {
                warn!("EepromStore: NVS read error {}", e);
                Err(StorageError::IoError)
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn commit_blob(&self) -> Result<(), StorageError> {
        let shadow = &self.shadow;
        with_nvs_handle(true, |handle| {
            // SAFETY: `shadow` is valid for its full length during the call.
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    BLOB_KEY.as_ptr() as *const _,
                    shadow.as_ptr() as *const _,
                    shadow.len(),
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        })
        .map_err(|e| {
            warn!("EepromStore: NVS write error {}", e);
            StorageError::IoError
        })
    }
}

#[cfg(target_os = "espidf")]
fn init_flash() -> Result<(), StorageError> {
    // SAFETY: called once from the main task before any other NVS access.
    let ret = unsafe { nvs_flash_init() };
    if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
        warn!("EepromStore: erasing and re-initialising NVS partition");
        if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK {
            return Err(StorageError::IoError);
        }
    } else if ret != ESP_OK {
        return Err(StorageError::IoError);
    }
    Ok(())
}

/// Open the namespace, run `f` with the handle, then close it.
#[cfg(target_os = "espidf")]
fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
where
    F: FnOnce(nvs_handle_t) -> Result<T, i32>,
{
    let mut handle: nvs_handle_t = 0;
    let mode = if write {
        nvs_open_mode_t_NVS_READWRITE
    } else {
        nvs_open_mode_t_NVS_READONLY
    };
    // SAFETY: NAMESPACE is NUL-terminated; `handle` is a valid out-pointer.
    let ret = unsafe { nvs_open(NAMESPACE.as_ptr() as *const _, mode, &mut handle) };
    if ret != ESP_OK {
        return Err(ret);
    }
    let result = f(handle);
    unsafe {
        nvs_close(handle);
    }
    result
}

impl PersistentStore for EepromStore {
    fn len(&self) -> usize {
        self.shadow.len()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        let r = self.range(offset, buf.len())?;
        buf.copy_from_slice(&self.shadow[r]);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        let r = self.range(offset, data.len())?;
        if self.shadow[r.clone()] == *data {
            return Ok(());
        }
        self.shadow[r].copy_from_slice(data);

        #[cfg(target_os = "espidf")]
        self.commit_blob()?;

        Ok(())
    }
}

impl ConfigPort for EepromStore {
    fn load(&self) -> Result<IrrigatorConfig, ConfigError> {
        Ok(storage::load_settings(self))
    }

    fn save(&mut self, config: &IrrigatorConfig) -> Result<(), ConfigError> {
        storage::save_settings(self, config)
    }
}
