//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigStorePort`] on the default NVS partition, namespace
//! `reptilog`. Writes are committed immediately (`nvs_commit` is atomic per
//! call). Erase-and-reinit on corruption is the boot sequencer's decision;
//! this adapter only reports the condition.

use crate::app::ports::ConfigStorePort;
use crate::error::StoreError;
use log::info;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(target_os = "espidf")]
const NAMESPACE: &core::ffi::CStr = c"reptilog";

/// NVS keys are at most 15 characters.
const MAX_KEY_LEN: usize = 15;

pub struct NvsStore {
    #[cfg(not(target_os = "espidf"))]
    store: HashMap<String, Vec<u8>>,
}

impl Default for NvsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NvsStore {
    /// Create the adapter. Flash is not touched until [`ConfigStorePort::init`].
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            store: HashMap::new(),
        }
    }

    /// NUL-terminated copy of `key`. Keys NVS would not store verbatim
    /// are rejected, never shortened.
    fn key_buf(key: &str) -> Result<[u8; MAX_KEY_LEN + 1], StoreError> {
        let kb = key.as_bytes();
        if kb.is_empty() || kb.len() > MAX_KEY_LEN || kb.contains(&0) {
            return Err(StoreError::InvalidKey);
        }
        let mut buf = [0u8; MAX_KEY_LEN + 1];
        buf[..kb.len()].copy_from_slice(kb);
        Ok(buf)
    }

    /// Open the namespace, run `f` with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let mut handle: nvs_handle_t = 0;
        // SAFETY: `NAMESPACE` is a static C string.
        let ret = unsafe { nvs_open(NAMESPACE.as_ptr(), mode, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }
}

#[cfg(target_os = "espidf")]
fn map_init_error(ret: i32) -> StoreError {
    if ret == ESP_ERR_NVS_NO_FREE_PAGES as i32 {
        StoreError::NoFreePages
    } else if ret == ESP_ERR_NVS_NEW_VERSION_FOUND as i32 {
        StoreError::VersionMismatch
    } else {
        StoreError::Io(ret)
    }
}

impl ConfigStorePort for NvsStore {
    fn init(&mut self) -> Result<(), StoreError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called from the main task before any other NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret != ESP_OK as i32 {
                return Err(map_init_error(ret));
            }
            info!("NVS: initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NVS(sim): initialised");

        Ok(())
    }

    fn erase(&mut self) -> Result<(), StoreError> {
        #[cfg(target_os = "espidf")]
        {
            warn!("NVS: erasing partition");
            let ret = unsafe { nvs_flash_erase() };
            if ret != ESP_OK as i32 {
                return Err(StoreError::Io(ret));
            }
        }

        #[cfg(not(target_os = "espidf"))]
        self.store.clear();

        Ok(())
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let key_buf = Self::key_buf(key)?;

        #[cfg(not(target_os = "espidf"))]
        {
            let _ = key_buf;
            self.store.insert(key.to_owned(), value.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            Self::with_handle(true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        value.as_ptr() as *const _,
                        value.len(),
                    )
                };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                Ok(())
            })
            .map_err(|e| {
                warn!("NVS: write '{}' failed ({})", key, e);
                StoreError::Io(e)
            })
        }
    }

    fn get(&self, key: &str, buf: &mut [u8]) -> Result<Option<usize>, StoreError> {
        let key_buf = Self::key_buf(key)?;

        #[cfg(not(target_os = "espidf"))]
        {
            let _ = key_buf;
            match self.store.get(key) {
                Some(data) if data.len() > buf.len() => Err(StoreError::TooLarge),
                Some(data) => {
                    buf[..data.len()].copy_from_slice(data);
                    Ok(Some(data.len()))
                }
                None => Ok(None),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_handle(false, |handle| {
                let mut size = buf.len();
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                Ok(size)
            });
            match result {
                Ok(size) => Ok(Some(size)),
                // A fresh partition has no namespace yet either.
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND as i32 => Ok(None),
                Err(e) if e == ESP_ERR_NVS_INVALID_LENGTH as i32 => Err(StoreError::TooLarge),
                Err(e) => Err(StoreError::Io(e)),
            }
        }
    }
}
