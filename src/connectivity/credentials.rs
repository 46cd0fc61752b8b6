//! Station credentials, validated and persisted in the config store.

use core::fmt;

use log::info;

use crate::app::ports::ConfigStorePort;
use crate::error::CredentialError;

pub const SSID_KEY: &str = "wifi_ssid";
pub const PASSPHRASE_KEY: &str = "wifi_pass";

const MAX_SSID_LEN: usize = 32;
const MIN_WPA2_PASSPHRASE_LEN: usize = 8;
const MAX_PASSPHRASE_LEN: usize = 64;

/// Read-only copy handed to the link driver for one connection cycle.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    ssid: heapless::String<MAX_SSID_LEN>,
    passphrase: heapless::String<MAX_PASSPHRASE_LEN>,
}

impl Credentials {
    pub fn new(ssid: &str, passphrase: &str) -> Result<Self, CredentialError> {
        validate_ssid(ssid)?;
        validate_passphrase(passphrase)?;
        let mut c = Self {
            ssid: heapless::String::new(),
            passphrase: heapless::String::new(),
        };
        c.ssid.push_str(ssid).map_err(|_| CredentialError::InvalidSsid)?;
        c.passphrase
            .push_str(passphrase)
            .map_err(|_| CredentialError::InvalidPassphrase)?;
        Ok(c)
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    pub fn is_open(&self) -> bool {
        self.passphrase.is_empty()
    }
}

// Never print the passphrase.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), CredentialError> {
    if ssid.is_empty() || ssid.len() > MAX_SSID_LEN || !is_printable_ascii(ssid) {
        return Err(CredentialError::InvalidSsid);
    }
    Ok(())
}

fn validate_passphrase(passphrase: &str) -> Result<(), CredentialError> {
    if passphrase.is_empty() {
        return Ok(());
    }
    if passphrase.len() < MIN_WPA2_PASSPHRASE_LEN || passphrase.len() > MAX_PASSPHRASE_LEN {
        return Err(CredentialError::InvalidPassphrase);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Persistence
// ───────────────────────────────────────────────────────────────

/// Read stored credentials. `Ok(None)` when the device is not provisioned.
pub fn load_credentials(
    store: &dyn ConfigStorePort,
) -> Result<Option<Credentials>, CredentialError> {
    let mut ssid_buf = [0u8; MAX_SSID_LEN];
    let Some(ssid_len) = store.get(SSID_KEY, &mut ssid_buf)? else {
        return Ok(None);
    };
    let mut pass_buf = [0u8; MAX_PASSPHRASE_LEN];
    let pass_len = store.get(PASSPHRASE_KEY, &mut pass_buf)?.unwrap_or(0);

    let ssid = core::str::from_utf8(&ssid_buf[..ssid_len])
        .map_err(|_| CredentialError::InvalidSsid)?;
    let passphrase = core::str::from_utf8(&pass_buf[..pass_len])
        .map_err(|_| CredentialError::InvalidPassphrase)?;
    Credentials::new(ssid, passphrase).map(Some)
}

/// Persist credentials entered on the device.
pub fn store_credentials(
    store: &mut dyn ConfigStorePort,
    credentials: &Credentials,
) -> Result<(), CredentialError> {
    store.put(PASSPHRASE_KEY, credentials.passphrase().as_bytes())?;
    store.put(SSID_KEY, credentials.ssid().as_bytes())?;
    info!("Credentials stored (SSID='{}')", credentials.ssid());
    Ok(())
}
