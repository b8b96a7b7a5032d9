//! Device identity issuance seam.
//!
//! The control plane does not run a CA. Registration hands the device's CSR
//! to an `IdentityIssuer`; a production deployment plugs in the external PKI
//! service here, while `LocalIssuer` assigns bare serial numbers for
//! development and tests. The serial is what the store tracks against the
//! device.

use rand::Rng;

use crate::error::{Error, Result};

pub trait IdentityIssuer: Send + Sync {
    /// Issue an identity for the device and return its certificate serial.
    fn issue(&self, device_id: &str, csr_pem: &str) -> Result<String>;
}

#[derive(Debug, Default)]
pub struct LocalIssuer;

impl LocalIssuer {
    pub fn new() -> Self {
        Self
    }
}

impl IdentityIssuer for LocalIssuer {
    fn issue(&self, device_id: &str, csr_pem: &str) -> Result<String> {
        if device_id.is_empty() {
            return Err(Error::BadRequest("device id is empty".to_string()));
        }
        if csr_pem.trim().is_empty() {
            return Err(Error::BadRequest("certificate request is empty".to_string()));
        }

        let mut bytes = [0u8; 16];
        rand::thread_rng().fill(&mut bytes);
        Ok(hex::encode(bytes))
    }
}
