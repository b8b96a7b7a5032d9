use serde::{Deserialize, Serialize};

use crate::types::{DeviceConfiguration, Token};

#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub cursor: Option<String>,
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateNamespaceRequest {
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub configuration: Option<DeviceConfiguration>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNamespaceRequest {
    pub is_default: Option<bool>,
    pub configuration: Option<DeviceConfiguration>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSetRequest {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub configuration: Option<DeviceConfiguration>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSetRequest {
    /// `None` leaves the configuration untouched; an explicit `null` clears
    /// it so the set inherits from its namespace again.
    #[serde(default, with = "double_option")]
    pub configuration: Option<Option<DeviceConfiguration>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDeviceRequest {
    pub namespace: Option<String>,
    #[serde(default, with = "double_option")]
    pub set: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub configuration: Option<Option<DeviceConfiguration>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRepositoryRequest {
    pub name: String,
    pub url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_pull_period")]
    pub pull_period_seconds: u32,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_pull_period() -> u32 {
    60
}

#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub device_id: String,
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub csr: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub cert_serial: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedTokenResponse {
    pub token: String,
    pub metadata: Token,
}

/// Distinguishes an absent field from an explicit `null` in PATCH-style
/// requests.
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
