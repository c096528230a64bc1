//! Client configuration from the environment.
//!
//! | Variable                       | Default                        |
//! |--------------------------------|--------------------------------|
//! | `SCOUTNET_API_ID`              | required                       |
//! | `SCOUTNET_API_ENDPOINT`        | `https://www.scoutnet.se/api`  |
//! | `SCOUTNET_API_KEY_MEMBERLIST`  | unset                          |
//! | `SCOUTNET_API_KEY_CUSTOMLISTS` | unset                          |
//! | `SCOUTNET_DEFAULT_REGION`      | `SE`                           |
//!
//! Empty values are treated as unset.

use crate::client::DEFAULT_API_ENDPOINT;
use crate::error::{ApiError, Result};
use crate::validate::Region;

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_id: String,
    pub endpoint: String,
    pub memberlist_key: Option<String>,
    pub customlists_key: Option<String>,
    pub default_region: Region,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_id = get("SCOUTNET_API_ID")
            .ok_or_else(|| ApiError::Config("SCOUTNET_API_ID is not set".to_string()))?;
        let default_region = match get("SCOUTNET_DEFAULT_REGION") {
            Some(code) => Region::new(&code)
                .map_err(|e| ApiError::Config(format!("SCOUTNET_DEFAULT_REGION: {e}")))?,
            None => Region::default(),
        };

        Ok(Self {
            api_id,
            endpoint: get("SCOUTNET_API_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string()),
            memberlist_key: get("SCOUTNET_API_KEY_MEMBERLIST"),
            customlists_key: get("SCOUTNET_API_KEY_CUSTOMLISTS"),
            default_region,
        })
    }
}
