//! Environment check results

use serde::{Deserialize, Serialize};

/// Availability of the image behind one distro
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCheck {
    pub distro: String,
    /// Name the runtime must resolve, e.g. `fabrica-focal`
    pub alias: String,
    pub available: bool,
}

/// State of one dependency of the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionCheck {
    pub name: String,
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ConnectionCheck {
    pub fn ok(name: &str) -> Self {
        Self {
            name: name.to_string(),
            connected: true,
            message: None,
        }
    }

    pub fn failed(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            connected: false,
            message: Some(message.into()),
        }
    }
}
