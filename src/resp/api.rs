use std::fmt::{Display, Formatter};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::util;

pub const NOT_CONFIGURED_MESSAGE: &str = "Apps Script URL chưa được cấu hình";
pub const EXCERPT_CHARS: usize = 100;

/// Gateway reply envelope: `{success, error?, ...actionSpecificFields}`.
///
/// Every failure, local or remote, ends up in this same shape so callers branch once on
/// `success`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl ApiResponse {
    pub fn ok() -> ApiResponse {
        ApiResponse {
            success: true,
            error: None,
            body: Map::new(),
        }
    }

    pub fn failure(error: impl ToString) -> ApiResponse {
        ApiResponse {
            success: false,
            error: Some(error.to_string()),
            body: Map::new(),
        }
    }

    pub fn insert<V: Serialize>(mut self, key: impl ToString, value: V) -> ApiResponse {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.body.insert(key.to_string(), value);
        self
    }

    /// Typed view of one action-specific field. Absent and `null` fields read as `None`.
    pub fn field<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, GatewayError> {
        match self.body.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| GatewayError::InvalidResponse(format!("field '{}': {}", key, e))),
        }
    }

    /// Typed view of the whole body.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, GatewayError> {
        serde_json::from_value(Value::Object(self.body.clone()))
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }

    /// Turns a well-formed `{success: false}` into [`GatewayError::Rejected`].
    pub fn into_result(self) -> Result<ApiResponse, GatewayError> {
        if self.success {
            Ok(self)
        } else {
            Err(GatewayError::Rejected(
                self.error
                    .filter(|it| !it.trim().is_empty())
                    .unwrap_or_else(|| "request failed".to_string()),
            ))
        }
    }
}

impl Display for ApiResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (&self.success, &self.error) {
            (true, _) => write!(f, "success"),
            (false, Some(error)) => write!(f, "failure: {}", error),
            (false, None) => write!(f, "failure"),
        }
    }
}

/// Failure taxonomy of gateway calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// No usable endpoint cached. Nothing was sent.
    #[error("{}", NOT_CONFIGURED_MESSAGE)]
    NotConfigured,
    /// Network failure or a non-2xx status without a usable body.
    #[error("{0}")]
    Transport(String),
    /// Body wasn't a JSON envelope. Holds a diagnostic excerpt of the raw body.
    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
    /// Well-formed failure reported by the gateway, passed through verbatim.
    #[error("{0}")]
    Rejected(String),
    /// Request payload couldn't be encoded. Nothing was sent.
    #[error("unable to encode request: {0}")]
    Encode(String),
}

impl GatewayError {
    pub fn invalid_body(raw: &str) -> GatewayError {
        GatewayError::InvalidResponse(util::excerpt(raw, EXCERPT_CHARS).to_string())
    }
}

impl From<GatewayError> for ApiResponse {
    fn from(e: GatewayError) -> Self {
        ApiResponse::failure(e)
    }
}
