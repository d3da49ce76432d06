use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::choices::EnvironmentType;

/// Message the reception service returns when a sequence was already used.
pub const DUPLICATE_SEQUENCE_MESSAGE: &str = "ERROR SECUENCIAL REGISTRADO";

/// `mensaje` entry attached to reception and authorization responses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SriMessage {
    pub identifier: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
    #[serde(default)]
    pub kind: String,
}

impl SriMessage {
    pub fn is_duplicate_sequence(&self) -> bool {
        self.message.trim() == DUPLICATE_SEQUENCE_MESSAGE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceptionState {
    /// `RECIBIDA`
    Received,
    /// `DEVUELTA`
    Returned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceptionResponse {
    pub state: ReceptionState,
    pub messages: Vec<SriMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationState {
    /// `AUTORIZADO`
    Authorized,
    /// `NO AUTORIZADO`
    Rejected,
    /// No verdict yet (`EN PROCESO` or no authorization returned).
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    pub state: AuthorizationState,
    pub authorization_number: Option<String>,
    pub authorized_at: Option<DateTime<Utc>>,
    /// Authorized `comprobante` as returned by the authority.
    pub document: Option<String>,
    pub messages: Vec<SriMessage>,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("SRI transport failure: {0}")]
    Transport(String),
    #[error("SRI fault: {0}")]
    Fault(String),
    #[error("unexpected SRI response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

/// The two web services a signed voucher goes through.
#[async_trait]
pub trait SriGateway: Send + Sync {
    /// Submits a signed document to the reception service.
    async fn validate(
        &self,
        environment: EnvironmentType,
        signed_xml: &str,
    ) -> Result<ReceptionResponse, GatewayError>;

    /// Asks the authorization service for the verdict on an access key.
    async fn authorize(
        &self,
        environment: EnvironmentType,
        access_key: &str,
    ) -> Result<AuthorizationResponse, GatewayError>;
}
