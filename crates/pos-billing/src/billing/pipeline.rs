//! sign → validate → authorize, with bounded retries on the authorization step.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::access_key::AccessKey;
use super::document::{Authorization, VoucherStage};
use super::signer::DocumentSigner;
use super::sri::{AuthorizationState, ReceptionState, SriGateway, SriMessage};
use crate::catalog::choices::EnvironmentType;
use crate::catalog::Company;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Total authorization attempts, first call included.
    pub attempts: u32,
    pub retry_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub access_key: String,
    pub authorization_number: String,
    pub authorized_at: DateTime<Utc>,
    pub authorized_xml: String,
}

impl From<PipelineOutcome> for Authorization {
    fn from(value: PipelineOutcome) -> Self {
        Authorization {
            access_key: value.access_key,
            authorization_number: value.authorization_number,
            authorized_at: value.authorized_at,
            authorized_xml: value.authorized_xml,
        }
    }
}

/// Why a document did not get authorized, attributed to the stage that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineFailure {
    pub stage: VoucherStage,
    pub messages: Vec<SriMessage>,
    pub detail: String,
}

impl fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage.as_str(), self.detail)?;
        for message in &self.messages {
            write!(f, "; {} {}", message.identifier, message.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for PipelineFailure {}

impl PipelineFailure {
    pub fn new(stage: VoucherStage, detail: impl Into<String>) -> Self {
        Self {
            stage,
            messages: Vec::new(),
            detail: detail.into(),
        }
    }

    pub fn is_duplicate_sequence(&self) -> bool {
        self.messages.iter().any(SriMessage::is_duplicate_sequence)
    }

    /// Payload stored on the receipt error log.
    pub fn errors_json(&self) -> Value {
        let errors: Vec<Value> = self
            .messages
            .iter()
            .map(|message| {
                json!({
                    "identificador": message.identifier,
                    "mensaje": message.message,
                    "informacionAdicional": message.additional_info,
                    "tipo": message.kind,
                })
            })
            .collect();
        json!({
            "stage": self.stage.as_str(),
            "error": {
                "detail": self.detail,
                "errors": errors,
            },
        })
    }
}

/// Drives a rendered voucher through signing and both SRI services.
pub struct AuthorizationPipeline<G: ?Sized> {
    gateway: Arc<G>,
    signer: Arc<dyn DocumentSigner>,
    config: PipelineConfig,
}

impl<G> AuthorizationPipeline<G>
where
    G: SriGateway + ?Sized,
{
    pub fn new(gateway: Arc<G>, signer: Arc<dyn DocumentSigner>, config: PipelineConfig) -> Self {
        Self {
            gateway,
            signer,
            config,
        }
    }

    pub fn config(&self) -> PipelineConfig {
        self.config
    }

    pub async fn run(
        &self,
        company: &Company,
        environment: EnvironmentType,
        xml: &str,
        key: &AccessKey,
    ) -> Result<PipelineOutcome, PipelineFailure> {
        let signed = self
            .signer
            .sign(company, xml)
            .map_err(|err| PipelineFailure::new(VoucherStage::XmlSignature, err.to_string()))?;

        let reception = self
            .gateway
            .validate(environment, &signed)
            .await
            .map_err(|err| PipelineFailure::new(VoucherStage::XmlValidation, err.to_string()))?;
        if reception.state == ReceptionState::Returned {
            return Err(PipelineFailure {
                stage: VoucherStage::XmlValidation,
                messages: reception.messages,
                detail: "document returned by reception service".to_string(),
            });
        }

        let attempts = self.config.attempts.max(1);
        let mut last_failure = PipelineFailure::new(VoucherStage::XmlAuthorized, "not attempted");
        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.config.retry_delay).await;
            }
            match self.gateway.authorize(environment, key.as_str()).await {
                Ok(response) => match response.state {
                    AuthorizationState::Authorized => {
                        info!(access_key = %key, attempt, "document authorized");
                        return Ok(PipelineOutcome {
                            access_key: key.to_string(),
                            authorization_number: response
                                .authorization_number
                                .unwrap_or_else(|| key.to_string()),
                            authorized_at: response.authorized_at.unwrap_or_else(Utc::now),
                            authorized_xml: response.document.unwrap_or(signed),
                        });
                    }
                    AuthorizationState::Rejected => {
                        return Err(PipelineFailure {
                            stage: VoucherStage::XmlAuthorized,
                            messages: response.messages,
                            detail: "NO AUTORIZADO".to_string(),
                        });
                    }
                    AuthorizationState::Pending => {
                        last_failure = PipelineFailure {
                            stage: VoucherStage::XmlAuthorized,
                            messages: response.messages,
                            detail: "authorization still in process".to_string(),
                        };
                    }
                },
                Err(err) => {
                    last_failure = PipelineFailure::new(VoucherStage::XmlAuthorized, err.to_string());
                }
            }
            warn!(
                access_key = %key,
                attempt,
                attempts,
                reason = %last_failure.detail,
                "authorization attempt failed"
            );
        }
        Err(last_failure)
    }
}
