use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::envelope::first_text;
use super::gateway::{
    AuthorizationResponse, AuthorizationState, GatewayError, ReceptionResponse, ReceptionState,
    SriGateway, SriMessage, DUPLICATE_SEQUENCE_MESSAGE,
};
use crate::billing::access_key::AccessKey;
use crate::billing::receipt::{ReceiptNumber, VoucherType};
use crate::catalog::choices::EnvironmentType;

/// (environment, RUC, voucher type, establishment, issuing point, sequence)
type SequenceSlot = (EnvironmentType, String, VoucherType, String, String, u64);

#[derive(Default)]
struct Registry {
    sequences: HashSet<SequenceSlot>,
    received: HashMap<String, String>,
}

/// In-process stand-in for the SRI used in development and demos.
///
/// Every well-formed document is received and authorized under its access key. A sequence
/// received twice for the same issuer and voucher type is returned with the duplicate-sequence
/// message, like the real reception service.
#[derive(Default)]
pub struct OfflineSriGateway {
    registry: Mutex<Registry>,
}

impl OfflineSriGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a sequence as already used, as if another system had submitted it.
    pub fn preregister(
        &self,
        environment: EnvironmentType,
        ruc: &str,
        voucher_type: VoucherType,
        establishment_code: &str,
        issuing_point_code: &str,
        number: ReceiptNumber,
    ) -> Result<(), GatewayError> {
        let mut registry = self.lock()?;
        registry.sequences.insert((
            environment,
            ruc.to_string(),
            voucher_type,
            establishment_code.to_string(),
            issuing_point_code.to_string(),
            number.value(),
        ));
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Registry>, GatewayError> {
        self.registry
            .lock()
            .map_err(|_| GatewayError::Transport("offline registry poisoned".into()))
    }

    fn returned(identifier: &str, message: &str, extra: Option<String>) -> ReceptionResponse {
        ReceptionResponse {
            state: ReceptionState::Returned,
            messages: vec![SriMessage {
                identifier: identifier.to_string(),
                message: message.to_string(),
                additional_info: extra,
                kind: "ERROR".to_string(),
            }],
        }
    }
}

#[async_trait]
impl SriGateway for OfflineSriGateway {
    async fn validate(
        &self,
        environment: EnvironmentType,
        signed_xml: &str,
    ) -> Result<ReceptionResponse, GatewayError> {
        let raw_key = first_text(signed_xml, "claveAcceso")
            .map_err(|err| GatewayError::Parse(err.to_string()))?;
        let Some(raw_key) = raw_key else {
            return Ok(Self::returned("35", "ARCHIVO NO CUMPLE ESTRUCTURA XML", None));
        };
        let (key, parts) = match AccessKey::parse(&raw_key) {
            Ok(parsed) => parsed,
            Err(err) => {
                return Ok(Self::returned("39", "FIRMA INVALIDA", Some(err.to_string())));
            }
        };
        if parts.environment != environment {
            return Ok(Self::returned(
                "57",
                "AMBIENTE NO CORRESPONDE",
                Some(format!("key issued for {}", parts.environment.label())),
            ));
        }

        let slot = (
            parts.environment,
            parts.ruc,
            parts.voucher_type,
            parts.establishment_code,
            parts.issuing_point_code,
            parts.sequence.value(),
        );
        let mut registry = self.lock()?;
        if !registry.sequences.insert(slot) {
            return Ok(Self::returned(
                "45",
                DUPLICATE_SEQUENCE_MESSAGE,
                Some(format!("sequence {} already registered", parts.sequence)),
            ));
        }
        registry
            .received
            .insert(key.into_string(), signed_xml.to_string());
        Ok(ReceptionResponse {
            state: ReceptionState::Received,
            messages: Vec::new(),
        })
    }

    async fn authorize(
        &self,
        _environment: EnvironmentType,
        access_key: &str,
    ) -> Result<AuthorizationResponse, GatewayError> {
        let registry = self.lock()?;
        let Some(document) = registry.received.get(access_key) else {
            return Ok(AuthorizationResponse {
                state: AuthorizationState::Pending,
                authorization_number: None,
                authorized_at: None,
                document: None,
                messages: Vec::new(),
            });
        };
        Ok(AuthorizationResponse {
            state: AuthorizationState::Authorized,
            authorization_number: Some(access_key.to_string()),
            authorized_at: Some(Utc::now()),
            document: Some(document.clone()),
            messages: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::billing::access_key::AccessKeyParts;

    fn key(environment: EnvironmentType, sequence: u64) -> AccessKey {
        AccessKey::generate(&AccessKeyParts {
            issue_date: NaiveDate::from_ymd_opt(2025, 3, 14).expect("valid date"),
            voucher_type: VoucherType::Invoice,
            ruc: "1790012345001".to_string(),
            environment,
            establishment_code: "001".to_string(),
            issuing_point_code: "001".to_string(),
            sequence: ReceiptNumber(sequence),
            numeric_code: "12345678".to_string(),
            emission_type: Default::default(),
        })
        .expect("access key")
    }

    fn document(key: &AccessKey) -> String {
        format!(
            "<factura id=\"comprobante\"><infoTributaria><claveAcceso>{key}</claveAcceso></infoTributaria></factura>"
        )
    }

    #[tokio::test]
    async fn received_documents_are_authorized_under_their_key() {
        let gateway = OfflineSriGateway::new();
        let key = key(EnvironmentType::Test, 1);

        let pending = gateway
            .authorize(EnvironmentType::Test, key.as_str())
            .await
            .expect("verdict");
        assert_eq!(pending.state, AuthorizationState::Pending);

        let reception = gateway
            .validate(EnvironmentType::Test, &document(&key))
            .await
            .expect("reception");
        assert_eq!(reception.state, ReceptionState::Received);

        let verdict = gateway
            .authorize(EnvironmentType::Test, key.as_str())
            .await
            .expect("verdict");
        assert_eq!(verdict.state, AuthorizationState::Authorized);
        assert_eq!(verdict.authorization_number.as_deref(), Some(key.as_str()));
        assert_eq!(verdict.document, Some(document(&key)));
    }

    #[tokio::test]
    async fn reused_sequence_is_returned_as_duplicate() {
        let gateway = OfflineSriGateway::new();
        gateway
            .validate(EnvironmentType::Test, &document(&key(EnvironmentType::Test, 4)))
            .await
            .expect("first");

        let again = gateway
            .validate(EnvironmentType::Test, &document(&key(EnvironmentType::Test, 4)))
            .await
            .expect("second");
        assert_eq!(again.state, ReceptionState::Returned);
        assert!(again.messages[0].is_duplicate_sequence());
        assert_eq!(again.messages[0].identifier, "45");
    }

    #[tokio::test]
    async fn preregistered_sequences_collide() {
        let gateway = OfflineSriGateway::new();
        gateway
            .preregister(
                EnvironmentType::Test,
                "1790012345001",
                VoucherType::Invoice,
                "001",
                "001",
                ReceiptNumber(1),
            )
            .expect("preregistered");

        let response = gateway
            .validate(EnvironmentType::Test, &document(&key(EnvironmentType::Test, 1)))
            .await
            .expect("reception");
        assert!(response.messages.iter().any(SriMessage::is_duplicate_sequence));
    }

    #[tokio::test]
    async fn malformed_and_foreign_documents_are_returned() {
        let gateway = OfflineSriGateway::new();

        let missing = gateway
            .validate(EnvironmentType::Test, "<factura><infoTributaria/></factura>")
            .await
            .expect("reception");
        assert_eq!(missing.messages[0].identifier, "35");

        let production_key = key(EnvironmentType::Production, 1);
        let foreign = gateway
            .validate(EnvironmentType::Test, &document(&production_key))
            .await
            .expect("reception");
        assert_eq!(foreign.state, ReceptionState::Returned);
        assert_eq!(foreign.messages[0].identifier, "57");
    }
}
