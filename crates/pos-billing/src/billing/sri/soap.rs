use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::debug;

use super::envelope::{walk, Node};
use super::gateway::{
    AuthorizationResponse, AuthorizationState, GatewayError, ReceptionResponse, ReceptionState,
    SriGateway, SriMessage,
};
use crate::catalog::choices::EnvironmentType;

const TEST_BASE_URL: &str = "https://celcer.sri.gob.ec";
const PRODUCTION_BASE_URL: &str = "https://cel.sri.gob.ec";
const RECEPTION_PATH: &str = "/comprobantes-electronicos-ws/RecepcionComprobantesOffline";
const AUTHORIZATION_PATH: &str = "/comprobantes-electronicos-ws/AutorizacionComprobantesOffline";

/// Base URLs per environment; overridable so tests can point at a local server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SriEndpoints {
    pub test: String,
    pub production: String,
}

impl Default for SriEndpoints {
    fn default() -> Self {
        Self {
            test: TEST_BASE_URL.to_string(),
            production: PRODUCTION_BASE_URL.to_string(),
        }
    }
}

impl SriEndpoints {
    fn base(&self, environment: EnvironmentType) -> &str {
        match environment {
            EnvironmentType::Test => &self.test,
            EnvironmentType::Production => &self.production,
        }
    }
}

/// SOAP 1.1 client for the offline reception and authorization services.
pub struct SoapSriClient {
    client: Client,
    endpoints: SriEndpoints,
}

impl SoapSriClient {
    pub fn new(timeout: Duration) -> Result<Self, GatewayError> {
        Self::with_endpoints(timeout, SriEndpoints::default())
    }

    pub fn with_endpoints(timeout: Duration, endpoints: SriEndpoints) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, endpoints })
    }

    async fn call(&self, url: String, envelope: String) -> Result<String, GatewayError> {
        debug!(%url, "calling SRI web service");
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", "")
            .body(envelope)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if let Some(fault) = parse_fault(&body)? {
            return Err(GatewayError::Fault(fault));
        }
        if !status.is_success() {
            return Err(GatewayError::Transport(format!("HTTP {status} from {url}")));
        }
        Ok(body)
    }
}

#[async_trait]
impl SriGateway for SoapSriClient {
    async fn validate(
        &self,
        environment: EnvironmentType,
        signed_xml: &str,
    ) -> Result<ReceptionResponse, GatewayError> {
        let url = format!("{}{RECEPTION_PATH}", self.endpoints.base(environment));
        let body = self.call(url, reception_envelope(signed_xml)).await?;
        parse_reception(&body)
    }

    async fn authorize(
        &self,
        environment: EnvironmentType,
        access_key: &str,
    ) -> Result<AuthorizationResponse, GatewayError> {
        let url = format!("{}{AUTHORIZATION_PATH}", self.endpoints.base(environment));
        let body = self.call(url, authorization_envelope(access_key)).await?;
        parse_authorization(&body)
    }
}

pub(crate) fn reception_envelope(signed_xml: &str) -> String {
    format!(
        concat!(
            r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:ec="http://ec.gob.sri.ws.recepcion">"#,
            "<soapenv:Header/><soapenv:Body><ec:validarComprobante><xml>{}</xml></ec:validarComprobante></soapenv:Body></soapenv:Envelope>"
        ),
        BASE64.encode(signed_xml.as_bytes())
    )
}

pub(crate) fn authorization_envelope(access_key: &str) -> String {
    format!(
        concat!(
            r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:ec="http://ec.gob.sri.ws.autorizacion">"#,
            "<soapenv:Header/><soapenv:Body><ec:autorizacionComprobante><claveAccesoComprobante>{}</claveAccesoComprobante></ec:autorizacionComprobante></soapenv:Body></soapenv:Envelope>"
        ),
        quick_xml::escape::escape(access_key)
    )
}

fn parse_error(err: impl ToString) -> GatewayError {
    GatewayError::Parse(err.to_string())
}

fn parent_is(path: &[String], parent: &str) -> bool {
    path.len() >= 2 && path[path.len() - 2] == parent
}

/// Collects `mensaje` entries; call for every node of the walk.
fn collect_message(node: Node<'_>, messages: &mut Vec<SriMessage>) {
    match node {
        Node::Open(path)
            if path.last().is_some_and(|name| name == "mensaje") && parent_is(path, "mensajes") =>
        {
            messages.push(SriMessage::default());
        }
        Node::Text(path, text) if parent_is(path, "mensaje") => {
            let Some(current) = messages.last_mut() else {
                return;
            };
            match path.last().map(String::as_str) {
                Some("identificador") => current.identifier = text.to_string(),
                Some("mensaje") => current.message = text.to_string(),
                Some("informacionAdicional") => current.additional_info = Some(text.to_string()),
                Some("tipo") => current.kind = text.to_string(),
                _ => {}
            }
        }
        _ => {}
    }
}

pub(crate) fn parse_fault(body: &str) -> Result<Option<String>, GatewayError> {
    let mut fault = None;
    walk(body, |node| {
        if let Node::Text(path, text) = node {
            if path.last().is_some_and(|name| name == "faultstring") {
                fault = Some(text.to_string());
            }
        }
    })
    .map_err(parse_error)?;
    Ok(fault)
}

pub(crate) fn parse_reception(body: &str) -> Result<ReceptionResponse, GatewayError> {
    let mut state = None;
    let mut messages = Vec::new();
    walk(body, |node| {
        if let Node::Text(path, text) = node {
            if path.last().is_some_and(|name| name == "estado")
                && parent_is(path, "RespuestaRecepcionComprobante")
            {
                state = Some(text.trim().to_string());
            }
        }
        collect_message(node, &mut messages);
    })
    .map_err(parse_error)?;

    let state = match state.as_deref() {
        Some("RECIBIDA") => ReceptionState::Received,
        Some("DEVUELTA") => ReceptionState::Returned,
        Some(other) => return Err(parse_error(format!("unknown reception state '{other}'"))),
        None => return Err(parse_error("reception response without estado")),
    };
    Ok(ReceptionResponse { state, messages })
}

pub(crate) fn parse_authorization(body: &str) -> Result<AuthorizationResponse, GatewayError> {
    let mut state = None;
    let mut number = None;
    let mut date = None;
    let mut document = None;
    let mut messages = Vec::new();

    walk(body, |node| {
        if let Node::Text(path, text) = node {
            if parent_is(path, "autorizacion") {
                match path.last().map(String::as_str) {
                    Some("estado") => state = Some(text.trim().to_string()),
                    Some("numeroAutorizacion") => number = Some(text.trim().to_string()),
                    Some("fechaAutorizacion") => date = Some(text.trim().to_string()),
                    Some("comprobante") => document = Some(text.to_string()),
                    _ => {}
                }
            }
        }
        collect_message(node, &mut messages);
    })
    .map_err(parse_error)?;

    // no autorizacion element yet means the voucher is still being processed
    let state = match state.as_deref() {
        Some("AUTORIZADO") => AuthorizationState::Authorized,
        Some("NO AUTORIZADO") => AuthorizationState::Rejected,
        _ => AuthorizationState::Pending,
    };
    let authorized_at = date
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|parsed| parsed.with_timezone(&Utc));

    Ok(AuthorizationResponse {
        state,
        authorization_number: number,
        authorized_at,
        document,
        messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returned_reception_exposes_duplicate_message() {
        let body = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>
            <ns2:validarComprobanteResponse xmlns:ns2="http://ec.gob.sri.ws.recepcion">
              <RespuestaRecepcionComprobante>
                <estado>DEVUELTA</estado>
                <comprobantes><comprobante>
                  <claveAcceso>1403202501179001234500110010020000000421234567811</claveAcceso>
                  <mensajes><mensaje>
                    <identificador>45</identificador>
                    <mensaje>ERROR SECUENCIAL REGISTRADO</mensaje>
                    <tipo>ERROR</tipo>
                  </mensaje></mensajes>
                </comprobante></comprobantes>
              </RespuestaRecepcionComprobante>
            </ns2:validarComprobanteResponse></soap:Body></soap:Envelope>"#;
        let response = parse_reception(body).expect("parses");
        assert_eq!(response.state, ReceptionState::Returned);
        assert_eq!(response.messages.len(), 1);
        assert!(response.messages[0].is_duplicate_sequence());
        assert_eq!(response.messages[0].identifier, "45");
    }

    #[test]
    fn authorized_response_carries_number_date_and_document() {
        let body = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>
            <ns2:autorizacionComprobanteResponse xmlns:ns2="http://ec.gob.sri.ws.autorizacion">
              <RespuestaAutorizacionComprobante>
                <claveAccesoConsultada>123</claveAccesoConsultada>
                <numeroComprobantes>1</numeroComprobantes>
                <autorizaciones><autorizacion>
                  <estado>AUTORIZADO</estado>
                  <numeroAutorizacion>123</numeroAutorizacion>
                  <fechaAutorizacion>2025-03-14T10:20:30-05:00</fechaAutorizacion>
                  <ambiente>PRUEBAS</ambiente>
                  <comprobante><![CDATA[<factura id="comprobante"></factura>]]></comprobante>
                  <mensajes/>
                </autorizacion></autorizaciones>
              </RespuestaAutorizacionComprobante>
            </ns2:autorizacionComprobanteResponse></soap:Body></soap:Envelope>"#;
        let response = parse_authorization(body).expect("parses");
        assert_eq!(response.state, AuthorizationState::Authorized);
        assert_eq!(response.authorization_number.as_deref(), Some("123"));
        assert_eq!(
            response.authorized_at.map(|at| at.to_rfc3339()),
            Some("2025-03-14T15:20:30+00:00".to_string())
        );
        assert_eq!(response.document.as_deref(), Some(r#"<factura id="comprobante"></factura>"#));
    }

    #[test]
    fn empty_authorization_list_is_pending() {
        let body = "<Envelope><Body><RespuestaAutorizacionComprobante><autorizaciones/></RespuestaAutorizacionComprobante></Body></Envelope>";
        let response = parse_authorization(body).expect("parses");
        assert_eq!(response.state, AuthorizationState::Pending);
    }

    #[test]
    fn fault_string_is_extracted() {
        let body = "<Envelope><Body><Fault><faultcode>soap:Server</faultcode><faultstring>boom</faultstring></Fault></Body></Envelope>";
        assert_eq!(parse_fault(body).expect("parses"), Some("boom".to_string()));
    }

    #[test]
    fn reception_envelope_base64_encodes_document() {
        let envelope = reception_envelope("<factura/>");
        assert!(envelope.contains("<xml>PGZhY3R1cmEvPg==</xml>"));
    }
}
