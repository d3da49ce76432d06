//! Clients for the SRI reception and authorization web services.

pub mod envelope;
pub mod gateway;
pub mod offline;
pub mod soap;

pub use gateway::{
    AuthorizationResponse, AuthorizationState, GatewayError, ReceptionResponse, ReceptionState,
    SriGateway, SriMessage, DUPLICATE_SEQUENCE_MESSAGE,
};
pub use offline::OfflineSriGateway;
pub use soap::SoapSriClient;
