//! Point-of-sale back office for Ecuadorian electronic invoicing.
//!
//! Invoices, sale tickets and credit notes take their numbers from per-issuing-point
//! [`billing::receipt::Receipt`] counters, are rendered to the SRI XML layouts, signed, and
//! pushed through the reception and authorization web services. Creation is gated by the
//! quotas of the tenant's subscription plan.

pub mod accounts;
pub mod billing;
pub mod catalog;
pub mod config;
pub mod error;
pub mod purchasing;
pub mod quotation;
pub mod store;
pub mod subscription;
pub mod telemetry;
