//! Tenant master data: companies, customers, products, providers and promotions.

pub mod choices;
pub mod company;
pub mod customer;
pub mod product;
pub mod promotion;
pub mod provider;
pub mod repository;
pub mod service;

pub use company::{Company, CompanyId, CompanyValidationError, UserId};
pub use customer::{Customer, CustomerId};
pub use product::{Category, CategoryId, Product, ProductId};
pub use promotion::{Promotion, PromotionId, PromotionLine};
pub use provider::{Provider, ProviderId};
pub use repository::CatalogRepository;
pub use service::{CatalogError, CatalogService};
