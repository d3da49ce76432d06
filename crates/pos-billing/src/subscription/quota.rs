use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{active_subscription, Plan, SubscriptionRepository};
use crate::catalog::{Company, CompanyId};
use crate::store::RepositoryError;

/// Resource families limited by a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaKind {
    Invoice,
    Customer,
    Product,
}

impl QuotaKind {
    pub const fn label(self) -> &'static str {
        match self {
            QuotaKind::Invoice => "invoice",
            QuotaKind::Customer => "customer",
            QuotaKind::Product => "product",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "invoice" | "invoices" => Some(Self::Invoice),
            "customer" | "customers" => Some(Self::Customer),
            "product" | "products" => Some(Self::Product),
            _ => None,
        }
    }

    fn limit(self, plan: &Plan) -> u32 {
        match self {
            QuotaKind::Invoice => plan.max_invoices,
            QuotaKind::Customer => plan.max_customers,
            QuotaKind::Product => plan.max_products,
        }
    }
}

impl fmt::Display for QuotaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Counts how many resources of a kind a company already created.
pub trait UsageCounter: Send + Sync {
    fn usage(&self, company: &CompanyId, kind: QuotaKind) -> Result<u64, RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuotaExceeded {
    #[error("no active subscription for the company")]
    NoActiveSubscription,
    #[error("limit reached for {kind} ({current}/{limit})")]
    LimitReached { kind: QuotaKind, current: u64, limit: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    #[error(transparent)]
    Exceeded(#[from] QuotaExceeded),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Report consumed by UI counters: whether one more resource fits into the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaCheck {
    pub kind: QuotaKind,
    pub can_create: bool,
    pub current_count: u64,
    pub max_allowed: u64,
    pub message: String,
}

/// Fails with [`QuotaExceeded`] when `company` may not create another resource of `kind`.
pub fn ensure_quota<S>(
    store: &S,
    company: &Company,
    kind: QuotaKind,
    today: NaiveDate,
) -> Result<(), QuotaError>
where
    S: SubscriptionRepository + UsageCounter + ?Sized,
{
    let check = check_quota(store, company, kind, today)?;
    if check.can_create {
        return Ok(());
    }
    if check.max_allowed == 0 {
        return Err(QuotaExceeded::NoActiveSubscription.into());
    }
    Err(QuotaExceeded::LimitReached {
        kind,
        current: check.current_count,
        limit: check.max_allowed,
    }
    .into())
}

pub fn check_quota<S>(
    store: &S,
    company: &Company,
    kind: QuotaKind,
    today: NaiveDate,
) -> Result<QuotaCheck, RepositoryError>
where
    S: SubscriptionRepository + UsageCounter + ?Sized,
{
    let subscription = match &company.owner {
        Some(owner) => active_subscription(store, owner, today)?,
        None => None,
    };

    let Some((_, plan)) = subscription else {
        return Ok(QuotaCheck {
            kind,
            can_create: false,
            current_count: 0,
            max_allowed: 0,
            message: QuotaExceeded::NoActiveSubscription.to_string(),
        });
    };

    let current = store.usage(&company.id, kind)?;
    let limit = u64::from(kind.limit(&plan));

    // zero means the plan does not cap this resource
    let (can_create, message) = if limit == 0 {
        (true, format!("plan '{}' has no {kind} limit", plan.name))
    } else if current >= limit {
        (
            false,
            QuotaExceeded::LimitReached {
                kind,
                current,
                limit,
            }
            .to_string(),
        )
    } else {
        (true, format!("{} of {limit} {kind} slots left", limit - current))
    };

    Ok(QuotaCheck {
        kind,
        can_create,
        current_count: current,
        max_allowed: limit,
        message,
    })
}
