//! Subscription plans and the per-plan creation quotas enforced on tenants.

pub mod plan;
pub mod quota;

pub use plan::{cheapest_plan, public_plans, Plan, PlanId, Subscription, SubscriptionId};
pub use quota::{check_quota, ensure_quota, QuotaCheck, QuotaError, QuotaExceeded, QuotaKind, UsageCounter};

use chrono::NaiveDate;

use crate::catalog::UserId;
use crate::store::RepositoryError;

/// Storage abstraction for plans and subscriptions.
pub trait SubscriptionRepository: Send + Sync {
    fn plans(&self) -> Result<Vec<Plan>, RepositoryError>;
    fn plan(&self, id: &PlanId) -> Result<Option<Plan>, RepositoryError>;
    fn save_plan(&self, plan: Plan) -> Result<(), RepositoryError>;
    fn subscriptions_for(&self, owner: &UserId) -> Result<Vec<Subscription>, RepositoryError>;
    fn save_subscription(&self, subscription: Subscription) -> Result<(), RepositoryError>;
}

/// Latest-starting active subscription of `owner` together with its plan.
///
/// An expired subscription is deactivated and persisted on the way out, in which case the
/// owner has no active subscription.
pub fn active_subscription<R>(
    repository: &R,
    owner: &UserId,
    today: NaiveDate,
) -> Result<Option<(Subscription, Plan)>, RepositoryError>
where
    R: SubscriptionRepository + ?Sized,
{
    let latest = repository
        .subscriptions_for(owner)?
        .into_iter()
        .filter(|subscription| subscription.is_active)
        .max_by_key(|subscription| subscription.start_date);

    let Some(mut subscription) = latest else {
        return Ok(None);
    };

    if subscription.deactivate_if_expired(today) {
        tracing::info!(
            subscription_id = %subscription.id.0,
            owner = %owner.0,
            "subscription expired; deactivated"
        );
        repository.save_subscription(subscription)?;
        return Ok(None);
    }

    let plan = repository
        .plan(&subscription.plan)?
        .ok_or(RepositoryError::NotFound)?;
    Ok(Some((subscription, plan)))
}
