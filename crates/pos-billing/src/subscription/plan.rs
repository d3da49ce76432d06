use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub String);

/// Commercial plan. A limit of zero means the resource is unlimited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub max_invoices: u32,
    pub max_customers: u32,
    pub max_products: u32,
    pub price: Decimal,
    pub period_days: u32,
    pub active: bool,
}

/// Active plans ordered by price, then name.
pub fn public_plans(plans: &[Plan]) -> Vec<Plan> {
    let mut listed: Vec<Plan> = plans.iter().filter(|plan| plan.active).cloned().collect();
    listed.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.name.cmp(&b.name)));
    listed
}

pub fn cheapest_plan(plans: &[Plan]) -> Option<Plan> {
    public_plans(plans).into_iter().next()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub owner: UserId,
    pub plan: PlanId,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
    pub canceled_at: Option<DateTime<Utc>>,
}

impl Subscription {
    /// New active subscription ending `period_days` after `start_date`.
    pub fn start(id: SubscriptionId, owner: UserId, plan: &Plan, start_date: NaiveDate) -> Self {
        Self {
            id,
            owner,
            plan: plan.id.clone(),
            start_date,
            end_date: Some(start_date + Duration::days(i64::from(plan.period_days))),
            is_active: true,
            canceled_at: None,
        }
    }

    pub fn expired(&self, today: NaiveDate) -> bool {
        self.end_date.is_some_and(|end| end < today)
    }

    pub fn days_left(&self, today: NaiveDate) -> Option<i64> {
        self.end_date.map(|end| (end - today).num_days())
    }

    /// Returns true when the subscription was switched off by this call.
    pub fn deactivate_if_expired(&mut self, today: NaiveDate) -> bool {
        if self.is_active && self.expired(today) {
            self.is_active = false;
            return true;
        }
        false
    }

    pub fn cancel(&mut self, at: DateTime<Utc>) {
        self.is_active = false;
        self.canceled_at = Some(at);
    }
}
