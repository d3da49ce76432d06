use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::company::CompanyId;
use super::product::ProductId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PromotionId(pub String);

/// Time-boxed price reduction over a set of products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: PromotionId,
    pub company: CompanyId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub lines: Vec<PromotionLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionLine {
    pub product: ProductId,
    pub current_price: Decimal,
    /// Fraction of the current price taken off (0.10 for 10%).
    pub discount: Decimal,
}

impl PromotionLine {
    /// Discount truncated to cents so the customer never receives more than advertised.
    pub fn total_discount(&self) -> Decimal {
        (self.current_price * self.discount).round_dp_with_strategy(2, RoundingStrategy::ToNegativeInfinity)
    }

    pub fn final_price(&self) -> Decimal {
        self.current_price - self.total_discount()
    }
}

impl Promotion {
    /// A promotion whose end does not come after its start never activates.
    pub fn is_active(&self) -> bool {
        self.end_date > self.start_date
    }

    pub fn applies_on(&self, day: NaiveDate) -> bool {
        self.is_active() && self.start_date <= day && day <= self.end_date
    }

    pub fn line_for(&self, product: &ProductId) -> Option<&PromotionLine> {
        self.lines.iter().find(|line| &line.product == product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).expect("valid date")
    }

    #[test]
    fn discount_is_floored_to_cents() {
        let line = PromotionLine {
            product: ProductId("prd-1".to_string()),
            current_price: Decimal::new(999, 2),
            discount: Decimal::new(15, 2),
        };
        // 9.99 * 0.15 = 1.4985
        assert_eq!(line.total_discount(), Decimal::new(149, 2));
        assert_eq!(line.final_price(), Decimal::new(850, 2));
    }

    #[test]
    fn same_day_window_is_inactive() {
        let promotion = Promotion {
            id: PromotionId("pro-1".to_string()),
            company: CompanyId("cmp-1".to_string()),
            start_date: day(4),
            end_date: day(4),
            lines: Vec::new(),
        };
        assert!(!promotion.is_active());
        assert!(!promotion.applies_on(day(4)));
    }
}
