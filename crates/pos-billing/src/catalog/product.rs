use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::company::CompanyId;
use super::promotion::Promotion;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub company: CompanyId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub company: CompanyId,
    #[serde(default)]
    pub category: Option<CategoryId>,
    pub code: String,
    pub name: String,
    /// Purchase cost.
    #[serde(default)]
    pub price: Decimal,
    /// Sale price before tax.
    pub pvp: Decimal,
    #[serde(default = "default_true")]
    pub has_tax: bool,
    #[serde(default = "default_true")]
    pub is_inventoried: bool,
    #[serde(default)]
    pub stock: i64,
}

fn default_true() -> bool {
    true
}

impl Product {
    /// Sale price honoring the first promotion covering the product on `day`.
    pub fn current_price(&self, promotions: &[Promotion], day: NaiveDate) -> Decimal {
        promotions
            .iter()
            .filter(|promotion| promotion.applies_on(day))
            .find_map(|promotion| promotion.line_for(&self.id))
            .map(|line| line.final_price())
            .filter(|price| !price.is_zero())
            .unwrap_or(self.pvp)
    }

    pub fn benefit(&self) -> Decimal {
        (self.pvp - self.price).round_dp(2)
    }

    /// Stock movements only apply to inventoried products. Saturates at the `i64` bounds.
    pub fn adjust_stock(&mut self, delta: i64) {
        if self.is_inventoried {
            self.stock = self.stock.saturating_add(delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::promotion::{PromotionId, PromotionLine};

    fn product() -> Product {
        Product {
            id: ProductId("prd-1".to_string()),
            company: CompanyId("cmp-1".to_string()),
            category: None,
            code: "P001".to_string(),
            name: "Cafe molido".to_string(),
            price: Decimal::new(400, 2),
            pvp: Decimal::new(1000, 2),
            has_tax: true,
            is_inventoried: true,
            stock: 5,
        }
    }

    #[test]
    fn promotion_price_applies_inside_window() {
        let day = |d| NaiveDate::from_ymd_opt(2025, 6, d).expect("valid date");
        let promotion = Promotion {
            id: PromotionId("pro-1".to_string()),
            company: CompanyId("cmp-1".to_string()),
            start_date: day(1),
            end_date: day(10),
            lines: vec![PromotionLine {
                product: ProductId("prd-1".to_string()),
                current_price: Decimal::new(1000, 2),
                discount: Decimal::new(20, 2),
            }],
        };
        let item = product();
        assert_eq!(item.current_price(&[promotion.clone()], day(5)), Decimal::new(800, 2));
        assert_eq!(item.current_price(&[promotion], day(20)), item.pvp);
    }

    #[test]
    fn non_inventoried_products_keep_stock() {
        let mut item = product();
        item.is_inventoried = false;
        item.adjust_stock(-3);
        assert_eq!(item.stock, 5);
    }

    #[test]
    fn stock_movements_saturate() {
        let mut item = product();
        item.adjust_stock(i64::MAX);
        assert_eq!(item.stock, i64::MAX);
        item.adjust_stock(-1);
        assert_eq!(item.stock, i64::MAX - 1);
    }
}
