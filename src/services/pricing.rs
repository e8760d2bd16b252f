//! Checkout arithmetic: subtotal, coupon, GST and shipping.
//!
//! All amounts are rupees, rounded to paise at every step so the stored
//! breakdown always adds up to the stored total.

use serde::Serialize;

use crate::models::OrderItem;
use crate::utils::AppError;

pub const TAX_RATE: f64 = 0.18;
pub const FREE_SHIPPING_THRESHOLD: f64 = 1000.0;
pub const SHIPPING_FEE: f64 = 50.0;

pub const WELCOME_COUPON: &str = "WELCOME10";
pub const WELCOME_COUPON_RATE: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, utoipa::ToSchema)]
pub struct PriceBreakdown {
    pub items_price: f64,
    pub discount: f64,
    pub tax_price: f64,
    pub shipping_price: f64,
    pub total_price: f64,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Normalised coupon code, or an error for anything other than the welcome code.
pub fn normalize_coupon(code: Option<&str>) -> Result<Option<String>, AppError> {
    match code.map(str::trim).filter(|c| !c.is_empty()) {
        None => Ok(None),
        Some(c) if c.eq_ignore_ascii_case(WELCOME_COUPON) => Ok(Some(WELCOME_COUPON.to_string())),
        Some(c) => Err(AppError::BadRequest(format!("Invalid coupon code: {}", c))),
    }
}

pub fn coupon_discount(coupon: Option<&str>, items_price: f64) -> f64 {
    match coupon {
        Some(c) if c == WELCOME_COUPON => round2(items_price * WELCOME_COUPON_RATE),
        _ => 0.0,
    }
}

pub fn shipping_for(items_price: f64) -> f64 {
    if items_price > FREE_SHIPPING_THRESHOLD || items_price <= 0.0 {
        0.0
    } else {
        SHIPPING_FEE
    }
}

pub fn price_items(items: &[OrderItem], coupon: Option<&str>) -> PriceBreakdown {
    let items_price = round2(items.iter().map(OrderItem::line_total).sum());
    let discount = coupon_discount(coupon, items_price);
    let tax_price = round2((items_price - discount) * TAX_RATE);
    let shipping_price = shipping_for(items_price);
    let total_price = round2(items_price - discount + tax_price + shipping_price);

    PriceBreakdown {
        items_price,
        discount,
        tax_price,
        shipping_price,
        total_price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price: f64, quantity: u32) -> OrderItem {
        OrderItem {
            product_id: "p".into(),
            name: "Item".into(),
            image: None,
            price,
            quantity,
            size: None,
            color: None,
            sku: None,
        }
    }

    #[test]
    fn test_small_order_pays_shipping_and_tax() {
        let p = price_items(&[item(200.0, 2)], None);
        assert_eq!(p.items_price, 400.0);
        assert_eq!(p.discount, 0.0);
        assert_eq!(p.tax_price, 72.0);
        assert_eq!(p.shipping_price, SHIPPING_FEE);
        assert_eq!(p.total_price, 522.0);
    }

    #[test]
    fn test_free_shipping_only_above_threshold() {
        assert_eq!(price_items(&[item(1000.0, 1)], None).shipping_price, SHIPPING_FEE);
        assert_eq!(price_items(&[item(1000.5, 1)], None).shipping_price, 0.0);
    }

    #[test]
    fn test_welcome_coupon_takes_ten_percent() {
        let without = price_items(&[item(1500.0, 1)], None);
        let with = price_items(&[item(1500.0, 1)], Some(WELCOME_COUPON));
        assert_eq!(with.discount, 150.0);
        assert_eq!(with.tax_price, 243.0);
        assert_eq!(with.total_price, 1593.0);
        assert!(with.total_price < without.total_price);
    }

    #[test]
    fn test_rounding_to_paise() {
        let p = price_items(&[item(99.99, 3)], Some(WELCOME_COUPON));
        assert_eq!(p.items_price, 299.97);
        assert_eq!(p.discount, 30.0);
        assert_eq!(p.tax_price, 48.59);
        assert_eq!(p.total_price, round2(299.97 - 30.0 + 48.59 + 50.0));
    }

    #[test]
    fn test_coupon_normalization() {
        assert_eq!(normalize_coupon(None).unwrap(), None);
        assert_eq!(normalize_coupon(Some("  ")).unwrap(), None);
        assert_eq!(normalize_coupon(Some("welcome10")).unwrap().as_deref(), Some(WELCOME_COUPON));
        assert!(matches!(normalize_coupon(Some("FREE50")), Err(AppError::BadRequest(_))));
    }
}
