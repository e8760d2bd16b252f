use askama::Template;
use chrono::{DateTime, Utc};

use crate::{
    models::{Order, OrderItem, ShippingAddress},
    utils::{AppError, AppResult},
};

pub struct StoreInfo<'a> {
    pub name: &'a str,
    pub gstin: Option<&'a str>,
}

fn format_date(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|d| d.format("%d %b %Y").to_string())
        .unwrap_or_default()
}

fn inr(amount: f64) -> String {
    format!("₹{:.2}", amount)
}

/// Invoice line, amounts already formatted.
#[derive(Debug, Clone)]
pub struct InvoiceLineView {
    pub name: String,
    pub variant: Option<String>,
    pub quantity: u32,
    pub price: String,
    pub total: String,
}

impl From<&OrderItem> for InvoiceLineView {
    fn from(item: &OrderItem) -> Self {
        let mut variant = Vec::new();
        if let Some(size) = &item.size {
            variant.push(format!("Size: {}", size));
        }
        if let Some(color) = &item.color {
            variant.push(format!("Color: {}", color));
        }

        Self {
            name: item.name.clone(),
            variant: (!variant.is_empty()).then(|| variant.join(" | ")),
            quantity: item.quantity,
            price: inr(item.price),
            total: inr(item.line_total()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InvoiceOrderView {
    pub order_number: String,
    pub date: String,
    pub status: String,
    pub payment_method: String,
    pub payment_status: String,
    pub address: ShippingAddress,
    pub subtotal: String,
    pub discount: Option<String>,
    pub coupon_code: Option<String>,
    pub tax: String,
    pub shipping: String,
    pub total: String,
}

impl From<&Order> for InvoiceOrderView {
    fn from(order: &Order) -> Self {
        let mut address = order.shipping_address.clone();
        address.line2 = address.line2.filter(|l| !l.trim().is_empty());

        Self {
            order_number: order.order_number.clone(),
            date: format_date(order.created_at),
            status: order.status.to_string(),
            payment_method: order.payment_method.label().to_string(),
            payment_status: serde_json::to_value(order.payment_status)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            address,
            subtotal: inr(order.items_price),
            discount: (order.discount > 0.0).then(|| inr(order.discount)),
            coupon_code: order.coupon_code.clone(),
            tax: inr(order.tax_price),
            shipping: if order.shipping_price == 0.0 {
                "FREE".to_string()
            } else {
                inr(order.shipping_price)
            },
            total: inr(order.total_price),
        }
    }
}

/// Printable tax invoice.
#[derive(Template)]
#[template(path = "invoice.html")]
pub struct InvoiceTemplate {
    pub store_name: String,
    pub gstin: Option<String>,
    pub order: InvoiceOrderView,
    pub line_items: Vec<InvoiceLineView>,
}

/// Renders a printable HTML invoice for an order.
pub fn render_invoice(order: &Order, store: &StoreInfo<'_>) -> AppResult<String> {
    let template = InvoiceTemplate {
        store_name: store.name.to_string(),
        gstin: store.gstin.map(str::to_string),
        order: InvoiceOrderView::from(order),
        line_items: order.items.iter().map(InvoiceLineView::from).collect(),
    };

    template.render().map_err(|e| {
        log::error!("❌ Invoice template render error for {}: {}", order.order_number, e);
        AppError::Internal(format!("Invoice rendering failed: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderStatus, PaymentMethod, PaymentStatus};

    fn order() -> Order {
        Order {
            id: None,
            order_number: "ORD-20260101-00042".into(),
            user: "u".into(),
            items: vec![OrderItem {
                product_id: "p".into(),
                name: "Kurta <Cotton>".into(),
                image: None,
                price: 600.0,
                quantity: 2,
                size: Some("M".into()),
                color: None,
                sku: None,
            }],
            shipping_address: ShippingAddress {
                full_name: "Asha Rao".into(),
                phone: "9876543210".into(),
                line1: "12 MG Road".into(),
                line2: None,
                city: "Bengaluru".into(),
                state: "Karnataka".into(),
                postal_code: "560001".into(),
                country: "India".into(),
            },
            payment_method: PaymentMethod::Cod,
            payment_status: PaymentStatus::Pending,
            items_price: 1200.0,
            discount: 120.0,
            coupon_code: Some("WELCOME10".into()),
            tax_price: 194.4,
            shipping_price: 0.0,
            total_price: 1274.4,
            status: OrderStatus::Pending,
            status_history: vec![],
            tracking_number: None,
            notes: None,
            cancel_reason: None,
            paid_at: None,
            delivered_at: None,
            cancelled_at: None,
            created_at: 1_767_225_600, // 2026-01-01
            updated_at: 1_767_225_600,
        }
    }

    #[test]
    fn test_invoice_contains_breakdown() {
        let html = render_invoice(&order(), &StoreInfo { name: "Saree & Co", gstin: Some("29ABCDE1234F1Z5") }).unwrap();
        assert!(html.contains("Invoice #: ORD-20260101-00042"));
        assert!(html.contains("Saree &amp; Co"));
        assert!(html.contains("GSTIN: 29ABCDE1234F1Z5"));
        assert!(html.contains("Date: 01 Jan 2026"));
        assert!(html.contains("Discount (WELCOME10)"));
        assert!(html.contains("-₹120.00"));
        assert!(html.contains("₹1274.40"));
        assert!(html.contains(">FREE<"));
        assert!(html.contains("Cash on Delivery"));
        assert!(html.contains("Payment status: pending"));
    }

    #[test]
    fn test_invoice_escapes_user_text() {
        let html = render_invoice(&order(), &StoreInfo { name: "Shop", gstin: None }).unwrap();
        assert!(html.contains("Kurta &lt;Cotton&gt;"));
        assert!(!html.contains("<Cotton>"));
        assert!(!html.contains("GSTIN"));
    }

    #[test]
    fn test_invoice_escapes_address_and_coupon() {
        let mut order = order();
        order.shipping_address.line2 = Some("<script>alert(1)</script>".into());
        order.coupon_code = Some("<b>".into());
        let html = render_invoice(&order, &StoreInfo { name: "Shop", gstin: None }).unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("(<b>)"));
    }

    #[test]
    fn test_line_view_variant() {
        let order = order();
        let view = InvoiceLineView::from(&order.items[0]);
        assert_eq!(view.variant.as_deref(), Some("Size: M"));
        assert_eq!(view.total, "₹1200.00");
    }
}
