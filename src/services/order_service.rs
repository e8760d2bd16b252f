// ==================== CHECKOUT & FULFILMENT ====================
// Stock is reserved with conditional updates (`stock >= qty` in the filter).
// A failed reservation releases the ones already applied; no multi-document
// transactions (Cosmos DB).

use crate::{
    config::settings,
    database::{MongoDB, ORDERS, PRODUCTS},
    models::{
        Order, OrderItem, OrderListItem, OrderResponse, OrderStatus, PaymentMethod, PaymentStatus, Product,
        ShippingAddress, StatusChange, User,
    },
    services::{
        auth_service::{find_user, Claims},
        invoice_service::{render_invoice, StoreInfo},
        pricing::{normalize_coupon, price_items, PriceBreakdown},
        product_service::find_products_by_ids,
        user_service::{remove_cart_lines, resolve_variant, AddressRequest, MAX_LINE_QUANTITY},
    },
    utils::{parse_object_id, AppError, AppResult, Page, PageInfo},
};
use chrono::{NaiveDate, Utc};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

// ==================== REQUEST/RESPONSE MODELS ====================

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct OrderLineRequest {
    pub product_id: String,
    #[validate(range(min = 1, max = 10, message = "must be between 1 and 10"))]
    pub quantity: u32,
    pub size: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct QuoteRequest {
    /// Lines to price; the caller's cart is used when omitted
    #[serde(default)]
    #[validate]
    pub items: Vec<OrderLineRequest>,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct QuoteResponse {
    pub success: bool,
    pub items: Vec<OrderItem>,
    pub coupon_code: Option<String>,
    pub pricing: PriceBreakdown,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateOrderRequest {
    /// Explicit lines; when empty the order is placed from the cart
    #[serde(default)]
    #[validate]
    pub items: Vec<OrderLineRequest>,
    /// Saved address to ship to
    pub address_id: Option<String>,
    /// Inline address, used when no `address_id` is given
    #[validate]
    pub shipping_address: Option<AddressRequest>,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, utoipa::ToSchema)]
pub struct CancelOrderRequest {
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct UpdateStatusRequest {
    pub status: String,
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub note: Option<String>,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub tracking_number: Option<String>,
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct OrderListQuery {
    pub status: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OrderListResponse {
    pub success: bool,
    pub orders: Vec<OrderListItem>,
    #[serde(flatten)]
    pub page: PageInfo,
}

// ==================== PURE HELPERS ====================

pub fn format_order_number(date: NaiveDate, seq: i64) -> String {
    format!("ORD-{}-{:05}", date.format("%Y%m%d"), seq)
}

/// Snapshots catalog lines for the requested items.
///
/// Repeated lines for the same variant are merged before the stock check, and
/// prices always come from the catalog.
pub fn build_order_items(
    lines: &[OrderLineRequest],
    products: &HashMap<String, Product>,
) -> AppResult<Vec<OrderItem>> {
    if lines.is_empty() {
        return Err(AppError::bad_request("No items in order"));
    }

    let mut items: Vec<OrderItem> = Vec::with_capacity(lines.len());
    for line in lines {
        let product = products
            .get(line.product_id.trim())
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::not_found(format!("Product not found: {}", line.product_id)))?;

        let (size, color) = resolve_variant(product, line.size.as_deref(), line.color.as_deref())?;
        let product_id = product.id.map(|id| id.to_hex()).unwrap_or_default();

        match items
            .iter_mut()
            .find(|i| i.product_id == product_id && i.size == size && i.color == color)
        {
            Some(existing) => existing.quantity += line.quantity,
            None => items.push(OrderItem {
                product_id,
                name: product.name.clone(),
                image: product.primary_image(),
                price: product.price,
                quantity: line.quantity,
                size,
                color,
                sku: product.sku.clone(),
            }),
        }
    }

    // Several colors of one size share that size's stock
    let mut demand: HashMap<(&str, Option<&str>), u32> = HashMap::new();
    for item in &items {
        if item.quantity > MAX_LINE_QUANTITY {
            return Err(AppError::bad_request(format!(
                "You can order at most {} units of {}",
                MAX_LINE_QUANTITY, item.name
            )));
        }
        *demand.entry((item.product_id.as_str(), item.size.as_deref())).or_default() += item.quantity;
    }
    for ((product_id, size), wanted) in demand {
        let product = &products[product_id];
        let available = product.available(size).unwrap_or(0);
        if wanted > available {
            log::warn!("⚠️  Insufficient stock for {}: wanted {}, available {}", product.name, wanted, available);
            return Err(AppError::InsufficientStock(product.name.clone()));
        }
    }

    Ok(items)
}

/// Filter and update that take `quantity` units of the item's variant, but only if they exist.
pub fn reserve_update(product_id: &ObjectId, item: &OrderItem) -> (Document, Document) {
    let qty = i64::from(item.quantity);
    match &item.size {
        Some(size) => (
            doc! {
                "_id": product_id,
                "sizes": { "$elemMatch": { "size": size, "stock": { "$gte": qty } } },
            },
            doc! { "$inc": { "sizes.$.stock": -qty, "total_stock": -qty } },
        ),
        None => (
            doc! { "_id": product_id, "stock": { "$gte": qty } },
            doc! { "$inc": { "stock": -qty, "total_stock": -qty } },
        ),
    }
}

pub fn release_update(product_id: &ObjectId, item: &OrderItem) -> (Document, Document) {
    let qty = i64::from(item.quantity);
    match &item.size {
        Some(size) => (
            doc! { "_id": product_id, "sizes.size": size },
            doc! { "$inc": { "sizes.$.stock": qty, "total_stock": qty } },
        ),
        None => (
            doc! { "_id": product_id },
            doc! { "$inc": { "stock": qty, "total_stock": qty } },
        ),
    }
}

/// Moves an order to `next`, recording history and side fields.
///
/// Returns true when the reserved stock must go back on the shelf.
pub fn apply_transition(
    order: &mut Order,
    next: OrderStatus,
    note: Option<String>,
    changed_by: Option<String>,
    tracking_number: Option<String>,
    now: i64,
) -> AppResult<bool> {
    if !order.status.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "Cannot change order status from {} to {}",
            order.status, next
        )));
    }

    let note = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    order.status = next;
    order.updated_at = now;
    order.status_history.push(StatusChange {
        status: next,
        note: note.clone(),
        changed_by,
        changed_at: now,
    });

    if let Some(tracking) = tracking_number.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
        order.tracking_number = Some(tracking);
    }

    let mut restock = false;
    match next {
        OrderStatus::Delivered => {
            order.delivered_at = Some(now);
            if order.payment_method == PaymentMethod::Cod && order.payment_status == PaymentStatus::Pending {
                order.payment_status = PaymentStatus::Paid;
                order.paid_at = Some(now);
            }
        }
        OrderStatus::Cancelled => {
            order.cancelled_at = Some(now);
            order.cancel_reason = note;
            if order.payment_status == PaymentStatus::Paid {
                order.payment_status = PaymentStatus::Refunded;
            }
            restock = true;
        }
        _ => {}
    }

    Ok(restock)
}

fn now() -> i64 {
    Utc::now().timestamp()
}

fn cart_lines(user: &User) -> Vec<OrderLineRequest> {
    user.cart
        .iter()
        .map(|c| OrderLineRequest {
            product_id: c.product_id.clone(),
            quantity: c.quantity,
            size: c.size.clone(),
            color: c.color.clone(),
        })
        .collect()
}

fn resolve_shipping(user: &User, request: &CreateOrderRequest) -> AppResult<ShippingAddress> {
    if let Some(address_id) = request.address_id.as_deref().filter(|a| !a.trim().is_empty()) {
        return user
            .addresses
            .iter()
            .find(|a| a.id == address_id)
            .map(ShippingAddress::from)
            .ok_or_else(|| AppError::not_found("Address not found"));
    }

    if let Some(inline) = &request.shipping_address {
        return Ok(ShippingAddress::from(&inline.clone().into_address(String::new())));
    }

    user.addresses
        .iter()
        .find(|a| a.is_default)
        .map(ShippingAddress::from)
        .ok_or_else(|| AppError::bad_request("Shipping address is required"))
}

// ==================== STOCK ====================

async fn reserve_stock(db: &MongoDB, items: &[OrderItem]) -> AppResult<()> {
    let products = db.collection::<Product>(PRODUCTS);
    let mut reserved: Vec<&OrderItem> = Vec::with_capacity(items.len());

    for item in items {
        let product_id = parse_object_id(&item.product_id, "product")?;
        let (filter, update) = reserve_update(&product_id, item);

        let outcome = products.update_one(filter, update).await;
        let taken = matches!(&outcome, Ok(r) if r.modified_count == 1);
        if !taken {
            release_stock(db, &reserved).await;
            return match outcome {
                Err(e) => Err(e.into()),
                Ok(_) => {
                    log::warn!("⚠️  Stock reservation lost for {}", item.name);
                    Err(AppError::InsufficientStock(item.name.clone()))
                }
            };
        }
        reserved.push(item);
    }

    Ok(())
}

/// Best effort: failures are logged, the remaining lines are still released.
async fn release_stock(db: &MongoDB, items: &[&OrderItem]) {
    let products = db.collection::<Product>(PRODUCTS);
    for item in items {
        let Ok(product_id) = ObjectId::parse_str(&item.product_id) else {
            continue;
        };
        let (filter, update) = release_update(&product_id, item);
        if let Err(e) = products.update_one(filter, update).await {
            log::error!("❌ Failed to release stock for {} x{}: {}", item.name, item.quantity, e);
        }
    }
}

// ==================== SERVICE FUNCTIONS ====================

async fn priced_lines(
    db: &MongoDB,
    user: &User,
    lines: &[OrderLineRequest],
) -> AppResult<(Vec<OrderItem>, bool)> {
    let from_cart = lines.is_empty();
    let lines = if from_cart { cart_lines(user) } else { lines.to_vec() };
    if lines.is_empty() {
        return Err(AppError::bad_request("Your cart is empty"));
    }

    let ids: Vec<String> = lines.iter().map(|l| l.product_id.trim().to_string()).collect();
    let products = find_products_by_ids(db, &ids).await?;
    Ok((build_order_items(&lines, &products)?, from_cart))
}

pub async fn quote(db: &MongoDB, claims: &Claims, request: QuoteRequest) -> AppResult<QuoteResponse> {
    request.validate()?;
    let coupon = normalize_coupon(request.coupon_code.as_deref())?;
    let user = find_user(db, &claims.user_object_id()?).await?;

    let (items, _) = priced_lines(db, &user, &request.items).await?;
    let pricing = price_items(&items, coupon.as_deref());

    Ok(QuoteResponse {
        success: true,
        items,
        coupon_code: coupon,
        pricing,
    })
}

pub async fn create_order(db: &MongoDB, claims: &Claims, request: CreateOrderRequest) -> AppResult<OrderResponse> {
    request.validate()?;
    let coupon = normalize_coupon(request.coupon_code.as_deref())?;
    let user_id = claims.user_object_id()?;
    let user = find_user(db, &user_id).await?;

    let shipping_address = resolve_shipping(&user, &request)?;
    let (items, from_cart) = priced_lines(db, &user, &request.items).await?;
    let pricing = price_items(&items, coupon.as_deref());

    reserve_stock(db, &items).await?;

    let today = Utc::now().date_naive();
    let seq = match db.next_sequence(&format!("order-{}", today.format("%Y%m%d"))).await {
        Ok(seq) => seq,
        Err(e) => {
            release_stock(db, &items.iter().collect::<Vec<_>>()).await;
            return Err(e.into());
        }
    };

    let timestamp = now();
    let mut order = Order {
        id: None,
        order_number: format_order_number(today, seq),
        user: user_id.to_hex(),
        items,
        shipping_address,
        payment_method: request.payment_method,
        payment_status: PaymentStatus::Pending,
        items_price: pricing.items_price,
        discount: pricing.discount,
        coupon_code: coupon,
        tax_price: pricing.tax_price,
        shipping_price: pricing.shipping_price,
        total_price: pricing.total_price,
        status: OrderStatus::Pending,
        status_history: vec![StatusChange {
            status: OrderStatus::Pending,
            note: Some("Order placed".to_string()),
            changed_by: Some(user_id.to_hex()),
            changed_at: timestamp,
        }],
        tracking_number: None,
        notes: request.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        cancel_reason: None,
        paid_at: None,
        delivered_at: None,
        cancelled_at: None,
        created_at: timestamp,
        updated_at: timestamp,
    };

    match db.collection::<Order>(ORDERS).insert_one(&order).await {
        Ok(result) => order.id = result.inserted_id.as_object_id(),
        Err(e) => {
            release_stock(db, &order.items.iter().collect::<Vec<_>>()).await;
            return Err(e.into());
        }
    }

    if from_cart {
        let ordered: Vec<String> = user.cart.iter().map(|c| c.id.clone()).collect();
        if let Err(e) = remove_cart_lines(db, &user_id, &ordered).await {
            log::warn!("⚠️  Order {} placed but cart not cleared: {}", order.order_number, e);
        }
    }

    log::info!(
        "✅ Order {} placed by {}: {} items, total ₹{:.2}",
        order.order_number,
        user.email,
        order.item_count(),
        order.total_price
    );

    Ok(OrderResponse::from(order))
}

pub async fn my_orders(db: &MongoDB, claims: &Claims, page: Page) -> AppResult<OrderListResponse> {
    let filter = doc! { "user": &claims.sub };
    list_with_filter(db, filter, page).await
}

async fn list_with_filter(db: &MongoDB, filter: Document, page: Page) -> AppResult<OrderListResponse> {
    let collection = db.collection::<Order>(ORDERS);
    let total = collection.count_documents(filter.clone()).await?;
    let orders: Vec<Order> = collection
        .find(filter)
        .sort(doc! { "created_at": -1, "_id": -1 })
        .skip(page.skip())
        .limit(page.limit as i64)
        .await?
        .try_collect()
        .await?;

    Ok(OrderListResponse {
        success: true,
        orders: orders.into_iter().map(OrderListItem::from).collect(),
        page: PageInfo::new(page, total),
    })
}

/// Loads an order visible to the caller. Other users' orders read as missing.
async fn find_visible_order(db: &MongoDB, claims: &Claims, id: &ObjectId) -> AppResult<Order> {
    let order = db
        .collection::<Order>(ORDERS)
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))?;

    if order.user != claims.sub && !claims.is_admin() {
        return Err(AppError::not_found("Order not found"));
    }
    Ok(order)
}

pub async fn get_order(db: &MongoDB, claims: &Claims, id: &ObjectId) -> AppResult<OrderResponse> {
    Ok(OrderResponse::from(find_visible_order(db, claims, id).await?))
}

pub async fn invoice(db: &MongoDB, claims: &Claims, id: &ObjectId) -> AppResult<String> {
    let order = find_visible_order(db, claims, id).await?;
    let cfg = settings();
    render_invoice(
        &order,
        &StoreInfo {
            name: &cfg.store_name,
            gstin: cfg.store_gstin.as_deref(),
        },
    )
}

/// Persists a transition, guarded on the status the order was loaded with.
async fn save_transition(db: &MongoDB, order: &Order, previous: OrderStatus, restock: bool) -> AppResult<()> {
    let id = order.id.ok_or_else(|| AppError::Internal("Order without id".into()))?;
    let result = db
        .collection::<Order>(ORDERS)
        .replace_one(doc! { "_id": id, "status": previous.as_str() }, order)
        .await?;

    if result.matched_count == 0 {
        return Err(AppError::Conflict("Order was updated by someone else, please retry".into()));
    }

    if restock {
        release_stock(db, &order.items.iter().collect::<Vec<_>>()).await;
    }
    Ok(())
}

pub async fn cancel_order(
    db: &MongoDB,
    claims: &Claims,
    id: &ObjectId,
    request: CancelOrderRequest,
) -> AppResult<OrderResponse> {
    request.validate()?;
    let mut order = db
        .collection::<Order>(ORDERS)
        .find_one(doc! { "_id": id, "user": &claims.sub })
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))?;

    if !order.status.is_cancellable() {
        log::warn!("⚠️  Cancel rejected for {}: status {}", order.order_number, order.status);
        return Err(AppError::bad_request(format!(
            "Order cannot be cancelled once it is {}",
            order.status
        )));
    }

    let previous = order.status;
    let reason = request.reason.or_else(|| Some("Cancelled by customer".to_string()));
    let restock = apply_transition(&mut order, OrderStatus::Cancelled, reason, Some(claims.sub.clone()), None, now())?;
    save_transition(db, &order, previous, restock).await?;

    log::info!("🛑 Order {} cancelled by customer", order.order_number);
    Ok(OrderResponse::from(order))
}

pub async fn list_orders(db: &MongoDB, query: &OrderListQuery) -> AppResult<OrderListResponse> {
    let mut filter = Document::new();
    if let Some(raw) = query.status.as_deref().filter(|s| !s.trim().is_empty()) {
        let status = OrderStatus::parse(raw).ok_or_else(|| AppError::bad_request(format!("Invalid status: {}", raw)))?;
        filter.insert("status", status.as_str());
    }
    list_with_filter(db, filter, Page::new(query.page, query.limit)).await
}

pub async fn update_status(
    db: &MongoDB,
    admin: &Claims,
    id: &ObjectId,
    request: UpdateStatusRequest,
) -> AppResult<OrderResponse> {
    request.validate()?;
    let next = OrderStatus::parse(&request.status)
        .ok_or_else(|| AppError::bad_request(format!("Invalid status: {}", request.status)))?;

    let mut order = db
        .collection::<Order>(ORDERS)
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))?;

    let previous = order.status;
    let restock = apply_transition(
        &mut order,
        next,
        request.note,
        Some(admin.sub.clone()),
        request.tracking_number,
        now(),
    )?;
    save_transition(db, &order, previous, restock).await?;

    log::info!("📦 Order {}: {} → {}", order.order_number, previous, next);
    Ok(OrderResponse::from(order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        database::USERS,
        models::{product::fixtures::product, Address, CartItem},
        utils::new_sub_id,
    };
    use actix_web::ResponseError;

    fn catalog(products: Vec<Product>) -> HashMap<String, Product> {
        products.into_iter().map(|p| (p.id.unwrap().to_hex(), p)).collect()
    }

    fn line(product: &Product, quantity: u32, size: Option<&str>) -> OrderLineRequest {
        OrderLineRequest {
            product_id: product.id.unwrap().to_hex(),
            quantity,
            size: size.map(str::to_string),
            color: None,
        }
    }

    fn order_with(status: OrderStatus, payment_method: PaymentMethod) -> Order {
        Order {
            id: Some(ObjectId::new()),
            order_number: "ORD-20260101-00001".into(),
            user: "u".into(),
            items: vec![],
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
            payment_method,
            payment_status: PaymentStatus::Pending,
            items_price: 0.0,
            discount: 0.0,
            coupon_code: None,
            tax_price: 0.0,
            shipping_price: 0.0,
            total_price: 0.0,
            status,
            status_history: vec![],
            tracking_number: None,
            notes: None,
            cancel_reason: None,
            paid_at: None,
            delivered_at: None,
            cancelled_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_order_number_format() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(format_order_number(date, 42), "ORD-20260307-00042");
        assert_eq!(format_order_number(date, 123456), "ORD-20260307-123456");
    }

    #[test]
    fn test_build_items_uses_catalog_price() {
        let tee = product("Tee", 499.0, 0, &[("M", 5)]);
        let mug = product("Mug", 299.0, 3, &[]);
        let products = catalog(vec![tee.clone(), mug.clone()]);

        let items = build_order_items(&[line(&tee, 2, Some("m")), line(&mug, 1, None)], &products).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].price, 499.0);
        assert_eq!(items[0].size.as_deref(), Some("M"));
        assert_eq!(items[1].size, None);
    }

    #[test]
    fn test_insufficient_stock_is_rejected() {
        let tee = product("Tee", 499.0, 0, &[("M", 2)]);
        let products = catalog(vec![tee.clone()]);

        let err = build_order_items(&[line(&tee, 3, Some("M"))], &products).unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock(ref name) if name == "Tee"));

        // split across two lines of the same variant
        let err = build_order_items(&[line(&tee, 1, Some("M")), line(&tee, 2, Some("M"))], &products).unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock(_)));
    }

    #[test]
    fn test_size_required_for_sized_products() {
        let tee = product("Tee", 499.0, 0, &[("M", 2)]);
        let products = catalog(vec![tee.clone()]);
        assert!(matches!(
            build_order_items(&[line(&tee, 1, None)], &products),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_inactive_or_unknown_products_are_not_found() {
        let mut tee = product("Tee", 499.0, 5, &[]);
        tee.is_active = false;
        let products = catalog(vec![tee.clone()]);
        assert!(matches!(build_order_items(&[line(&tee, 1, None)], &products), Err(AppError::NotFound(_))));
        assert!(matches!(build_order_items(&[], &products), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_reserve_update_guards_on_stock() {
        let id = ObjectId::new();
        let item = OrderItem {
            product_id: id.to_hex(),
            name: "Tee".into(),
            image: None,
            price: 499.0,
            quantity: 2,
            size: Some("M".into()),
            color: None,
            sku: None,
        };

        let (filter, update) = reserve_update(&id, &item);
        assert_eq!(
            filter.get_document("sizes").unwrap(),
            &doc! { "$elemMatch": { "size": "M", "stock": { "$gte": 2_i64 } } }
        );
        assert_eq!(update, doc! { "$inc": { "sizes.$.stock": -2_i64, "total_stock": -2_i64 } });

        let aggregate = OrderItem { size: None, ..item };
        let (filter, update) = reserve_update(&id, &aggregate);
        assert_eq!(filter, doc! { "_id": id, "stock": { "$gte": 2_i64 } });
        assert_eq!(update, doc! { "$inc": { "stock": -2_i64, "total_stock": -2_i64 } });

        let (_, release) = release_update(&id, &aggregate);
        assert_eq!(release, doc! { "$inc": { "stock": 2_i64, "total_stock": 2_i64 } });
    }

    #[test]
    fn test_shipped_order_cannot_be_cancelled() {
        let mut order = order_with(OrderStatus::Shipped, PaymentMethod::Cod);
        let err = apply_transition(&mut order, OrderStatus::Cancelled, None, None, None, 10).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(order.status, OrderStatus::Shipped);
        assert!(order.status_history.is_empty());
    }

    #[test]
    fn test_cancel_restocks_and_refunds() {
        let mut order = order_with(OrderStatus::Confirmed, PaymentMethod::Card);
        order.payment_status = PaymentStatus::Paid;

        let restock =
            apply_transition(&mut order, OrderStatus::Cancelled, Some("changed mind".into()), None, None, 10).unwrap();
        assert!(restock);
        assert_eq!(order.payment_status, PaymentStatus::Refunded);
        assert_eq!(order.cancelled_at, Some(10));
        assert_eq!(order.cancel_reason.as_deref(), Some("changed mind"));
        assert_eq!(order.status_history.len(), 1);
    }

    #[test]
    fn test_cod_marked_paid_on_delivery() {
        let mut order = order_with(OrderStatus::Processing, PaymentMethod::Cod);
        let restock =
            apply_transition(&mut order, OrderStatus::Shipped, None, Some("admin".into()), Some("AWB123".into()), 5)
                .unwrap();
        assert!(!restock);
        assert_eq!(order.tracking_number.as_deref(), Some("AWB123"));

        apply_transition(&mut order, OrderStatus::Delivered, None, None, None, 9).unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.paid_at, Some(9));
        assert_eq!(order.delivered_at, Some(9));
        assert_eq!(order.status_history.len(), 2);
    }

    // ==================== DATABASE ====================

    fn shopper(cart: Vec<CartItem>) -> User {
        User {
            id: Some(ObjectId::new()),
            name: "Asha Rao".into(),
            email: format!("{}@example.com", new_sub_id()),
            password: "not-a-hash".into(),
            phone: None,
            avatar: None,
            roles: vec!["customer".into()],
            is_active: true,
            addresses: vec![Address {
                id: new_sub_id(),
                label: Some("Home".into()),
                full_name: "Asha Rao".into(),
                phone: "9876543210".into(),
                line1: "12 MG Road".into(),
                line2: None,
                city: "Bengaluru".into(),
                state: "Karnataka".into(),
                postal_code: "560001".into(),
                country: "India".into(),
                is_default: true,
            }],
            cart,
            wishlist: vec![],
            created_at: 0,
            updated_at: 0,
            last_login: None,
        }
    }

    fn claims_for(user: &User, role: &str) -> Claims {
        Claims {
            sub: user.id.unwrap().to_hex(),
            email: user.email.clone(),
            name: Some(user.name.clone()),
            roles: vec![role.to_string()],
            typ: "access".into(),
            iat: 0,
            exp: usize::MAX,
            jti: new_sub_id(),
            aud: "test".into(),
            iss: "test".into(),
        }
    }

    async fn insert_user(db: &MongoDB, user: &User) -> Claims {
        db.collection::<User>(USERS).insert_one(user).await.unwrap();
        claims_for(user, "customer")
    }

    async fn insert_product(db: &MongoDB, product: &Product) -> ObjectId {
        db.collection::<Product>(PRODUCTS).insert_one(product).await.unwrap();
        product.id.unwrap()
    }

    async fn size_stock(db: &MongoDB, id: &ObjectId, size: &str) -> u32 {
        let product = db.collection::<Product>(PRODUCTS).find_one(doc! { "_id": id }).await.unwrap().unwrap();
        product.sizes.iter().find(|s| s.size == size).map(|s| s.stock).unwrap()
    }

    fn order_request(items: Vec<OrderLineRequest>) -> CreateOrderRequest {
        CreateOrderRequest {
            items,
            address_id: None,
            shipping_address: None,
            payment_method: PaymentMethod::Cod,
            coupon_code: None,
            notes: None,
        }
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB"]
    async fn test_short_second_line_releases_first_line() {
        let db = crate::database::test_db().await;
        let kurta = product("Kurta", 899.0, 0, &[("M", 3)]);
        let scarf = product("Scarf", 299.0, 0, &[("Free", 1)]);
        let kurta_id = insert_product(&db, &kurta).await;
        let scarf_id = insert_product(&db, &scarf).await;

        let priced = catalog(vec![kurta.clone(), scarf.clone()]);
        let mut items =
            build_order_items(&[line(&kurta, 2, Some("M")), line(&scarf, 1, Some("Free"))], &priced).unwrap();
        // the scarf sells out between pricing and reservation
        items[1].quantity = 2;

        let result = reserve_stock(&db, &items).await;
        assert!(matches!(result, Err(AppError::InsufficientStock(ref name)) if name == "Scarf"));
        assert_eq!(size_stock(&db, &kurta_id, "M").await, 3);
        assert_eq!(size_stock(&db, &scarf_id, "Free").await, 1);
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB"]
    async fn test_order_with_short_line_is_bad_request() {
        let db = crate::database::test_db().await;
        let kurta = product("Kurta", 899.0, 0, &[("M", 3)]);
        let scarf = product("Scarf", 299.0, 0, &[("Free", 1)]);
        let kurta_id = insert_product(&db, &kurta).await;
        insert_product(&db, &scarf).await;
        let claims = insert_user(&db, &shopper(vec![])).await;

        let err = create_order(
            &db,
            &claims,
            order_request(vec![line(&kurta, 2, Some("M")), line(&scarf, 2, Some("Free"))]),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status_code(), actix_web::http::StatusCode::BAD_REQUEST);
        assert_eq!(size_stock(&db, &kurta_id, "M").await, 3);
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB"]
    async fn test_last_unit_goes_to_one_order() {
        let db = crate::database::test_db().await;
        let kurta = product("Kurta", 899.0, 0, &[("M", 1)]);
        let kurta_id = insert_product(&db, &kurta).await;
        let first = insert_user(&db, &shopper(vec![])).await;
        let second = insert_user(&db, &shopper(vec![])).await;

        let (a, b) = tokio::join!(
            create_order(&db, &first, order_request(vec![line(&kurta, 1, Some("M"))])),
            create_order(&db, &second, order_request(vec![line(&kurta, 1, Some("M"))])),
        );
        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes.iter().any(|r| matches!(r, Err(AppError::InsufficientStock(_)))));
        assert_eq!(size_stock(&db, &kurta_id, "M").await, 0);
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB"]
    async fn test_order_number_uses_todays_date() {
        let db = crate::database::test_db().await;
        let kurta = product("Kurta", 899.0, 0, &[("M", 2)]);
        insert_product(&db, &kurta).await;
        let claims = insert_user(&db, &shopper(vec![])).await;

        let order = create_order(&db, &claims, order_request(vec![line(&kurta, 1, Some("M"))])).await.unwrap();
        let prefix = format!("ORD-{}-", Utc::now().date_naive().format("%Y%m%d"));
        assert!(order.order_number.starts_with(&prefix), "{}", order.order_number);
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB"]
    async fn test_customer_cancel_restores_stock() {
        let db = crate::database::test_db().await;
        let kurta = product("Kurta", 899.0, 0, &[("M", 4)]);
        let kurta_id = insert_product(&db, &kurta).await;
        let claims = insert_user(&db, &shopper(vec![])).await;

        let placed = create_order(&db, &claims, order_request(vec![line(&kurta, 3, Some("M"))])).await.unwrap();
        assert_eq!(size_stock(&db, &kurta_id, "M").await, 1);

        let id = parse_object_id(&placed.id, "order").unwrap();
        let cancelled = cancel_order(&db, &claims, &id, CancelOrderRequest::default()).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(size_stock(&db, &kurta_id, "M").await, 4);
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB"]
    async fn test_admin_cancel_restores_stock() {
        let db = crate::database::test_db().await;
        let kurta = product("Kurta", 899.0, 0, &[("M", 4)]);
        let kurta_id = insert_product(&db, &kurta).await;
        let user = shopper(vec![]);
        let claims = insert_user(&db, &user).await;

        let placed = create_order(&db, &claims, order_request(vec![line(&kurta, 2, Some("M"))])).await.unwrap();
        assert_eq!(size_stock(&db, &kurta_id, "M").await, 2);

        let id = parse_object_id(&placed.id, "order").unwrap();
        let admin = claims_for(&shopper(vec![]), "admin");
        let request = UpdateStatusRequest { status: "cancelled".into(), note: None, tracking_number: None };
        let cancelled = update_status(&db, &admin, &id, request).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(size_stock(&db, &kurta_id, "M").await, 4);
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB"]
    async fn test_cart_order_removes_ordered_lines() {
        let db = crate::database::test_db().await;
        let kurta = product("Kurta", 899.0, 0, &[("M", 5)]);
        insert_product(&db, &kurta).await;
        let user = shopper(vec![CartItem {
            id: new_sub_id(),
            product_id: kurta.id.unwrap().to_hex(),
            quantity: 2,
            size: Some("M".into()),
            color: None,
            added_at: 0,
        }]);
        let claims = insert_user(&db, &user).await;

        let placed = create_order(&db, &claims, order_request(vec![])).await.unwrap();
        assert_eq!(placed.items.len(), 1);
        assert_eq!(placed.items[0].quantity, 2);

        let stored = find_user(&db, &user.id.unwrap()).await.unwrap();
        assert!(stored.cart.is_empty());
    }
}
