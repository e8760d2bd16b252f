use crate::{
    database::{MongoDB, USERS},
    models::{Address, CartItem, Product, ProductSummary, User, UserProfile},
    services::{
        auth_service::{find_user, Claims, PHONE_REGEX},
        pricing::round2,
        product_service::{find_product, find_products_by_ids},
    },
    utils::{new_sub_id, parse_object_id, AppError, AppResult},
};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use mongodb::bson::{doc, oid::ObjectId, to_bson, Document};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const MAX_LINE_QUANTITY: u32 = 10;
pub const DEFAULT_COUNTRY: &str = "India";

lazy_static::lazy_static! {
    /// Indian postal index number
    pub static ref PIN_REGEX: regex::Regex = regex::Regex::new(r"^[1-9][0-9]{5}$").unwrap();
}

// ==================== REQUEST/RESPONSE MODELS ====================

#[derive(Debug, Default, Deserialize, Validate, utoipa::ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 50, message = "must be between 2 and 50 characters"))]
    pub name: Option<String>,
    #[validate(regex(path = "PHONE_REGEX", message = "must be a valid 10-digit mobile number"))]
    pub phone: Option<String>,
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub current_password: String,
    #[validate(length(min = 6, max = 128, message = "must be at least 6 characters"))]
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct AddressRequest {
    #[validate(length(max = 30, message = "must be at most 30 characters"))]
    pub label: Option<String>,
    #[validate(length(min = 2, max = 60, message = "must be between 2 and 60 characters"))]
    pub full_name: String,
    #[validate(regex(path = "PHONE_REGEX", message = "must be a valid 10-digit mobile number"))]
    pub phone: String,
    #[validate(length(min = 1, max = 200, message = "is required"))]
    pub line1: String,
    #[validate(length(max = 200, message = "must be at most 200 characters"))]
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 60, message = "is required"))]
    pub city: String,
    #[validate(length(min = 1, max = 60, message = "is required"))]
    pub state: String,
    #[validate(regex(path = "PIN_REGEX", message = "must be a valid 6-digit PIN code"))]
    pub postal_code: String,
    pub country: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressRequest {
    pub(crate) fn into_address(self, id: String) -> Address {
        Address {
            id,
            label: self.label.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()),
            full_name: self.full_name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            line1: self.line1.trim().to_string(),
            line2: self.line2.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
            country: self
                .country
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
            is_default: self.is_default,
        }
    }
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct AddToCartRequest {
    pub product_id: String,
    #[validate(range(min = 1, max = 10, message = "must be between 1 and 10"))]
    pub quantity: u32,
    pub size: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct UpdateCartItemRequest {
    #[validate(range(min = 1, max = 10, message = "must be between 1 and 10"))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct WishlistRequest {
    pub product_id: String,
}

/// Cart line joined with the current catalog entry
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct CartLine {
    pub id: String,
    pub product_id: String,
    pub name: String,
    pub image: Option<String>,
    pub price: f64,
    pub quantity: u32,
    pub size: Option<String>,
    pub color: Option<String>,
    pub line_total: f64,
    /// Units currently available for this variant
    pub available: u32,
    pub is_available: bool,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CartResponse {
    pub success: bool,
    pub items: Vec<CartLine>,
    pub item_count: u32,
    pub subtotal: f64,
}

// ==================== ADDRESS BOOK ====================

/// Adds an address, keeping exactly one default.
pub fn insert_address(book: &mut Vec<Address>, mut address: Address) -> &Address {
    if book.is_empty() {
        address.is_default = true;
    }
    if address.is_default {
        book.iter_mut().for_each(|a| a.is_default = false);
    }
    book.push(address);
    &book[book.len() - 1]
}

/// Replaces an address in place. Returns false when the id is unknown.
pub fn replace_address(book: &mut [Address], address: Address) -> bool {
    let Some(idx) = book.iter().position(|a| a.id == address.id) else {
        return false;
    };

    let was_default = book[idx].is_default;
    let make_default = address.is_default;
    book[idx] = address;

    if make_default {
        for (i, a) in book.iter_mut().enumerate() {
            a.is_default = i == idx;
        }
    } else if was_default {
        // Clearing the flag on the only default is not allowed; keep it.
        book[idx].is_default = true;
    }
    true
}

/// Removes an address; if it was the default, the first remaining one takes over.
pub fn remove_address(book: &mut Vec<Address>, address_id: &str) -> bool {
    let Some(idx) = book.iter().position(|a| a.id == address_id) else {
        return false;
    };
    let removed = book.remove(idx);
    if removed.is_default {
        if let Some(first) = book.first_mut() {
            first.is_default = true;
        }
    }
    true
}

// ==================== CART ====================

/// Merges a line into the cart and returns the resulting quantity of that line.
pub fn merge_cart_item(
    cart: &mut Vec<CartItem>,
    product_id: &str,
    size: Option<&str>,
    color: Option<&str>,
    quantity: u32,
    now: i64,
) -> u32 {
    if let Some(existing) = cart.iter_mut().find(|i| i.same_variant(product_id, size, color)) {
        existing.quantity += quantity;
        existing.added_at = now;
        return existing.quantity;
    }

    cart.push(CartItem {
        id: new_sub_id(),
        product_id: product_id.to_string(),
        quantity,
        size: size.map(str::to_string),
        color: color.map(str::to_string),
        added_at: now,
    });
    quantity
}

/// Resolves the requested size and color against a product's variants.
pub fn resolve_variant(
    product: &Product,
    size: Option<&str>,
    color: Option<&str>,
) -> AppResult<(Option<String>, Option<String>)> {
    let size = size.map(str::trim).filter(|s| !s.is_empty());
    let color = color.map(str::trim).filter(|c| !c.is_empty());

    let size = if product.has_sizes() {
        let requested = size.ok_or_else(|| AppError::bad_request(format!("Please select a size for {}", product.name)))?;
        let canonical = product
            .canonical_size(requested)
            .ok_or_else(|| AppError::bad_request(format!("Size {} is not available for {}", requested, product.name)))?;
        Some(canonical.to_string())
    } else {
        None
    };

    let color = match color {
        Some(c) if !product.colors.is_empty() => {
            let found = product
                .colors
                .iter()
                .find(|pc| pc.name.eq_ignore_ascii_case(c))
                .ok_or_else(|| AppError::bad_request(format!("Color {} is not available for {}", c, product.name)))?;
            Some(found.name.clone())
        }
        Some(c) => Some(c.to_string()),
        None => None,
    };

    Ok((size, color))
}

pub fn cart_line(item: &CartItem, product: Option<&Product>) -> CartLine {
    match product {
        Some(p) => {
            let available = p.available(item.size.as_deref()).unwrap_or(0);
            CartLine {
                id: item.id.clone(),
                product_id: item.product_id.clone(),
                name: p.name.clone(),
                image: p.primary_image(),
                price: p.price,
                quantity: item.quantity,
                size: item.size.clone(),
                color: item.color.clone(),
                line_total: round2(p.price * f64::from(item.quantity)),
                available,
                is_available: p.is_active && available >= item.quantity,
            }
        }
        None => CartLine {
            id: item.id.clone(),
            product_id: item.product_id.clone(),
            name: "Unavailable product".to_string(),
            image: None,
            price: 0.0,
            quantity: item.quantity,
            size: item.size.clone(),
            color: item.color.clone(),
            line_total: 0.0,
            available: 0,
            is_available: false,
        },
    }
}

// ==================== SERVICE FUNCTIONS ====================

fn now() -> i64 {
    Utc::now().timestamp()
}

async fn current_user(db: &MongoDB, claims: &Claims) -> AppResult<User> {
    find_user(db, &claims.user_object_id()?).await
}

async fn save_field(db: &MongoDB, user_id: &ObjectId, field: &str, value: mongodb::bson::Bson) -> AppResult<()> {
    db.collection::<User>(USERS)
        .update_one(
            doc! { "_id": user_id },
            doc! { "$set": { field: value, "updated_at": now() } },
        )
        .await?;
    Ok(())
}

pub async fn get_profile(db: &MongoDB, claims: &Claims) -> AppResult<UserProfile> {
    let user = current_user(db, claims).await?;
    Ok(UserProfile::from(&user))
}

pub async fn update_profile(db: &MongoDB, claims: &Claims, request: UpdateProfileRequest) -> AppResult<UserProfile> {
    request.validate()?;
    let mut user = current_user(db, claims).await?;

    if let Some(name) = request.name {
        user.name = name.trim().to_string();
    }
    if let Some(phone) = request.phone {
        user.phone = Some(phone.trim().to_string());
    }
    if let Some(avatar) = request.avatar {
        user.avatar = Some(avatar.trim().to_string()).filter(|a| !a.is_empty());
    }
    user.updated_at = now();

    db.collection::<User>(USERS)
        .update_one(
            doc! { "_id": user.id },
            doc! { "$set": {
                "name": &user.name,
                "phone": user.phone.clone(),
                "avatar": user.avatar.clone(),
                "updated_at": user.updated_at,
            } },
        )
        .await?;

    Ok(UserProfile::from(&user))
}

pub async fn change_password(db: &MongoDB, claims: &Claims, request: ChangePasswordRequest) -> AppResult<()> {
    request.validate()?;
    let user = current_user(db, claims).await?;

    if !verify(&request.current_password, &user.password)? {
        return Err(AppError::Unauthorized("Current password is incorrect".into()));
    }

    let hashed = hash(&request.new_password, DEFAULT_COST)?;
    save_field(db, &claims.user_object_id()?, "password", hashed.into()).await?;

    log::info!("🔑 Password changed for {}", user.email);
    Ok(())
}

pub async fn list_addresses(db: &MongoDB, claims: &Claims) -> AppResult<Vec<Address>> {
    Ok(current_user(db, claims).await?.addresses)
}

pub async fn add_address(db: &MongoDB, claims: &Claims, request: AddressRequest) -> AppResult<Vec<Address>> {
    request.validate()?;
    let mut user = current_user(db, claims).await?;

    insert_address(&mut user.addresses, request.into_address(new_sub_id()));
    save_field(db, &claims.user_object_id()?, "addresses", to_bson(&user.addresses)?).await?;

    Ok(user.addresses)
}

pub async fn update_address(
    db: &MongoDB,
    claims: &Claims,
    address_id: &str,
    request: AddressRequest,
) -> AppResult<Vec<Address>> {
    request.validate()?;
    let mut user = current_user(db, claims).await?;

    if !replace_address(&mut user.addresses, request.into_address(address_id.to_string())) {
        return Err(AppError::not_found("Address not found"));
    }
    save_field(db, &claims.user_object_id()?, "addresses", to_bson(&user.addresses)?).await?;

    Ok(user.addresses)
}

pub async fn delete_address(db: &MongoDB, claims: &Claims, address_id: &str) -> AppResult<Vec<Address>> {
    let mut user = current_user(db, claims).await?;

    if !remove_address(&mut user.addresses, address_id) {
        return Err(AppError::not_found("Address not found"));
    }
    save_field(db, &claims.user_object_id()?, "addresses", to_bson(&user.addresses)?).await?;

    Ok(user.addresses)
}

pub async fn get_cart(db: &MongoDB, claims: &Claims) -> AppResult<CartResponse> {
    let user = current_user(db, claims).await?;
    build_cart(db, &user.cart).await
}

async fn build_cart(db: &MongoDB, cart: &[CartItem]) -> AppResult<CartResponse> {
    let ids: Vec<String> = cart.iter().map(|i| i.product_id.clone()).collect();
    let products = find_products_by_ids(db, &ids).await?;

    let items: Vec<CartLine> = cart
        .iter()
        .map(|item| cart_line(item, products.get(&item.product_id)))
        .collect();
    let subtotal = round2(items.iter().filter(|l| l.is_available).map(|l| l.line_total).sum());
    let item_count = items.iter().map(|l| l.quantity).sum();

    Ok(CartResponse {
        success: true,
        items,
        item_count,
        subtotal,
    })
}

pub async fn add_to_cart(db: &MongoDB, claims: &Claims, request: AddToCartRequest) -> AppResult<CartResponse> {
    request.validate()?;
    let product_id = parse_object_id(&request.product_id, "product")?;
    let product = find_product(db, &product_id).await?;
    if !product.is_active {
        return Err(AppError::not_found("Product not found"));
    }

    let (size, color) = resolve_variant(&product, request.size.as_deref(), request.color.as_deref())?;
    let mut user = current_user(db, claims).await?;

    let product_hex = product_id.to_hex();
    let quantity = merge_cart_item(
        &mut user.cart,
        &product_hex,
        size.as_deref(),
        color.as_deref(),
        request.quantity,
        now(),
    );

    if quantity > MAX_LINE_QUANTITY {
        return Err(AppError::bad_request(format!(
            "You can add at most {} units of {}",
            MAX_LINE_QUANTITY, product.name
        )));
    }
    let available = product.available(size.as_deref()).unwrap_or(0);
    if quantity > available {
        log::warn!("⚠️  Cart add rejected: {} requested {}, available {}", product.name, quantity, available);
        return Err(AppError::InsufficientStock(product.name));
    }

    save_field(db, &claims.user_object_id()?, "cart", to_bson(&user.cart)?).await?;
    build_cart(db, &user.cart).await
}

pub async fn update_cart_item(
    db: &MongoDB,
    claims: &Claims,
    item_id: &str,
    request: UpdateCartItemRequest,
) -> AppResult<CartResponse> {
    request.validate()?;
    let mut user = current_user(db, claims).await?;

    let item = user
        .cart
        .iter_mut()
        .find(|i| i.id == item_id)
        .ok_or_else(|| AppError::not_found("Cart item not found"))?;

    let product = find_product(db, &parse_object_id(&item.product_id, "product")?).await?;
    let available = product.available(item.size.as_deref()).unwrap_or(0);
    if !product.is_active || request.quantity > available {
        return Err(AppError::InsufficientStock(product.name));
    }
    item.quantity = request.quantity;

    save_field(db, &claims.user_object_id()?, "cart", to_bson(&user.cart)?).await?;
    build_cart(db, &user.cart).await
}

pub async fn remove_cart_item(db: &MongoDB, claims: &Claims, item_id: &str) -> AppResult<CartResponse> {
    let mut user = current_user(db, claims).await?;

    let before = user.cart.len();
    user.cart.retain(|i| i.id != item_id);
    if user.cart.len() == before {
        return Err(AppError::not_found("Cart item not found"));
    }

    save_field(db, &claims.user_object_id()?, "cart", to_bson(&user.cart)?).await?;
    build_cart(db, &user.cart).await
}

pub async fn clear_cart(db: &MongoDB, user_id: &ObjectId) -> AppResult<()> {
    save_field(db, user_id, "cart", mongodb::bson::Bson::Array(vec![])).await
}

/// Update that drops only the given cart lines; lines added in the meantime stay.
pub fn pull_cart_lines(item_ids: &[String], updated_at: i64) -> Document {
    doc! {
        "$pull": { "cart": { "id": { "$in": item_ids.to_vec() } } },
        "$set": { "updated_at": updated_at },
    }
}

/// Removes the cart lines an order was placed from.
pub async fn remove_cart_lines(db: &MongoDB, user_id: &ObjectId, item_ids: &[String]) -> AppResult<()> {
    if item_ids.is_empty() {
        return Ok(());
    }
    db.collection::<User>(USERS)
        .update_one(doc! { "_id": user_id }, pull_cart_lines(item_ids, now()))
        .await?;
    Ok(())
}

pub async fn get_wishlist(db: &MongoDB, claims: &Claims) -> AppResult<Vec<ProductSummary>> {
    let user = current_user(db, claims).await?;
    let products = find_products_by_ids(db, &user.wishlist).await?;

    Ok(user
        .wishlist
        .iter()
        .filter_map(|id| products.get(id))
        .filter(|p| p.is_active)
        .map(ProductSummary::from)
        .collect())
}

pub async fn add_to_wishlist(db: &MongoDB, claims: &Claims, product_id: &str) -> AppResult<Vec<ProductSummary>> {
    let product_id = parse_object_id(product_id, "product")?;
    let product = find_product(db, &product_id).await?;
    if !product.is_active {
        return Err(AppError::not_found("Product not found"));
    }

    db.collection::<User>(USERS)
        .update_one(
            doc! { "_id": claims.user_object_id()? },
            doc! {
                "$addToSet": { "wishlist": product_id.to_hex() },
                "$set": { "updated_at": now() },
            },
        )
        .await?;

    get_wishlist(db, claims).await
}

pub async fn remove_from_wishlist(db: &MongoDB, claims: &Claims, product_id: &str) -> AppResult<Vec<ProductSummary>> {
    let product_id = parse_object_id(product_id, "product")?;

    db.collection::<User>(USERS)
        .update_one(
            doc! { "_id": claims.user_object_id()? },
            doc! {
                "$pull": { "wishlist": product_id.to_hex() },
                "$set": { "updated_at": now() },
            },
        )
        .await?;

    get_wishlist(db, claims).await
}
