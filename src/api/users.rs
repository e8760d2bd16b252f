use actix_web::{web, HttpResponse};

use crate::{
    api::failed,
    database::MongoDB,
    models::{Address, UserProfile},
    services::{
        auth_service::Claims,
        user_service::{
            self, AddToCartRequest, AddressRequest, CartResponse, ChangePasswordRequest, UpdateCartItemRequest,
            UpdateProfileRequest, WishlistRequest,
        },
    },
};

// ==================== PROFILE ====================

#[utoipa::path(
    get,
    path = "/api/users/profile",
    tag = "Users",
    responses((status = 200, description = "Current profile", body = UserProfile)),
    security(("bearer_auth" = []))
)]
pub async fn get_profile(db: web::Data<MongoDB>, user: web::ReqData<Claims>) -> HttpResponse {
    match user_service::get_profile(&db, &user).await {
        Ok(profile) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "user": profile })),
        Err(e) => failed("GET /users/profile", e),
    }
}

#[utoipa::path(
    put,
    path = "/api/users/profile",
    tag = "Users",
    request_body = UpdateProfileRequest,
    responses((status = 200, description = "Updated profile", body = UserProfile)),
    security(("bearer_auth" = []))
)]
pub async fn update_profile(
    db: web::Data<MongoDB>,
    user: web::ReqData<Claims>,
    request: web::Json<UpdateProfileRequest>,
) -> HttpResponse {
    log::info!("✏️  PUT /users/profile - user: {}", user.sub);

    match user_service::update_profile(&db, &user, request.into_inner()).await {
        Ok(profile) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "user": profile })),
        Err(e) => failed("PUT /users/profile", e),
    }
}

#[utoipa::path(
    put,
    path = "/api/users/password",
    tag = "Users",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 401, description = "Current password is incorrect")
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    db: web::Data<MongoDB>,
    user: web::ReqData<Claims>,
    request: web::Json<ChangePasswordRequest>,
) -> HttpResponse {
    log::info!("🔑 PUT /users/password - user: {}", user.sub);

    match user_service::change_password(&db, &user, request.into_inner()).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "message": "Password updated"
        })),
        Err(e) => failed("PUT /users/password", e),
    }
}

// ==================== ADDRESSES ====================

fn addresses_ok(addresses: Vec<Address>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "success": true, "addresses": addresses }))
}

#[utoipa::path(
    get,
    path = "/api/users/addresses",
    tag = "Users",
    responses((status = 200, description = "Address book", body = [Address])),
    security(("bearer_auth" = []))
)]
pub async fn list_addresses(db: web::Data<MongoDB>, user: web::ReqData<Claims>) -> HttpResponse {
    match user_service::list_addresses(&db, &user).await {
        Ok(addresses) => addresses_ok(addresses),
        Err(e) => failed("GET /users/addresses", e),
    }
}

#[utoipa::path(
    post,
    path = "/api/users/addresses",
    tag = "Users",
    request_body = AddressRequest,
    responses((status = 201, description = "Address added", body = [Address])),
    security(("bearer_auth" = []))
)]
pub async fn add_address(
    db: web::Data<MongoDB>,
    user: web::ReqData<Claims>,
    request: web::Json<AddressRequest>,
) -> HttpResponse {
    match user_service::add_address(&db, &user, request.into_inner()).await {
        Ok(addresses) => HttpResponse::Created().json(serde_json::json!({ "success": true, "addresses": addresses })),
        Err(e) => failed("POST /users/addresses", e),
    }
}

#[utoipa::path(
    put,
    path = "/api/users/addresses/{id}",
    tag = "Users",
    params(("id" = String, Path, description = "Address id")),
    request_body = AddressRequest,
    responses(
        (status = 200, description = "Address updated", body = [Address]),
        (status = 404, description = "Address not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_address(
    db: web::Data<MongoDB>,
    user: web::ReqData<Claims>,
    path: web::Path<String>,
    request: web::Json<AddressRequest>,
) -> HttpResponse {
    match user_service::update_address(&db, &user, &path, request.into_inner()).await {
        Ok(addresses) => addresses_ok(addresses),
        Err(e) => failed("PUT /users/addresses/{id}", e),
    }
}

#[utoipa::path(
    delete,
    path = "/api/users/addresses/{id}",
    tag = "Users",
    params(("id" = String, Path, description = "Address id")),
    responses((status = 200, description = "Address removed", body = [Address])),
    security(("bearer_auth" = []))
)]
pub async fn delete_address(db: web::Data<MongoDB>, user: web::ReqData<Claims>, path: web::Path<String>) -> HttpResponse {
    match user_service::delete_address(&db, &user, &path).await {
        Ok(addresses) => addresses_ok(addresses),
        Err(e) => failed("DELETE /users/addresses/{id}", e),
    }
}

// ==================== CART ====================

#[utoipa::path(
    get,
    path = "/api/users/cart",
    tag = "Cart",
    responses((status = 200, description = "Cart with current prices", body = CartResponse)),
    security(("bearer_auth" = []))
)]
pub async fn get_cart(db: web::Data<MongoDB>, user: web::ReqData<Claims>) -> HttpResponse {
    match user_service::get_cart(&db, &user).await {
        Ok(cart) => HttpResponse::Ok().json(cart),
        Err(e) => failed("GET /users/cart", e),
    }
}

#[utoipa::path(
    post,
    path = "/api/users/cart",
    tag = "Cart",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Updated cart", body = CartResponse),
        (status = 400, description = "Invalid variant or insufficient stock")
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_to_cart(
    db: web::Data<MongoDB>,
    user: web::ReqData<Claims>,
    request: web::Json<AddToCartRequest>,
) -> HttpResponse {
    log::info!("🛒 POST /users/cart - user: {}, product: {}", user.sub, request.product_id);

    match user_service::add_to_cart(&db, &user, request.into_inner()).await {
        Ok(cart) => HttpResponse::Ok().json(cart),
        Err(e) => failed("POST /users/cart", e),
    }
}

#[utoipa::path(
    put,
    path = "/api/users/cart/{item_id}",
    tag = "Cart",
    params(("item_id" = String, Path, description = "Cart line id")),
    request_body = UpdateCartItemRequest,
    responses((status = 200, description = "Updated cart", body = CartResponse)),
    security(("bearer_auth" = []))
)]
pub async fn update_cart_item(
    db: web::Data<MongoDB>,
    user: web::ReqData<Claims>,
    path: web::Path<String>,
    request: web::Json<UpdateCartItemRequest>,
) -> HttpResponse {
    match user_service::update_cart_item(&db, &user, &path, request.into_inner()).await {
        Ok(cart) => HttpResponse::Ok().json(cart),
        Err(e) => failed("PUT /users/cart/{item_id}", e),
    }
}

#[utoipa::path(
    delete,
    path = "/api/users/cart/{item_id}",
    tag = "Cart",
    params(("item_id" = String, Path, description = "Cart line id")),
    responses((status = 200, description = "Updated cart", body = CartResponse)),
    security(("bearer_auth" = []))
)]
pub async fn remove_cart_item(db: web::Data<MongoDB>, user: web::ReqData<Claims>, path: web::Path<String>) -> HttpResponse {
    match user_service::remove_cart_item(&db, &user, &path).await {
        Ok(cart) => HttpResponse::Ok().json(cart),
        Err(e) => failed("DELETE /users/cart/{item_id}", e),
    }
}

#[utoipa::path(
    delete,
    path = "/api/users/cart",
    tag = "Cart",
    responses((status = 200, description = "Cart emptied")),
    security(("bearer_auth" = []))
)]
pub async fn clear_cart(db: web::Data<MongoDB>, user: web::ReqData<Claims>) -> HttpResponse {
    let user_id = match user.user_object_id() {
        Ok(id) => id,
        Err(e) => return failed("DELETE /users/cart", e),
    };

    match user_service::clear_cart(&db, &user_id).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "items": [],
            "item_count": 0,
            "subtotal": 0.0
        })),
        Err(e) => failed("DELETE /users/cart", e),
    }
}

// ==================== WISHLIST ====================

#[utoipa::path(
    get,
    path = "/api/users/wishlist",
    tag = "Wishlist",
    responses((status = 200, description = "Wishlisted products")),
    security(("bearer_auth" = []))
)]
pub async fn get_wishlist(db: web::Data<MongoDB>, user: web::ReqData<Claims>) -> HttpResponse {
    match user_service::get_wishlist(&db, &user).await {
        Ok(products) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "products": products })),
        Err(e) => failed("GET /users/wishlist", e),
    }
}

#[utoipa::path(
    post,
    path = "/api/users/wishlist",
    tag = "Wishlist",
    request_body = WishlistRequest,
    responses((status = 200, description = "Wishlist after adding")),
    security(("bearer_auth" = []))
)]
pub async fn add_to_wishlist(
    db: web::Data<MongoDB>,
    user: web::ReqData<Claims>,
    request: web::Json<WishlistRequest>,
) -> HttpResponse {
    match user_service::add_to_wishlist(&db, &user, &request.product_id).await {
        Ok(products) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "products": products })),
        Err(e) => failed("POST /users/wishlist", e),
    }
}

#[utoipa::path(
    delete,
    path = "/api/users/wishlist/{product_id}",
    tag = "Wishlist",
    params(("product_id" = String, Path, description = "Product id")),
    responses((status = 200, description = "Wishlist after removal")),
    security(("bearer_auth" = []))
)]
pub async fn remove_from_wishlist(
    db: web::Data<MongoDB>,
    user: web::ReqData<Claims>,
    path: web::Path<String>,
) -> HttpResponse {
    match user_service::remove_from_wishlist(&db, &user, &path).await {
        Ok(products) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "products": products })),
        Err(e) => failed("DELETE /users/wishlist/{product_id}", e),
    }
}
