use actix_web::{http::header::ContentType, web, HttpResponse};

use crate::{
    api::{failed, path_id},
    database::MongoDB,
    models::OrderResponse,
    services::{
        auth_service::Claims,
        order_service::{self, CancelOrderRequest, CreateOrderRequest, OrderListResponse, QuoteRequest, QuoteResponse},
    },
    utils::{Page, PaginationQuery},
};

#[utoipa::path(
    post,
    path = "/api/orders/quote",
    tag = "Orders",
    request_body = QuoteRequest,
    responses(
        (status = 200, description = "Price breakdown, nothing is written", body = QuoteResponse),
        (status = 400, description = "Invalid coupon, variant or insufficient stock")
    ),
    security(("bearer_auth" = []))
)]
pub async fn quote(db: web::Data<MongoDB>, user: web::ReqData<Claims>, request: web::Json<QuoteRequest>) -> HttpResponse {
    match order_service::quote(&db, &user, request.into_inner()).await {
        Ok(quote) => HttpResponse::Ok().json(quote),
        Err(e) => failed("POST /orders/quote", e),
    }
}

#[utoipa::path(
    post,
    path = "/api/orders",
    tag = "Orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = OrderResponse),
        (status = 400, description = "Validation failed, invalid coupon or insufficient stock")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_order(
    db: web::Data<MongoDB>,
    user: web::ReqData<Claims>,
    request: web::Json<CreateOrderRequest>,
) -> HttpResponse {
    log::info!("🧾 POST /orders - user: {}", user.sub);

    match order_service::create_order(&db, &user, request.into_inner()).await {
        Ok(order) => HttpResponse::Created().json(serde_json::json!({
            "success": true,
            "order": order
        })),
        Err(e) => failed("POST /orders", e),
    }
}

#[utoipa::path(
    get,
    path = "/api/orders/my",
    tag = "Orders",
    params(PaginationQuery),
    responses((status = 200, description = "Caller's orders, newest first", body = OrderListResponse)),
    security(("bearer_auth" = []))
)]
pub async fn my_orders(
    db: web::Data<MongoDB>,
    user: web::ReqData<Claims>,
    query: web::Query<PaginationQuery>,
) -> HttpResponse {
    match order_service::my_orders(&db, &user, Page::from(&*query)).await {
        Ok(orders) => HttpResponse::Ok().json(orders),
        Err(e) => failed("GET /orders/my", e),
    }
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    tag = "Orders",
    params(("id" = String, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order details", body = OrderResponse),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_order(db: web::Data<MongoDB>, user: web::ReqData<Claims>, path: web::Path<String>) -> HttpResponse {
    let id = match path_id(&path, "order") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match order_service::get_order(&db, &user, &id).await {
        Ok(order) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "order": order
        })),
        Err(e) => failed("GET /orders/{id}", e),
    }
}

#[utoipa::path(
    put,
    path = "/api/orders/{id}/cancel",
    tag = "Orders",
    params(("id" = String, Path, description = "Order id")),
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Order cancelled, stock restored", body = OrderResponse),
        (status = 400, description = "Order already shipped, delivered or cancelled")
    ),
    security(("bearer_auth" = []))
)]
pub async fn cancel_order(
    db: web::Data<MongoDB>,
    user: web::ReqData<Claims>,
    path: web::Path<String>,
    request: Option<web::Json<CancelOrderRequest>>,
) -> HttpResponse {
    let id = match path_id(&path, "order") {
        Ok(id) => id,
        Err(response) => return response,
    };
    log::info!("🛑 PUT /orders/{}/cancel - user: {}", id, user.sub);

    let request = request.map(|r| r.into_inner()).unwrap_or_default();
    match order_service::cancel_order(&db, &user, &id, request).await {
        Ok(order) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "order": order
        })),
        Err(e) => failed("PUT /orders/{id}/cancel", e),
    }
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}/invoice",
    tag = "Orders",
    params(("id" = String, Path, description = "Order id")),
    responses(
        (status = 200, description = "Printable HTML invoice", content_type = "text/html", body = String),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_invoice(db: web::Data<MongoDB>, user: web::ReqData<Claims>, path: web::Path<String>) -> HttpResponse {
    let id = match path_id(&path, "order") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match order_service::invoice(&db, &user, &id).await {
        Ok(html) => HttpResponse::Ok().content_type(ContentType::html()).body(html),
        Err(e) => failed("GET /orders/{id}/invoice", e),
    }
}
