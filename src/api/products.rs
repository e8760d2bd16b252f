use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::{
    api::{failed, path_id},
    database::MongoDB,
    models::ProductResponse,
    services::{
        auth_service::Claims,
        product_service::{self, ProductListResponse, ProductQuery, ReviewRequest},
    },
};

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct FeaturedQuery {
    pub limit: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/api/products",
    tag = "Products",
    params(ProductQuery),
    responses((status = 200, description = "Active products, filtered and paginated", body = ProductListResponse))
)]
pub async fn list_products(db: web::Data<MongoDB>, query: web::Query<ProductQuery>) -> HttpResponse {
    log::debug!("🛍️  GET /products - {:?}", query);

    match product_service::list_products(&db, &query).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => failed("GET /products", e),
    }
}

#[utoipa::path(
    get,
    path = "/api/products/featured",
    tag = "Products",
    params(FeaturedQuery),
    responses((status = 200, description = "Featured products"))
)]
pub async fn featured_products(db: web::Data<MongoDB>, query: web::Query<FeaturedQuery>) -> HttpResponse {
    match product_service::featured_products(&db, query.limit.unwrap_or(8)).await {
        Ok(products) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "products": products
        })),
        Err(e) => failed("GET /products/featured", e),
    }
}

#[utoipa::path(
    get,
    path = "/api/products/categories",
    tag = "Products",
    responses((status = 200, description = "Distinct categories of active products"))
)]
pub async fn list_categories(db: web::Data<MongoDB>) -> HttpResponse {
    match product_service::list_categories(&db).await {
        Ok(categories) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "categories": categories
        })),
        Err(e) => failed("GET /products/categories", e),
    }
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    tag = "Products",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product details", body = ProductResponse),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "Not found or inactive")
    )
)]
pub async fn get_product(db: web::Data<MongoDB>, path: web::Path<String>) -> HttpResponse {
    let id = match path_id(&path, "product") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match product_service::get_product(&db, &id).await {
        Ok(product) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "product": product
        })),
        Err(e) => failed("GET /products/{id}", e),
    }
}

#[utoipa::path(
    post,
    path = "/api/products/{id}/reviews",
    tag = "Products",
    params(("id" = String, Path, description = "Product id")),
    request_body = ReviewRequest,
    responses(
        (status = 201, description = "Review added", body = ProductResponse),
        (status = 409, description = "Already reviewed")
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_review(
    db: web::Data<MongoDB>,
    user: web::ReqData<Claims>,
    path: web::Path<String>,
    request: web::Json<ReviewRequest>,
) -> HttpResponse {
    let id = match path_id(&path, "product") {
        Ok(id) => id,
        Err(response) => return response,
    };
    log::info!("⭐ POST /products/{}/reviews - user: {}", id, user.sub);

    match product_service::add_review(&db, &user, &id, request.into_inner()).await {
        Ok(product) => HttpResponse::Created().json(serde_json::json!({
            "success": true,
            "product": product
        })),
        Err(e) => failed("POST /products/{id}/reviews", e),
    }
}
