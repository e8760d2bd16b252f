use actix_web::{web, HttpResponse};

use crate::{
    api::{failed, path_id},
    database::MongoDB,
    models::{ClientResponse, OrderResponse, ProductResponse, UserInfo},
    services::{
        admin_service::{self, AdminUpdateUserRequest, DashboardStats, UserListQuery, UserListResponse},
        auth_service::Claims,
        client_service::{self, CreateClientRequest, UpdateClientRequest},
        order_service::{self, OrderListQuery, OrderListResponse, UpdateStatusRequest},
        product_service::{self, CreateProductRequest, ProductListResponse, ProductQuery, UpdateProductRequest, UpdateStockRequest},
        storage_service::{self, DeleteImageRequest, SharedImageStore, UploadImageRequest, UploadResponse},
    },
};

// ==================== DASHBOARD & USERS ====================

#[utoipa::path(
    get,
    path = "/api/admin/dashboard",
    tag = "Admin",
    responses((status = 200, description = "Store statistics", body = DashboardStats)),
    security(("bearer_auth" = []))
)]
pub async fn dashboard(db: web::Data<MongoDB>, admin: web::ReqData<Claims>) -> HttpResponse {
    log::info!("📊 GET /admin/dashboard - admin: {}", admin.email);

    match admin_service::dashboard(&db).await {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(e) => failed("GET /admin/dashboard", e),
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "Admin",
    params(UserListQuery),
    responses((status = 200, description = "Users, newest first", body = UserListResponse)),
    security(("bearer_auth" = []))
)]
pub async fn list_users(db: web::Data<MongoDB>, query: web::Query<UserListQuery>) -> HttpResponse {
    match admin_service::list_users(&db, &query).await {
        Ok(users) => HttpResponse::Ok().json(users),
        Err(e) => failed("GET /admin/users", e),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/users/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "User id")),
    request_body = AdminUpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserInfo),
        (status = 400, description = "Unknown role or self lock-out")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    db: web::Data<MongoDB>,
    admin: web::ReqData<Claims>,
    path: web::Path<String>,
    request: web::Json<AdminUpdateUserRequest>,
) -> HttpResponse {
    let id = match path_id(&path, "user") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match admin_service::update_user(&db, &admin, &id, request.into_inner()).await {
        Ok(user) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "user": user })),
        Err(e) => failed("PUT /admin/users/{id}", e),
    }
}

// ==================== ORDERS ====================

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    tag = "Admin",
    params(OrderListQuery),
    responses((status = 200, description = "All orders, newest first", body = OrderListResponse)),
    security(("bearer_auth" = []))
)]
pub async fn list_orders(db: web::Data<MongoDB>, query: web::Query<OrderListQuery>) -> HttpResponse {
    match order_service::list_orders(&db, &query).await {
        Ok(orders) => HttpResponse::Ok().json(orders),
        Err(e) => failed("GET /admin/orders", e),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/orders/{id}/status",
    tag = "Admin",
    params(("id" = String, Path, description = "Order id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = OrderResponse),
        (status = 409, description = "Transition not allowed")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_order_status(
    db: web::Data<MongoDB>,
    admin: web::ReqData<Claims>,
    path: web::Path<String>,
    request: web::Json<UpdateStatusRequest>,
) -> HttpResponse {
    let id = match path_id(&path, "order") {
        Ok(id) => id,
        Err(response) => return response,
    };
    log::info!("📦 PUT /admin/orders/{}/status → {}", id, request.status);

    match order_service::update_status(&db, &admin, &id, request.into_inner()).await {
        Ok(order) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "order": order })),
        Err(e) => failed("PUT /admin/orders/{id}/status", e),
    }
}

// ==================== PRODUCTS ====================

#[utoipa::path(
    get,
    path = "/api/admin/products",
    tag = "Admin",
    params(ProductQuery),
    responses((status = 200, description = "All products including inactive", body = ProductListResponse)),
    security(("bearer_auth" = []))
)]
pub async fn list_products(db: web::Data<MongoDB>, query: web::Query<ProductQuery>) -> HttpResponse {
    match product_service::list_all_products(&db, &query).await {
        Ok(products) => HttpResponse::Ok().json(products),
        Err(e) => failed("GET /admin/products", e),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/products",
    tag = "Admin",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 409, description = "Duplicate SKU")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_product(db: web::Data<MongoDB>, request: web::Json<CreateProductRequest>) -> HttpResponse {
    log::info!("➕ POST /admin/products - {}", request.name);

    match product_service::create_product(&db, request.into_inner()).await {
        Ok(product) => HttpResponse::Created().json(serde_json::json!({ "success": true, "product": product })),
        Err(e) => failed("POST /admin/products", e),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/products/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "Product id")),
    request_body = UpdateProductRequest,
    responses((status = 200, description = "Product updated", body = ProductResponse)),
    security(("bearer_auth" = []))
)]
pub async fn update_product(
    db: web::Data<MongoDB>,
    path: web::Path<String>,
    request: web::Json<UpdateProductRequest>,
) -> HttpResponse {
    let id = match path_id(&path, "product") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match product_service::update_product(&db, &id, request.into_inner()).await {
        Ok(product) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "product": product })),
        Err(e) => failed("PUT /admin/products/{id}", e),
    }
}

#[utoipa::path(
    delete,
    path = "/api/admin/products/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "Product id")),
    responses((status = 200, description = "Product deactivated")),
    security(("bearer_auth" = []))
)]
pub async fn delete_product(db: web::Data<MongoDB>, path: web::Path<String>) -> HttpResponse {
    let id = match path_id(&path, "product") {
        Ok(id) => id,
        Err(response) => return response,
    };
    log::info!("🗑️  DELETE /admin/products/{}", id);

    match product_service::delete_product(&db, &id).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "message": "Product removed from the catalog"
        })),
        Err(e) => failed("DELETE /admin/products/{id}", e),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/products/{id}/stock",
    tag = "Admin",
    params(("id" = String, Path, description = "Product id")),
    request_body = UpdateStockRequest,
    responses((status = 200, description = "Stock updated", body = ProductResponse)),
    security(("bearer_auth" = []))
)]
pub async fn update_stock(
    db: web::Data<MongoDB>,
    path: web::Path<String>,
    request: web::Json<UpdateStockRequest>,
) -> HttpResponse {
    let id = match path_id(&path, "product") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match product_service::update_stock(&db, &id, request.into_inner()).await {
        Ok(product) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "product": product })),
        Err(e) => failed("PUT /admin/products/{id}/stock", e),
    }
}

// ==================== CLIENTS ====================

#[utoipa::path(
    get,
    path = "/api/admin/clients",
    tag = "Admin",
    responses((status = 200, description = "All clients including inactive", body = [ClientResponse])),
    security(("bearer_auth" = []))
)]
pub async fn list_clients(db: web::Data<MongoDB>) -> HttpResponse {
    match client_service::list_all_clients(&db).await {
        Ok(clients) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "clients": clients })),
        Err(e) => failed("GET /admin/clients", e),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/clients",
    tag = "Admin",
    request_body = CreateClientRequest,
    responses((status = 201, description = "Client created", body = ClientResponse)),
    security(("bearer_auth" = []))
)]
pub async fn create_client(db: web::Data<MongoDB>, request: web::Json<CreateClientRequest>) -> HttpResponse {
    match client_service::create_client(&db, request.into_inner()).await {
        Ok(client) => HttpResponse::Created().json(serde_json::json!({ "success": true, "client": client })),
        Err(e) => failed("POST /admin/clients", e),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/clients/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "Client id")),
    request_body = UpdateClientRequest,
    responses((status = 200, description = "Client updated", body = ClientResponse)),
    security(("bearer_auth" = []))
)]
pub async fn update_client(
    db: web::Data<MongoDB>,
    path: web::Path<String>,
    request: web::Json<UpdateClientRequest>,
) -> HttpResponse {
    let id = match path_id(&path, "client") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match client_service::update_client(&db, &id, request.into_inner()).await {
        Ok(client) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "client": client })),
        Err(e) => failed("PUT /admin/clients/{id}", e),
    }
}

#[utoipa::path(
    delete,
    path = "/api/admin/clients/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "Client id")),
    responses((status = 200, description = "Client deleted")),
    security(("bearer_auth" = []))
)]
pub async fn delete_client(db: web::Data<MongoDB>, path: web::Path<String>) -> HttpResponse {
    let id = match path_id(&path, "client") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match client_service::delete_client(&db, &id).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "message": "Client deleted" })),
        Err(e) => failed("DELETE /admin/clients/{id}", e),
    }
}

// ==================== UPLOADS ====================

#[utoipa::path(
    post,
    path = "/api/admin/uploads",
    tag = "Admin",
    request_body = UploadImageRequest,
    responses(
        (status = 201, description = "Image stored", body = UploadResponse),
        (status = 400, description = "Unsupported type, bad base64 or larger than 5 MB")
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_image(store: web::Data<SharedImageStore>, request: web::Json<UploadImageRequest>) -> HttpResponse {
    log::info!("⬆️  POST /admin/uploads - {}", request.content_type);

    match storage_service::upload_image(store.get_ref().as_ref(), &request).await {
        Ok(uploaded) => HttpResponse::Created().json(uploaded),
        Err(e) => failed("POST /admin/uploads", e),
    }
}

#[utoipa::path(
    delete,
    path = "/api/admin/uploads",
    tag = "Admin",
    request_body = DeleteImageRequest,
    responses((status = 200, description = "Image deleted")),
    security(("bearer_auth" = []))
)]
pub async fn delete_image(store: web::Data<SharedImageStore>, request: web::Json<DeleteImageRequest>) -> HttpResponse {
    match store.delete(&request.url).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "message": "Image deleted" })),
        Err(e) => failed("DELETE /admin/uploads", e),
    }
}
