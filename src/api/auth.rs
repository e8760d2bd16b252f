use actix_web::{web, HttpResponse};

use crate::{
    api::failed,
    database::MongoDB,
    models::UserProfile,
    services::{
        auth_service::{self, AuthResponse, Claims, LoginRequest, RefreshTokenRequest, RegisterRequest},
        user_service,
    },
};

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registration successful", body = AuthResponse),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "User already exists")
    )
)]
pub async fn register(db: web::Data<MongoDB>, request: web::Json<RegisterRequest>) -> HttpResponse {
    log::info!("📝 POST /auth/register - email: {}", request.email);

    match auth_service::register(&db, &request).await {
        Ok(response) => HttpResponse::Created().json(response),
        Err(e) => failed("POST /auth/register", e),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account is inactive")
    )
)]
pub async fn login(db: web::Data<MongoDB>, request: web::Json<LoginRequest>) -> HttpResponse {
    log::info!("🔐 POST /auth/login - email: {}", request.email);

    match auth_service::login(&db, &request).await {
        Ok(response) => {
            log::info!("✅ Login successful: {}", request.email);
            HttpResponse::Ok().json(response)
        }
        Err(e) => failed("POST /auth/login", e),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "Auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New token pair", body = AuthResponse),
        (status = 401, description = "Invalid refresh token")
    )
)]
pub async fn refresh_token(db: web::Data<MongoDB>, request: web::Json<RefreshTokenRequest>) -> HttpResponse {
    log::info!("🔄 POST /auth/refresh");

    match auth_service::refresh_token(&db, &request).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => failed("POST /auth/refresh", e),
    }
}

#[utoipa::path(
    get,
    path = "/api/auth/verify",
    tag = "Auth",
    responses(
        (status = 200, description = "Token is valid"),
        (status = 401, description = "Invalid or expired token")
    ),
    security(("bearer_auth" = []))
)]
pub async fn verify_token(user: web::ReqData<Claims>) -> HttpResponse {
    log::info!("✓ GET /auth/verify - user: {}", user.sub);

    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "valid": true,
        "user_id": user.sub,
        "email": user.email,
        "roles": user.roles,
        "exp": user.exp
    }))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user profile", body = UserProfile),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_me(db: web::Data<MongoDB>, user: web::ReqData<Claims>) -> HttpResponse {
    log::info!("👤 GET /auth/me - user: {}", user.sub);

    match user_service::get_profile(&db, &user).await {
        Ok(profile) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "user": profile
        })),
        Err(e) => failed("GET /auth/me", e),
    }
}
