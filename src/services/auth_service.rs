use crate::{
    config::settings,
    database::{MongoDB, USERS},
    models::{User, UserInfo, ROLE_CUSTOMER},
    utils::{conflict_on_duplicate, AppError, AppResult},
};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::{doc, oid::ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;
use validator::Validate;

pub const TOKEN_ACCESS: &str = "access";
pub const TOKEN_REFRESH: &str = "refresh";

lazy_static::lazy_static! {
    /// 10-digit Indian mobile number, optional +91 prefix
    pub static ref PHONE_REGEX: regex::Regex = regex::Regex::new(r"^(\+91[\-\s]?)?[6-9]\d{9}$").unwrap();
}

// JWT Claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,           // user id (hex ObjectId)
    pub email: String,
    pub name: Option<String>,
    pub roles: Vec<String>,
    pub typ: String,           // "access" | "refresh"
    pub iat: usize,
    pub exp: usize,
    pub jti: String,
    pub aud: String,
    pub iss: String,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == crate::models::ROLE_ADMIN)
    }

    pub fn user_object_id(&self) -> AppResult<ObjectId> {
        ObjectId::parse_str(&self.sub).map_err(|_| AppError::Unauthorized("Invalid token subject".into()))
    }
}

// Request/Response structures
#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 50, message = "must be between 2 and 50 characters"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, max = 128, message = "must be at least 6 characters"))]
    pub password: String,
    #[validate(regex(path = "PHONE_REGEX", message = "must be a valid 10-digit mobile number"))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub refresh_token: String,
    pub user: UserInfo,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn now_ts() -> usize {
    Utc::now().timestamp() as usize
}

fn issue(claims: &Claims) -> AppResult<String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(settings().jwt_secret.as_ref()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
}

// Generate JWT token
pub fn generate_jwt(user: &User) -> AppResult<String> {
    let cfg = settings();
    let claims = Claims {
        sub: user.id.map(|id| id.to_hex()).unwrap_or_default(),
        email: user.email.clone(),
        name: Some(user.name.clone()),
        roles: user.roles.clone(),
        typ: TOKEN_ACCESS.to_string(),
        iat: now_ts(),
        exp: (Utc::now() + Duration::hours(cfg.jwt_expires_hours)).timestamp() as usize,
        jti: Uuid::new_v4().to_string(),
        aud: cfg.jwt_audience.clone(),
        iss: cfg.jwt_issuer.clone(),
    };
    issue(&claims)
}

// Generate refresh token (longer expiry)
pub fn generate_refresh_token(user: &User) -> AppResult<String> {
    let cfg = settings();
    let claims = Claims {
        sub: user.id.map(|id| id.to_hex()).unwrap_or_default(),
        email: user.email.clone(),
        name: None,
        roles: vec![],
        typ: TOKEN_REFRESH.to_string(),
        iat: now_ts(),
        exp: (Utc::now() + Duration::days(cfg.refresh_expires_days)).timestamp() as usize,
        jti: Uuid::new_v4().to_string(),
        aud: cfg.jwt_audience.clone(),
        iss: cfg.jwt_issuer.clone(),
    };
    issue(&claims)
}

// Verify JWT token
pub fn verify_token(token: &str) -> AppResult<Claims> {
    let cfg = settings();
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[cfg.jwt_audience.clone()]);

    let mut issuers = HashSet::new();
    issuers.insert(cfg.jwt_issuer.clone());
    validation.iss = Some(issuers);

    let data = decode::<Claims>(token, &DecodingKey::from_secret(cfg.jwt_secret.as_ref()), &validation)?;
    Ok(data.claims)
}

/// Verifies an access token; refresh tokens are not accepted on API routes.
pub fn verify_access_token(token: &str) -> AppResult<Claims> {
    let claims = verify_token(token)?;
    if claims.typ != TOKEN_ACCESS {
        return Err(AppError::Unauthorized("Invalid token type".into()));
    }
    Ok(claims)
}

fn auth_response(user: &User) -> AppResult<AuthResponse> {
    Ok(AuthResponse {
        success: true,
        token: generate_jwt(user)?,
        refresh_token: generate_refresh_token(user)?,
        user: UserInfo::from(user),
    })
}

pub async fn find_user(db: &MongoDB, user_id: &ObjectId) -> AppResult<User> {
    db.collection::<User>(USERS)
        .find_one(doc! { "_id": user_id })
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

// User registration
pub async fn register(db: &MongoDB, request: &RegisterRequest) -> AppResult<AuthResponse> {
    request.validate()?;

    let collection = db.collection::<User>(USERS);
    let email = normalize_email(&request.email);

    if collection.find_one(doc! { "email": &email }).await?.is_some() {
        return Err(AppError::Conflict("User already exists".into()));
    }

    let hashed_password = hash(&request.password, DEFAULT_COST)?;
    let now = Utc::now().timestamp();

    let mut new_user = User {
        id: None,
        name: request.name.trim().to_string(),
        email: email.clone(),
        password: hashed_password,
        phone: request.phone.clone(),
        avatar: None,
        roles: vec![ROLE_CUSTOMER.to_string()],
        is_active: true,
        addresses: vec![],
        cart: vec![],
        wishlist: vec![],
        created_at: now,
        updated_at: now,
        last_login: Some(now),
    };

    // A registration racing this one passes the lookup above; the unique index catches it
    let result = collection
        .insert_one(&new_user)
        .await
        .map_err(|e| conflict_on_duplicate(e, "User already exists"))?;
    new_user.id = result.inserted_id.as_object_id();

    log::info!("✅ User registered successfully: {}", email);

    auth_response(&new_user)
}

// User login
pub async fn login(db: &MongoDB, request: &LoginRequest) -> AppResult<AuthResponse> {
    request.validate()?;

    let collection = db.collection::<User>(USERS);
    let email = normalize_email(&request.email);

    let user = collection
        .find_one(doc! { "email": &email })
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".into()))?;

    if !verify(&request.password, &user.password)? {
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    if !user.is_active {
        return Err(AppError::Forbidden("Account is inactive".into()));
    }

    collection
        .update_one(
            doc! { "_id": user.id },
            doc! { "$set": { "last_login": Utc::now().timestamp() } },
        )
        .await?;

    auth_response(&user)
}

// Refresh token
pub async fn refresh_token(db: &MongoDB, request: &RefreshTokenRequest) -> AppResult<AuthResponse> {
    let claims = verify_token(&request.refresh_token)?;
    if claims.typ != TOKEN_REFRESH {
        return Err(AppError::Unauthorized("Invalid token type".into()));
    }

    let user = find_user(db, &claims.user_object_id()?)
        .await
        .map_err(|_| AppError::Unauthorized("User not found".into()))?;

    if !user.is_active {
        return Err(AppError::Forbidden("Account is inactive".into()));
    }

    auth_response(&user)
}
