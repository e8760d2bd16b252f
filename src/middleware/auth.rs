use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage, HttpResponse,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};

use crate::services::auth_service::{verify_access_token, Claims};

/// Bearer-token guard. Stores the verified `Claims` in request extensions,
/// where handlers pick them up with `web::ReqData<Claims>`.
#[derive(Clone, Copy)]
pub struct AuthMiddleware {
    require_admin: bool,
}

impl AuthMiddleware {
    pub fn user() -> Self {
        Self { require_admin: false }
    }

    pub fn admin() -> Self {
        Self { require_admin: true }
    }
}

pub fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Checks the token and role; the error response is ready to send.
fn authorize(token: Option<String>, require_admin: bool) -> Result<Claims, HttpResponse> {
    let token = token.ok_or_else(|| {
        HttpResponse::Unauthorized().json(serde_json::json!({
            "success": false,
            "error": "Missing authorization token"
        }))
    })?;

    let claims = verify_access_token(&token).map_err(|e| {
        log::warn!("❌ Rejected token: {}", e);
        HttpResponse::Unauthorized().json(serde_json::json!({
            "success": false,
            "error": "Invalid or expired token"
        }))
    })?;

    if require_admin && !claims.is_admin() {
        log::warn!("⛔ Admin route denied for {}", claims.email);
        return Err(HttpResponse::Forbidden().json(serde_json::json!({
            "success": false,
            "error": "Admin access required"
        })));
    }

    Ok(claims)
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            require_admin: self.require_admin,
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    require_admin: bool,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match authorize(bearer_token(&req), self.require_admin) {
            Ok(claims) => {
                req.extensions_mut().insert(claims);
                let fut = self.service.call(req);
                Box::pin(async move {
                    let res = fut.await?;
                    Ok(res.map_into_left_body())
                })
            }
            Err(response) => {
                let res = req.into_response(response).map_into_right_body();
                Box::pin(async move { Ok(res) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{User, ROLE_ADMIN};
    use crate::services::auth_service::generate_jwt;
    use actix_web::{http::StatusCode, test, web, App};
    use mongodb::bson::oid::ObjectId;

    fn token_for(roles: &[&str]) -> String {
        let user = User {
            id: Some(ObjectId::new()),
            name: "Asha".into(),
            email: "asha@example.com".into(),
            password: String::new(),
            phone: None,
            avatar: None,
            roles: roles.iter().map(|r| r.to_string()).collect(),
            is_active: true,
            addresses: vec![],
            cart: vec![],
            wishlist: vec![],
            created_at: 0,
            updated_at: 0,
            last_login: None,
        };
        generate_jwt(&user).unwrap()
    }

    async fn whoami(claims: web::ReqData<Claims>) -> HttpResponse {
        HttpResponse::Ok().body(claims.email.clone())
    }

    #[actix_web::test]
    async fn test_missing_token_is_unauthorized() {
        let app = test::init_service(
            App::new().service(web::scope("/api/users").wrap(AuthMiddleware::user()).route("/me", web::get().to(whoami))),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/api/users/me").to_request()).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn test_valid_token_reaches_handler() {
        let app = test::init_service(
            App::new().service(web::scope("/api/users").wrap(AuthMiddleware::user()).route("/me", web::get().to(whoami))),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/users/me")
            .insert_header((AUTHORIZATION, format!("Bearer {}", token_for(&["customer"]))))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(test::read_body(res).await, "asha@example.com");
    }

    #[actix_web::test]
    async fn test_admin_scope_requires_admin_role() {
        let app = test::init_service(
            App::new().service(web::scope("/api/admin").wrap(AuthMiddleware::admin()).route("/me", web::get().to(whoami))),
        )
        .await;

        let customer = test::TestRequest::get()
            .uri("/api/admin/me")
            .insert_header((AUTHORIZATION, format!("Bearer {}", token_for(&["customer"]))))
            .to_request();
        assert_eq!(test::call_service(&app, customer).await.status(), StatusCode::FORBIDDEN);

        let admin = test::TestRequest::get()
            .uri("/api/admin/me")
            .insert_header((AUTHORIZATION, format!("Bearer {}", token_for(&[ROLE_ADMIN]))))
            .to_request();
        assert_eq!(test::call_service(&app, admin).await.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_garbage_token_is_unauthorized() {
        let app = test::init_service(
            App::new().service(web::scope("/api/users").wrap(AuthMiddleware::user()).route("/me", web::get().to(whoami))),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/users/me")
            .insert_header((AUTHORIZATION, "Bearer not.a.jwt"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }
}
