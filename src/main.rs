mod api;
mod config;
mod database;
mod middleware;
mod models;
mod seeds;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::io;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{AuthMiddleware, SecurityHeaders};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();

    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let settings = config::settings();

    log::info!("🚀 Starting Storefront API...");
    log::info!("📊 Database provider: {:?}", settings.db_provider);

    let db = database::MongoDB::new(settings)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("Failed to connect to MongoDB: {}", e)))?;

    log::info!("✅ MongoDB connected successfully");

    // 🌱 First admin account
    seeds::admin_seed::seed_admin(&db, settings).await;

    let image_store = services::storage_service::build_image_store(settings)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("Failed to configure image storage: {}", e)))?;

    let db_data = web::Data::new(db);
    let store_data = web::Data::new(image_store);

    api::metrics::mark_started();

    let host = settings.host.clone();
    let port = settings.port;

    log::info!("🌐 Server starting on {}:{}", host, port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", host, port);
    log::info!("📄 OpenAPI spec at: http://{}:{}/api-docs/openapi.json", host, port);

    HttpServer::new(move || {
        let cors = settings
            .cors_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                header::ACCEPT,
                header::CACHE_CONTROL,
            ])
            .expose_headers(vec![header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600);

        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(db_data.clone())
            .app_data(store_data.clone())
            .app_data(api::json_config())
            .wrap(cors)
            .wrap(SecurityHeaders)
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi)
            )
            .route("/health", web::get().to(api::health::health_check))
            .route("/metrics", web::get().to(api::metrics::get_metrics))
            .route("/uploads/{name}", web::get().to(api::uploads::serve_upload))
            // ==================== AUTH ====================
            .service(
                web::scope("/api/auth")
                    .route("/register", web::post().to(api::auth::register))
                    .route("/login", web::post().to(api::auth::login))
                    .route("/refresh", web::post().to(api::auth::refresh_token))
                    .service(
                        web::resource("/verify")
                            .wrap(AuthMiddleware::user())
                            .route(web::get().to(api::auth::verify_token))
                    )
                    .service(
                        web::resource("/me")
                            .wrap(AuthMiddleware::user())
                            .route(web::get().to(api::auth::get_me))
                    )
            )
            // ==================== CATALOG ====================
            .service(
                web::scope("/api/products")
                    .route("", web::get().to(api::products::list_products))
                    .route("/featured", web::get().to(api::products::featured_products))
                    .route("/categories", web::get().to(api::products::list_categories))
                    .service(
                        web::resource("/{id}/reviews")
                            .wrap(AuthMiddleware::user())
                            .route(web::post().to(api::products::add_review))
                    )
                    .route("/{id}", web::get().to(api::products::get_product))
            )
            .service(
                web::scope("/api/clients")
                    .route("", web::get().to(api::clients::list_clients))
                    .route("/{id}", web::get().to(api::clients::get_client))
            )
            // ==================== CUSTOMER ====================
            .service(
                web::scope("/api/users")
                    .wrap(AuthMiddleware::user())
                    .route("/profile", web::get().to(api::users::get_profile))
                    .route("/profile", web::put().to(api::users::update_profile))
                    .route("/password", web::put().to(api::users::change_password))
                    .route("/addresses", web::get().to(api::users::list_addresses))
                    .route("/addresses", web::post().to(api::users::add_address))
                    .route("/addresses/{id}", web::put().to(api::users::update_address))
                    .route("/addresses/{id}", web::delete().to(api::users::delete_address))
                    .route("/cart", web::get().to(api::users::get_cart))
                    .route("/cart", web::post().to(api::users::add_to_cart))
                    .route("/cart", web::delete().to(api::users::clear_cart))
                    .route("/cart/{item_id}", web::put().to(api::users::update_cart_item))
                    .route("/cart/{item_id}", web::delete().to(api::users::remove_cart_item))
                    .route("/wishlist", web::get().to(api::users::get_wishlist))
                    .route("/wishlist", web::post().to(api::users::add_to_wishlist))
                    .route("/wishlist/{product_id}", web::delete().to(api::users::remove_from_wishlist))
            )
            .service(
                web::scope("/api/orders")
                    .wrap(AuthMiddleware::user())
                    .route("/quote", web::post().to(api::orders::quote))
                    .route("/my", web::get().to(api::orders::my_orders))
                    .route("", web::post().to(api::orders::create_order))
                    .route("/{id}", web::get().to(api::orders::get_order))
                    .route("/{id}/cancel", web::put().to(api::orders::cancel_order))
                    .route("/{id}/invoice", web::get().to(api::orders::get_invoice))
            )
            // ==================== ADMIN ====================
            .service(
                web::scope("/api/admin")
                    .wrap(AuthMiddleware::admin())
                    .route("/dashboard", web::get().to(api::admin::dashboard))
                    .route("/users", web::get().to(api::admin::list_users))
                    .route("/users/{id}", web::put().to(api::admin::update_user))
                    .route("/orders", web::get().to(api::admin::list_orders))
                    .route("/orders/{id}/status", web::put().to(api::admin::update_order_status))
                    .route("/products", web::get().to(api::admin::list_products))
                    .route("/products", web::post().to(api::admin::create_product))
                    .route("/products/{id}", web::put().to(api::admin::update_product))
                    .route("/products/{id}", web::delete().to(api::admin::delete_product))
                    .route("/products/{id}/stock", web::put().to(api::admin::update_stock))
                    .route("/clients", web::get().to(api::admin::list_clients))
                    .route("/clients", web::post().to(api::admin::create_client))
                    .route("/clients/{id}", web::put().to(api::admin::update_client))
                    .route("/clients/{id}", web::delete().to(api::admin::delete_client))
                    .route("/uploads", web::post().to(api::admin::upload_image))
                    .route("/uploads", web::delete().to(api::admin::delete_image))
            )
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
