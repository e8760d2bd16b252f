use utoipa::OpenApi;
use utoipa::openapi::security::{SecurityScheme, HttpAuthScheme, HttpBuilder};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = "REST backend for the storefront and its admin panel.\n\n**Authentication:** customer and admin endpoints require a JWT Bearer token from `/api/auth/login`.\n\n**Features:**\n- Product catalog with sizes, colors and reviews\n- Cart, wishlist and address book\n- Checkout with GST, shipping and coupons\n- Order tracking and printable invoices\n- Admin dashboard, catalog and order management\n- Image uploads (local disk or Azure Blob)",
        contact(
            name = "Storefront Team",
            email = "support@storefront.example"
        )
    ),
    paths(
        // Auth
        crate::api::auth::register,
        crate::api::auth::login,
        crate::api::auth::refresh_token,
        crate::api::auth::verify_token,
        crate::api::auth::get_me,

        // Health & Metrics
        crate::api::health::health_check,
        crate::api::metrics::get_metrics,

        // Products
        crate::api::products::list_products,
        crate::api::products::featured_products,
        crate::api::products::list_categories,
        crate::api::products::get_product,
        crate::api::products::add_review,

        // Users
        crate::api::users::get_profile,
        crate::api::users::update_profile,
        crate::api::users::change_password,
        crate::api::users::list_addresses,
        crate::api::users::add_address,
        crate::api::users::update_address,
        crate::api::users::delete_address,

        // Cart & Wishlist
        crate::api::users::get_cart,
        crate::api::users::add_to_cart,
        crate::api::users::update_cart_item,
        crate::api::users::remove_cart_item,
        crate::api::users::clear_cart,
        crate::api::users::get_wishlist,
        crate::api::users::add_to_wishlist,
        crate::api::users::remove_from_wishlist,

        // Orders
        crate::api::orders::quote,
        crate::api::orders::create_order,
        crate::api::orders::my_orders,
        crate::api::orders::get_order,
        crate::api::orders::cancel_order,
        crate::api::orders::get_invoice,

        // Clients
        crate::api::clients::list_clients,
        crate::api::clients::get_client,

        // Uploads
        crate::api::uploads::serve_upload,

        // Admin
        crate::api::admin::dashboard,
        crate::api::admin::list_users,
        crate::api::admin::update_user,
        crate::api::admin::list_orders,
        crate::api::admin::update_order_status,
        crate::api::admin::list_products,
        crate::api::admin::create_product,
        crate::api::admin::update_product,
        crate::api::admin::delete_product,
        crate::api::admin::update_stock,
        crate::api::admin::list_clients,
        crate::api::admin::create_client,
        crate::api::admin::update_client,
        crate::api::admin::delete_client,
        crate::api::admin::upload_image,
        crate::api::admin::delete_image,
    ),
    components(
        schemas(
            // Auth
            crate::services::auth_service::RegisterRequest,
            crate::services::auth_service::LoginRequest,
            crate::services::auth_service::RefreshTokenRequest,
            crate::services::auth_service::AuthResponse,
            crate::models::UserInfo,
            crate::models::UserProfile,

            // Health & Metrics
            crate::api::health::HealthResponse,
            crate::api::metrics::MetricsResponse,

            // Catalog
            crate::models::ProductResponse,
            crate::models::ProductSummary,
            crate::models::ProductColor,
            crate::models::ProductSize,
            crate::models::Review,
            crate::services::product_service::ProductListResponse,
            crate::services::product_service::CreateProductRequest,
            crate::services::product_service::UpdateProductRequest,
            crate::services::product_service::UpdateStockRequest,
            crate::services::product_service::ReviewRequest,
            crate::utils::PageInfo,

            // Users
            crate::models::Address,
            crate::models::CartItem,
            crate::services::user_service::UpdateProfileRequest,
            crate::services::user_service::ChangePasswordRequest,
            crate::services::user_service::AddressRequest,
            crate::services::user_service::AddToCartRequest,
            crate::services::user_service::UpdateCartItemRequest,
            crate::services::user_service::WishlistRequest,
            crate::services::user_service::CartLine,
            crate::services::user_service::CartResponse,

            // Orders
            crate::models::OrderStatus,
            crate::models::PaymentMethod,
            crate::models::PaymentStatus,
            crate::models::OrderItem,
            crate::models::ShippingAddress,
            crate::models::StatusChange,
            crate::models::OrderResponse,
            crate::models::OrderListItem,
            crate::services::pricing::PriceBreakdown,
            crate::services::order_service::OrderLineRequest,
            crate::services::order_service::QuoteRequest,
            crate::services::order_service::QuoteResponse,
            crate::services::order_service::CreateOrderRequest,
            crate::services::order_service::CancelOrderRequest,
            crate::services::order_service::UpdateStatusRequest,
            crate::services::order_service::OrderListResponse,

            // Clients
            crate::models::ClientResponse,
            crate::services::client_service::CreateClientRequest,
            crate::services::client_service::UpdateClientRequest,

            // Admin & Uploads
            crate::services::admin_service::DashboardStats,
            crate::services::admin_service::UserListResponse,
            crate::services::admin_service::AdminUpdateUserRequest,
            crate::services::storage_service::UploadImageRequest,
            crate::services::storage_service::UploadResponse,
            crate::services::storage_service::DeleteImageRequest,
        )
    ),
    tags(
        (name = "Auth", description = "Registration, login and token refresh."),
        (name = "Products", description = "Public catalog: listing, search, categories and reviews."),
        (name = "Users", description = "Profile, password and address book of the signed-in customer."),
        (name = "Cart", description = "Server-side cart, priced against the current catalog."),
        (name = "Wishlist", description = "Saved products of the signed-in customer."),
        (name = "Orders", description = "Quote, checkout, order history, cancellation and invoices."),
        (name = "Clients", description = "Showcase of brands and clients the store works with."),
        (name = "Admin", description = "Dashboard and management of users, orders, products, clients and images. Admin role required."),
        (name = "Uploads", description = "Images stored on local disk."),
        (name = "Health", description = "Health check and process metrics."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Access token from /api/auth/login"))
                        .build()
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_checkout_and_admin_paths() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/api/orders"));
        assert!(paths.contains_key("/api/orders/{id}/cancel"));
        assert!(paths.contains_key("/api/admin/orders/{id}/status"));
        assert!(paths.contains_key("/uploads/{name}"));
    }

    #[test]
    fn test_bearer_scheme_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
