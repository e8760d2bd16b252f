pub mod admin_service;
pub mod auth_service;
pub mod client_service;
pub mod invoice_service;
pub mod order_service;
pub mod pricing;
pub mod product_service;
pub mod storage_service;
pub mod user_service;

pub use auth_service::Claims;
pub use storage_service::{ImageStore, SharedImageStore};
