pub mod client;
pub mod order;
pub mod product;
pub mod user;

pub use client::*;
pub use order::*;
pub use product::*;
pub use user::*;
