use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

pub const ROLE_CUSTOMER: &str = "customer";
pub const ROLE_ADMIN: &str = "admin";

/// Document in the "users" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub email: String,
    /// bcrypt hash
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default = "default_roles")]
    pub roles: Vec<String>,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub cart: Vec<CartItem>,
    /// Product ids (hex)
    #[serde(default)]
    pub wishlist: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<i64>,
}

fn default_roles() -> Vec<String> {
    vec![ROLE_CUSTOMER.to_string()]
}

fn default_is_active() -> bool {
    true
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ROLE_ADMIN)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
pub struct Address {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Line in the embedded cart. Identity is (product, size, color).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
pub struct CartItem {
    pub id: String,
    pub product_id: String,
    pub quantity: u32,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    pub added_at: i64,
}

impl CartItem {
    pub fn same_variant(&self, product_id: &str, size: Option<&str>, color: Option<&str>) -> bool {
        self.product_id == product_id && self.size.as_deref() == size && self.color.as_deref() == color
    }
}

/// Public view of a user; never carries the password hash.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub roles: Vec<String>,
    pub is_active: bool,
    pub created_at: i64,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        UserInfo {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            avatar: user.avatar.clone(),
            roles: user.roles.clone(),
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

/// Profile view including the embedded address book
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct UserProfile {
    #[serde(flatten)]
    pub info: UserInfo,
    pub addresses: Vec<Address>,
    pub wishlist_count: usize,
    pub cart_count: usize,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        UserProfile {
            info: UserInfo::from(user),
            addresses: user.addresses.clone(),
            wishlist_count: user.wishlist.len(),
            cart_count: user.cart.len(),
        }
    }
}
