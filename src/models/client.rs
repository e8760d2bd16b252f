use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Showcase / testimonial record in the "clients" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub designation: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    pub testimonial: String,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ClientResponse {
    pub id: String,
    pub name: String,
    pub company: Option<String>,
    pub designation: Option<String>,
    pub logo: Option<String>,
    pub testimonial: String,
    pub rating: Option<u8>,
    pub website: Option<String>,
    pub is_featured: bool,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Client> for ClientResponse {
    fn from(c: Client) -> Self {
        ClientResponse {
            id: c.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: c.name,
            company: c.company,
            designation: c.designation,
            logo: c.logo,
            testimonial: c.testimonial,
            rating: c.rating,
            website: c.website,
            is_featured: c.is_featured,
            display_order: c.display_order,
            is_active: c.is_active,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}
