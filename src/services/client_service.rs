use crate::{
    database::{MongoDB, CLIENTS},
    models::{Client, ClientResponse},
    utils::{AppError, AppResult},
};
use chrono::Utc;
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct ClientQuery {
    pub featured: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateClientRequest {
    #[validate(length(min = 2, max = 100, message = "must be between 2 and 100 characters"))]
    pub name: String,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub company: Option<String>,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub designation: Option<String>,
    pub logo: Option<String>,
    #[validate(length(min = 10, max = 2000, message = "must be between 10 and 2000 characters"))]
    pub testimonial: String,
    #[validate(range(min = 1, max = 5, message = "must be between 1 and 5"))]
    pub rating: Option<u8>,
    #[validate(url(message = "must be a valid URL"))]
    pub website: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub display_order: i32,
}

#[derive(Debug, Default, Deserialize, Validate, utoipa::ToSchema)]
pub struct UpdateClientRequest {
    #[validate(length(min = 2, max = 100, message = "must be between 2 and 100 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub company: Option<String>,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub designation: Option<String>,
    pub logo: Option<String>,
    #[validate(length(min = 10, max = 2000, message = "must be between 10 and 2000 characters"))]
    pub testimonial: Option<String>,
    #[validate(range(min = 1, max = 5, message = "must be between 1 and 5"))]
    pub rating: Option<u8>,
    #[validate(url(message = "must be a valid URL"))]
    pub website: Option<String>,
    pub is_featured: Option<bool>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn public_filter(query: &ClientQuery) -> Document {
    let mut filter = doc! { "is_active": true };
    if let Some(featured) = query.featured {
        filter.insert("is_featured", featured);
    }
    filter
}

pub fn apply_update(client: &mut Client, request: UpdateClientRequest) {
    if let Some(name) = request.name { client.name = name.trim().to_string(); }
    if request.company.is_some() { client.company = trimmed(request.company); }
    if request.designation.is_some() { client.designation = trimmed(request.designation); }
    if request.logo.is_some() { client.logo = trimmed(request.logo); }
    if let Some(testimonial) = request.testimonial { client.testimonial = testimonial.trim().to_string(); }
    if request.rating.is_some() { client.rating = request.rating; }
    if request.website.is_some() { client.website = trimmed(request.website); }
    if let Some(is_featured) = request.is_featured { client.is_featured = is_featured; }
    if let Some(display_order) = request.display_order { client.display_order = display_order; }
    if let Some(is_active) = request.is_active { client.is_active = is_active; }
}

pub async fn list_clients(db: &MongoDB, query: &ClientQuery) -> AppResult<Vec<ClientResponse>> {
    let clients: Vec<Client> = db
        .collection::<Client>(CLIENTS)
        .find(public_filter(query))
        .sort(doc! { "display_order": 1, "created_at": -1 })
        .await?
        .try_collect()
        .await?;

    Ok(clients.into_iter().map(ClientResponse::from).collect())
}

/// Admin listing, inactive records included.
pub async fn list_all_clients(db: &MongoDB) -> AppResult<Vec<ClientResponse>> {
    let clients: Vec<Client> = db
        .collection::<Client>(CLIENTS)
        .find(doc! {})
        .sort(doc! { "display_order": 1, "created_at": -1 })
        .await?
        .try_collect()
        .await?;

    Ok(clients.into_iter().map(ClientResponse::from).collect())
}

async fn find_client(db: &MongoDB, id: &ObjectId) -> AppResult<Client> {
    db.collection::<Client>(CLIENTS)
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::not_found("Client not found"))
}

pub async fn get_client(db: &MongoDB, id: &ObjectId) -> AppResult<ClientResponse> {
    let client = find_client(db, id).await?;
    if !client.is_active {
        return Err(AppError::not_found("Client not found"));
    }
    Ok(ClientResponse::from(client))
}

pub async fn create_client(db: &MongoDB, request: CreateClientRequest) -> AppResult<ClientResponse> {
    request.validate()?;

    let now = Utc::now().timestamp();
    let mut client = Client {
        id: None,
        name: request.name.trim().to_string(),
        company: trimmed(request.company),
        designation: trimmed(request.designation),
        logo: trimmed(request.logo),
        testimonial: request.testimonial.trim().to_string(),
        rating: request.rating,
        website: trimmed(request.website),
        is_featured: request.is_featured,
        display_order: request.display_order,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    let result = db.collection::<Client>(CLIENTS).insert_one(&client).await?;
    client.id = result.inserted_id.as_object_id();

    log::info!("✅ Client created: {}", client.name);
    Ok(ClientResponse::from(client))
}

pub async fn update_client(db: &MongoDB, id: &ObjectId, request: UpdateClientRequest) -> AppResult<ClientResponse> {
    request.validate()?;

    let mut client = find_client(db, id).await?;
    apply_update(&mut client, request);
    client.updated_at = Utc::now().timestamp();

    db.collection::<Client>(CLIENTS)
        .replace_one(doc! { "_id": id }, &client)
        .await?;

    Ok(ClientResponse::from(client))
}

pub async fn delete_client(db: &MongoDB, id: &ObjectId) -> AppResult<()> {
    let result = db.collection::<Client>(CLIENTS).delete_one(doc! { "_id": id }).await?;
    if result.deleted_count == 0 {
        return Err(AppError::not_found("Client not found"));
    }
    log::info!("🗑️  Client deleted: {}", id.to_hex());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client {
            id: None,
            name: "Meera".into(),
            company: Some("Handloom House".into()),
            designation: None,
            logo: None,
            testimonial: "Lovely fabrics, quick delivery.".into(),
            rating: Some(5),
            website: None,
            is_featured: false,
            display_order: 0,
            is_active: true,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_public_filter() {
        assert_eq!(public_filter(&ClientQuery::default()), doc! { "is_active": true });
        assert_eq!(
            public_filter(&ClientQuery { featured: Some(true) }),
            doc! { "is_active": true, "is_featured": true }
        );
    }

    #[test]
    fn test_partial_update_clears_blank_optionals() {
        let mut c = client();
        apply_update(
            &mut c,
            UpdateClientRequest {
                company: Some("  ".into()),
                display_order: Some(3),
                ..Default::default()
            },
        );
        assert_eq!(c.company, None);
        assert_eq!(c.display_order, 3);
        assert_eq!(c.rating, Some(5));
        assert_eq!(c.name, "Meera");
    }

    #[test]
    fn test_create_validation() {
        let request: CreateClientRequest = serde_json::from_value(serde_json::json!({
            "name": "M",
            "testimonial": "short",
            "rating": 7,
            "website": "not a url"
        }))
        .unwrap();
        let err: AppError = request.validate().unwrap_err().into();
        match err {
            AppError::Validation(errors) => assert_eq!(errors.len(), 4),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
