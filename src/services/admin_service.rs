use crate::{
    database::{MongoDB, ORDERS, PRODUCTS, USERS},
    models::{Order, OrderListItem, OrderStatus, Product, ProductSummary, User, UserInfo, ROLE_ADMIN, ROLE_CUSTOMER},
    services::{auth_service::Claims, product_service::low_stock_products},
    utils::{AppError, AppResult, Page, PageInfo},
};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DashboardStats {
    pub success: bool,
    pub total_users: u64,
    pub total_products: u64,
    pub total_orders: u64,
    /// Sum of `total_price` over orders that were not cancelled
    pub total_revenue: f64,
    pub orders_by_status: BTreeMap<String, u64>,
    pub recent_orders: Vec<OrderListItem>,
    pub low_stock: Vec<ProductSummary>,
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct UserListQuery {
    pub search: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UserListResponse {
    pub success: bool,
    pub users: Vec<UserInfo>,
    #[serde(flatten)]
    pub page: PageInfo,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct AdminUpdateUserRequest {
    pub roles: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

fn as_u64(value: Option<&Bson>) -> u64 {
    match value {
        Some(Bson::Int32(v)) => (*v).max(0) as u64,
        Some(Bson::Int64(v)) => (*v).max(0) as u64,
        Some(Bson::Double(v)) => v.max(0.0) as u64,
        _ => 0,
    }
}

fn as_f64(value: Option<&Bson>) -> f64 {
    match value {
        Some(Bson::Int32(v)) => f64::from(*v),
        Some(Bson::Int64(v)) => *v as f64,
        Some(Bson::Double(v)) => *v,
        _ => 0.0,
    }
}

/// Per-status counts from `$group` output, with every status present.
pub fn status_counts(groups: &[Document]) -> BTreeMap<String, u64> {
    let mut counts: BTreeMap<String, u64> = OrderStatus::ALL.iter().map(|s| (s.as_str().to_string(), 0)).collect();
    for group in groups {
        if let Ok(status) = group.get_str("_id") {
            counts.insert(status.to_string(), as_u64(group.get("count")));
        }
    }
    counts
}

pub fn user_filter(search: Option<&str>) -> Document {
    match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(search) => {
            let re = doc! { "$regex": regex::escape(search), "$options": "i" };
            doc! { "$or": [ { "name": re.clone() }, { "email": re } ] }
        }
        None => doc! {},
    }
}

/// Normalised role list. Rejects unknown roles and empty lists.
pub fn normalize_roles(roles: &[String]) -> AppResult<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for role in roles {
        let role = role.trim().to_lowercase();
        if role != ROLE_CUSTOMER && role != ROLE_ADMIN {
            return Err(AppError::bad_request(format!("Unknown role: {}", role)));
        }
        if !out.contains(&role) {
            out.push(role);
        }
    }
    if out.is_empty() {
        return Err(AppError::bad_request("At least one role is required"));
    }
    Ok(out)
}

/// Admins may not lock themselves out.
pub fn check_self_update(admin: &Claims, target_id: &str, request: &AdminUpdateUserRequest) -> AppResult<()> {
    if admin.sub != target_id {
        return Ok(());
    }
    if request.is_active == Some(false) {
        return Err(AppError::bad_request("You cannot deactivate your own account"));
    }
    if let Some(roles) = &request.roles {
        if !roles.iter().any(|r| r.trim().eq_ignore_ascii_case(ROLE_ADMIN)) {
            return Err(AppError::bad_request("You cannot remove your own admin role"));
        }
    }
    Ok(())
}

pub async fn dashboard(db: &MongoDB) -> AppResult<DashboardStats> {
    let users = db.collection::<User>(USERS);
    let products = db.collection::<Product>(PRODUCTS);
    let orders = db.collection::<Order>(ORDERS);

    let total_users = users.count_documents(doc! {}).await?;
    let total_products = products.count_documents(doc! { "is_active": true }).await?;
    let total_orders = orders.count_documents(doc! {}).await?;

    let revenue: Vec<Document> = orders
        .aggregate(vec![
            doc! { "$match": { "status": { "$ne": OrderStatus::Cancelled.as_str() } } },
            doc! { "$group": { "_id": Bson::Null, "revenue": { "$sum": "$total_price" } } },
        ])
        .await?
        .try_collect()
        .await?;
    let total_revenue = crate::services::pricing::round2(as_f64(revenue.first().and_then(|d| d.get("revenue"))));

    let groups: Vec<Document> = orders
        .aggregate(vec![doc! { "$group": { "_id": "$status", "count": { "$sum": 1 } } }])
        .await?
        .try_collect()
        .await?;

    let recent: Vec<Order> = orders
        .find(doc! {})
        .sort(doc! { "created_at": -1 })
        .limit(5)
        .await?
        .try_collect()
        .await?;

    Ok(DashboardStats {
        success: true,
        total_users,
        total_products,
        total_orders,
        total_revenue,
        orders_by_status: status_counts(&groups),
        recent_orders: recent.into_iter().map(OrderListItem::from).collect(),
        low_stock: low_stock_products(db).await?,
    })
}

pub async fn list_users(db: &MongoDB, query: &UserListQuery) -> AppResult<UserListResponse> {
    let page = Page::new(query.page, query.limit);
    let filter = user_filter(query.search.as_deref());
    let collection = db.collection::<User>(USERS);

    let total = collection.count_documents(filter.clone()).await?;
    let users: Vec<User> = collection
        .find(filter)
        .sort(doc! { "created_at": -1 })
        .skip(page.skip())
        .limit(page.limit as i64)
        .await?
        .try_collect()
        .await?;

    Ok(UserListResponse {
        success: true,
        users: users.iter().map(UserInfo::from).collect(),
        page: PageInfo::new(page, total),
    })
}

pub async fn update_user(
    db: &MongoDB,
    admin: &Claims,
    id: &ObjectId,
    request: AdminUpdateUserRequest,
) -> AppResult<UserInfo> {
    check_self_update(admin, &id.to_hex(), &request)?;

    let mut set = doc! { "updated_at": chrono::Utc::now().timestamp() };
    if let Some(roles) = &request.roles {
        set.insert("roles", normalize_roles(roles)?);
    }
    if let Some(is_active) = request.is_active {
        set.insert("is_active", is_active);
    }

    let updated = db
        .collection::<User>(USERS)
        .find_one_and_update(doc! { "_id": id }, doc! { "$set": set })
        .return_document(mongodb::options::ReturnDocument::After)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    log::info!(
        "👤 User {} updated by {}: roles={:?} active={}",
        updated.email,
        admin.email,
        updated.roles,
        updated.is_active
    );
    Ok(UserInfo::from(&updated))
}
