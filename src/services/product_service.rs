use crate::{
    database::{MongoDB, PRODUCTS},
    models::{Product, ProductColor, ProductResponse, ProductSize, Review, ProductSummary},
    services::auth_service::Claims,
    utils::{conflict_on_duplicate, new_sub_id, AppError, AppResult, Page, PageInfo},
};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::options::ReturnDocument;
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const LOW_STOCK_THRESHOLD: u32 = 5;
const DUPLICATE_SKU: &str = "A product with this SKU already exists";

// ==================== REQUEST/RESPONSE MODELS ====================

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub featured: Option<bool>,
    pub in_stock: Option<bool>,
    /// newest | price_asc | price_desc | rating | name
    pub sort: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ProductListResponse {
    pub success: bool,
    pub products: Vec<ProductResponse>,
    #[serde(flatten)]
    pub page: PageInfo,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 2, max = 120, message = "must be between 2 and 120 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 5000, message = "is required"))]
    pub description: String,
    #[validate(range(min = 0.01, message = "must be greater than 0"))]
    pub price: f64,
    #[validate(range(min = 0.01, message = "must be greater than 0"))]
    pub original_price: Option<f64>,
    #[validate(length(min = 1, max = 50, message = "is required"))]
    pub category: String,
    pub brand: Option<String>,
    #[validate(length(min = 1, max = 50, message = "must be at most 50 characters"))]
    pub sku: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    #[validate]
    pub colors: Vec<ProductColor>,
    #[serde(default)]
    #[validate]
    pub sizes: Vec<ProductSize>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_featured: bool,
}

#[derive(Debug, Default, Deserialize, Validate, utoipa::ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 2, max = 120, message = "must be between 2 and 120 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 5000, message = "is required"))]
    pub description: Option<String>,
    #[validate(range(min = 0.01, message = "must be greater than 0"))]
    pub price: Option<f64>,
    #[validate(range(min = 0.01, message = "must be greater than 0"))]
    pub original_price: Option<f64>,
    #[validate(length(min = 1, max = 50, message = "is required"))]
    pub category: Option<String>,
    pub brand: Option<String>,
    #[validate(length(min = 1, max = 50, message = "must be at most 50 characters"))]
    pub sku: Option<String>,
    pub images: Option<Vec<String>>,
    pub colors: Option<Vec<ProductColor>>,
    pub sizes: Option<Vec<ProductSize>>,
    pub stock: Option<u32>,
    pub tags: Option<Vec<String>>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateStockRequest {
    /// Aggregate stock for products without sizes
    pub stock: Option<u32>,
    /// Per-size stock; sizes not listed keep their current stock
    pub sizes: Option<Vec<ProductSize>>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct ReviewRequest {
    #[validate(range(min = 1, max = 5, message = "must be between 1 and 5"))]
    pub rating: u8,
    #[validate(length(min = 1, max = 1000, message = "must be between 1 and 1000 characters"))]
    pub comment: String,
}

// ==================== QUERY BUILDING ====================

/// Mongo filter for the public catalog listing.
pub fn build_filter(query: &ProductQuery) -> Document {
    let mut filter = doc! { "is_active": true };

    if let Some(category) = query.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        filter.insert("category", category);
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = regex::escape(search);
        let re = doc! { "$regex": pattern, "$options": "i" };
        filter.insert(
            "$or",
            vec![
                doc! { "name": re.clone() },
                doc! { "description": re.clone() },
                doc! { "brand": re.clone() },
                doc! { "tags": re },
            ],
        );
    }

    let mut price = Document::new();
    if let Some(min) = query.min_price {
        price.insert("$gte", min);
    }
    if let Some(max) = query.max_price {
        price.insert("$lte", max);
    }
    if !price.is_empty() {
        filter.insert("price", price);
    }

    if let Some(featured) = query.featured {
        filter.insert("is_featured", featured);
    }

    if query.in_stock == Some(true) {
        filter.insert("total_stock", doc! { "$gt": 0 });
    }

    filter
}

pub fn sort_for(sort: Option<&str>) -> Document {
    match sort.unwrap_or("newest") {
        "price_asc" => doc! { "price": 1, "_id": 1 },
        "price_desc" => doc! { "price": -1, "_id": 1 },
        "rating" => doc! { "rating": -1, "num_reviews": -1, "_id": 1 },
        "name" => doc! { "name": 1, "_id": 1 },
        _ => doc! { "created_at": -1, "_id": -1 },
    }
}

fn check_prices(price: f64, original_price: Option<f64>) -> AppResult<()> {
    match original_price {
        Some(mrp) if mrp < price => Err(AppError::Validation(vec![
            "original_price: must be greater than or equal to price".to_string(),
        ])),
        _ => Ok(()),
    }
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

// ==================== SERVICE FUNCTIONS ====================

pub async fn find_product(db: &MongoDB, id: &ObjectId) -> AppResult<Product> {
    db.collection::<Product>(PRODUCTS)
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))
}

/// Loads the given products in one query, keyed by hex id.
pub async fn find_products_by_ids(
    db: &MongoDB,
    ids: &[String],
) -> AppResult<std::collections::HashMap<String, Product>> {
    let object_ids: Vec<ObjectId> = ids.iter().filter_map(|id| ObjectId::parse_str(id).ok()).collect();
    if object_ids.is_empty() {
        return Ok(Default::default());
    }

    let products: Vec<Product> = db
        .collection::<Product>(PRODUCTS)
        .find(doc! { "_id": { "$in": object_ids } })
        .await?
        .try_collect()
        .await?;

    Ok(products
        .into_iter()
        .filter_map(|p| p.id.map(|id| (id.to_hex(), p)))
        .collect())
}

pub async fn list_products(db: &MongoDB, query: &ProductQuery) -> AppResult<ProductListResponse> {
    let page = Page::new(query.page, query.limit);
    let filter = build_filter(query);
    let collection = db.collection::<Product>(PRODUCTS);

    let total = collection.count_documents(filter.clone()).await?;
    let products: Vec<Product> = collection
        .find(filter)
        .sort(sort_for(query.sort.as_deref()))
        .skip(page.skip())
        .limit(page.limit as i64)
        .await?
        .try_collect()
        .await?;

    Ok(ProductListResponse {
        success: true,
        products: products.into_iter().map(ProductResponse::from).collect(),
        page: PageInfo::new(page, total),
    })
}

/// Admin listing: includes inactive products.
pub async fn list_all_products(db: &MongoDB, query: &ProductQuery) -> AppResult<ProductListResponse> {
    let page = Page::new(query.page, query.limit);
    let mut filter = build_filter(query);
    filter.remove("is_active");

    let collection = db.collection::<Product>(PRODUCTS);
    let total = collection.count_documents(filter.clone()).await?;
    let products: Vec<Product> = collection
        .find(filter)
        .sort(sort_for(query.sort.as_deref()))
        .skip(page.skip())
        .limit(page.limit as i64)
        .await?
        .try_collect()
        .await?;

    Ok(ProductListResponse {
        success: true,
        products: products.into_iter().map(ProductResponse::from).collect(),
        page: PageInfo::new(page, total),
    })
}

pub async fn featured_products(db: &MongoDB, limit: u64) -> AppResult<Vec<ProductSummary>> {
    let products: Vec<Product> = db
        .collection::<Product>(PRODUCTS)
        .find(doc! { "is_active": true, "is_featured": true })
        .sort(doc! { "created_at": -1 })
        .limit(limit.clamp(1, 50) as i64)
        .await?
        .try_collect()
        .await?;

    Ok(products.iter().map(ProductSummary::from).collect())
}

pub async fn list_categories(db: &MongoDB) -> AppResult<Vec<String>> {
    let values = db
        .collection::<Product>(PRODUCTS)
        .distinct("category", doc! { "is_active": true })
        .await?;

    let mut categories: Vec<String> = values
        .into_iter()
        .filter_map(|v| match v {
            Bson::String(s) if !s.trim().is_empty() => Some(s),
            _ => None,
        })
        .collect();
    categories.sort();
    Ok(categories)
}

/// Public lookup: inactive products are reported as missing.
pub async fn get_product(db: &MongoDB, id: &ObjectId) -> AppResult<ProductResponse> {
    let product = find_product(db, id).await?;
    if !product.is_active {
        return Err(AppError::not_found("Product not found"));
    }
    Ok(ProductResponse::from(product))
}

pub async fn create_product(db: &MongoDB, request: CreateProductRequest) -> AppResult<ProductResponse> {
    request.validate()?;
    check_prices(request.price, request.original_price)?;

    let timestamp = now();
    let mut product = Product {
        id: None,
        name: request.name.trim().to_string(),
        description: request.description,
        price: request.price,
        original_price: request.original_price,
        category: request.category.trim().to_lowercase(),
        brand: request.brand.map(|b| b.trim().to_string()).filter(|b| !b.is_empty()),
        sku: request.sku.map(|s| s.trim().to_uppercase()),
        images: clean_list(request.images),
        colors: request.colors,
        sizes: request.sizes,
        stock: request.stock,
        total_stock: 0,
        reviews: vec![],
        rating: 0.0,
        num_reviews: 0,
        tags: clean_list(request.tags),
        is_featured: request.is_featured,
        is_active: true,
        created_at: timestamp,
        updated_at: timestamp,
    };
    product.refresh_totals();

    let result = db
        .collection::<Product>(PRODUCTS)
        .insert_one(&product)
        .await
        .map_err(|e| conflict_on_duplicate(e, DUPLICATE_SKU))?;
    product.id = result.inserted_id.as_object_id();

    log::info!("✅ Product created: {} ({})", product.name, crate::utils::hex_id(&product.id));
    Ok(ProductResponse::from(product))
}

/// Pipeline stage that derives `total_stock` from the stored sizes (or the aggregate).
///
/// Evaluated by the server against the current document, so it never undoes a
/// concurrent reservation.
pub fn stock_totals_stage() -> Document {
    doc! { "$set": { "total_stock": { "$cond": [
        { "$gt": [{ "$size": { "$ifNull": ["$sizes", []] } }, 0] },
        { "$sum": "$sizes.stock" },
        { "$ifNull": ["$stock", 0] },
    ] } } }
}

/// Fields a partial update writes. Values are wrapped in `$literal` because
/// the update runs as a pipeline.
pub fn update_fields(request: UpdateProductRequest, updated_at: i64) -> AppResult<Document> {
    let mut set = Document::new();
    let mut put = |key: &str, value: Bson| {
        set.insert(key, doc! { "$literal": value });
    };

    if let Some(name) = request.name { put("name", name.trim().into()); }
    if let Some(description) = request.description { put("description", description.into()); }
    if let Some(price) = request.price { put("price", price.into()); }
    if let Some(original_price) = request.original_price { put("original_price", original_price.into()); }
    if let Some(category) = request.category { put("category", category.trim().to_lowercase().into()); }
    if let Some(brand) = request.brand {
        let brand = brand.trim().to_string();
        put("brand", if brand.is_empty() { Bson::Null } else { brand.into() });
    }
    if let Some(sku) = request.sku { put("sku", sku.trim().to_uppercase().into()); }
    if let Some(images) = request.images { put("images", clean_list(images).into()); }
    if let Some(colors) = request.colors { put("colors", mongodb::bson::to_bson(&colors)?); }
    if let Some(sizes) = request.sizes { put("sizes", mongodb::bson::to_bson(&sizes)?); }
    if let Some(stock) = request.stock { put("stock", i64::from(stock).into()); }
    if let Some(tags) = request.tags { put("tags", clean_list(tags).into()); }
    if let Some(is_featured) = request.is_featured { put("is_featured", is_featured.into()); }
    if let Some(is_active) = request.is_active { put("is_active", is_active.into()); }
    put("updated_at", updated_at.into());

    Ok(set)
}

/// Partial update. Only the requested fields are written; stock fields the
/// request leaves out keep whatever concurrent orders made of them.
pub async fn update_product(
    db: &MongoDB,
    id: &ObjectId,
    request: UpdateProductRequest,
) -> AppResult<ProductResponse> {
    request.validate()?;

    let current = find_product(db, id).await?;
    check_prices(
        request.price.unwrap_or(current.price),
        request.original_price.or(current.original_price),
    )?;

    let pipeline = vec![doc! { "$set": update_fields(request, now())? }, stock_totals_stage()];

    let product = db
        .collection::<Product>(PRODUCTS)
        .find_one_and_update(doc! { "_id": id }, pipeline)
        .return_document(ReturnDocument::After)
        .await
        .map_err(|e| conflict_on_duplicate(e, DUPLICATE_SKU))?
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    Ok(ProductResponse::from(product))
}

/// Soft delete: the product disappears from the storefront but old orders keep resolving.
pub async fn delete_product(db: &MongoDB, id: &ObjectId) -> AppResult<()> {
    let result = db
        .collection::<Product>(PRODUCTS)
        .update_one(
            doc! { "_id": id },
            doc! { "$set": { "is_active": false, "is_featured": false, "updated_at": now() } },
        )
        .await?;

    if result.matched_count == 0 {
        return Err(AppError::not_found("Product not found"));
    }
    Ok(())
}

/// Filter and update setting one size's stock. Unknown sizes are appended.
pub fn size_stock_update(id: &ObjectId, product: &Product, update: &ProductSize) -> (Document, Document) {
    let stock = i64::from(update.stock);
    match product.canonical_size(update.size.trim()) {
        Some(label) => (
            doc! { "_id": id, "sizes.size": label },
            doc! { "$set": { "sizes.$.stock": stock } },
        ),
        None => {
            let size = update.size.trim();
            (
                doc! { "_id": id, "sizes.size": { "$ne": size } },
                doc! { "$push": { "sizes": { "size": size, "stock": stock } } },
            )
        }
    }
}

pub async fn update_stock(db: &MongoDB, id: &ObjectId, request: UpdateStockRequest) -> AppResult<ProductResponse> {
    let product = find_product(db, id).await?;
    let sizes = request.sizes.unwrap_or_default();
    if sizes.iter().any(|s| s.size.trim().is_empty()) {
        return Err(AppError::bad_request("Size label is required"));
    }

    let collection = db.collection::<Product>(PRODUCTS);

    if let Some(stock) = request.stock {
        collection
            .update_one(doc! { "_id": id }, doc! { "$set": { "stock": i64::from(stock) } })
            .await?;
    }
    for update in &sizes {
        let (filter, change) = size_stock_update(id, &product, update);
        collection.update_one(filter, change).await?;
    }

    let product = collection
        .find_one_and_update(
            doc! { "_id": id },
            vec![doc! { "$set": { "updated_at": now() } }, stock_totals_stage()],
        )
        .return_document(ReturnDocument::After)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    log::info!("📦 Stock updated for {}: total {}", product.name, product.total_stock);
    Ok(ProductResponse::from(product))
}

/// Appends a review and recomputes `rating`/`num_reviews` in one server-side update.
pub fn review_pipeline(review: &Review) -> AppResult<Vec<Document>> {
    let review = mongodb::bson::to_bson(review)?;
    Ok(vec![
        doc! { "$set": { "reviews": { "$concatArrays": [
            { "$ifNull": ["$reviews", []] },
            [{ "$literal": review }],
        ] } } },
        doc! { "$set": {
            "num_reviews": { "$size": "$reviews" },
            "rating": { "$round": [{ "$avg": "$reviews.rating" }, 1] },
        } },
    ])
}

pub async fn add_review(
    db: &MongoDB,
    user: &Claims,
    id: &ObjectId,
    request: ReviewRequest,
) -> AppResult<ProductResponse> {
    request.validate()?;

    let product = find_product(db, id).await?;
    if !product.is_active {
        return Err(AppError::not_found("Product not found"));
    }
    if product.reviews.iter().any(|r| r.user_id == user.sub) {
        return Err(AppError::Conflict("You have already reviewed this product".into()));
    }

    let review = Review {
        id: new_sub_id(),
        user_id: user.sub.clone(),
        user_name: user.name.clone().unwrap_or_else(|| "Customer".to_string()),
        rating: request.rating,
        comment: request.comment.trim().to_string(),
        created_at: now(),
    };

    // One review per user, even when two requests race
    let product = db
        .collection::<Product>(PRODUCTS)
        .find_one_and_update(
            doc! { "_id": id, "is_active": true, "reviews.user_id": { "$ne": &user.sub } },
            review_pipeline(&review)?,
        )
        .return_document(ReturnDocument::After)
        .await?
        .ok_or_else(|| AppError::Conflict("You have already reviewed this product".into()))?;

    Ok(ProductResponse::from(product))
}

pub async fn low_stock_products(db: &MongoDB) -> AppResult<Vec<ProductSummary>> {
    let products: Vec<Product> = db
        .collection::<Product>(PRODUCTS)
        .find(doc! { "is_active": true, "total_stock": { "$lte": LOW_STOCK_THRESHOLD } })
        .sort(doc! { "total_stock": 1 })
        .limit(20)
        .await?
        .try_collect()
        .await?;

    Ok(products.iter().map(ProductSummary::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product::fixtures::product;

    #[test]
    fn test_filter_defaults_to_active_only() {
        let filter = build_filter(&ProductQuery::default());
        assert_eq!(filter, doc! { "is_active": true });
    }

    #[test]
    fn test_filter_combines_criteria() {
        let query = ProductQuery {
            category: Some("sarees".into()),
            search: Some("silk (pure)".into()),
            min_price: Some(500.0),
            max_price: Some(2000.0),
            featured: Some(true),
            in_stock: Some(true),
            ..Default::default()
        };
        let filter = build_filter(&query);

        assert_eq!(filter.get_str("category").unwrap(), "sarees");
        assert_eq!(filter.get_document("price").unwrap(), &doc! { "$gte": 500.0, "$lte": 2000.0 });
        assert_eq!(filter.get_bool("is_featured").unwrap(), true);
        assert_eq!(filter.get_document("total_stock").unwrap(), &doc! { "$gt": 0 });

        let or = filter.get_array("$or").unwrap();
        assert_eq!(or.len(), 4);
        let name_clause = or[0].as_document().unwrap().get_document("name").unwrap();
        assert_eq!(name_clause.get_str("$regex").unwrap(), r"silk \(pure\)");
    }

    #[test]
    fn test_sort_options() {
        assert_eq!(sort_for(None), doc! { "created_at": -1, "_id": -1 });
        assert_eq!(sort_for(Some("price_asc")), doc! { "price": 1, "_id": 1 });
        assert_eq!(sort_for(Some("bogus")), doc! { "created_at": -1, "_id": -1 });
    }

    #[test]
    fn test_mrp_must_not_be_below_price() {
        assert!(check_prices(500.0, Some(400.0)).is_err());
        assert!(check_prices(500.0, Some(500.0)).is_ok());
        assert!(check_prices(500.0, None).is_ok());
    }

    #[test]
    fn test_update_fields_only_touch_requested_fields() {
        let set = update_fields(
            UpdateProductRequest {
                description: Some("$5 off this week".into()),
                category: Some(" T-Shirts ".into()),
                ..Default::default()
            },
            42,
        )
        .unwrap();

        assert_eq!(set.get_document("category").unwrap(), &doc! { "$literal": "t-shirts" });
        assert_eq!(set.get_document("description").unwrap(), &doc! { "$literal": "$5 off this week" });
        assert_eq!(set.get_document("updated_at").unwrap(), &doc! { "$literal": 42_i64 });
        assert!(!set.contains_key("stock"));
        assert!(!set.contains_key("sizes"));
        assert!(!set.contains_key("total_stock"));
    }

    #[test]
    fn test_update_fields_with_sizes() {
        let set = update_fields(
            UpdateProductRequest {
                sizes: Some(vec![ProductSize { size: "S".into(), stock: 4 }]),
                brand: Some("  ".into()),
                ..Default::default()
            },
            1,
        )
        .unwrap();
        assert!(set.contains_key("sizes"));
        assert_eq!(set.get_document("brand").unwrap(), &doc! { "$literal": Bson::Null });
    }

    #[test]
    fn test_stock_totals_stage_reads_stored_values() {
        let stage = stock_totals_stage();
        let total = stage.get_document("$set").unwrap().get_document("total_stock").unwrap();
        let branches = total.get_array("$cond").unwrap();
        assert_eq!(branches[1], Bson::Document(doc! { "$sum": "$sizes.stock" }));
    }

    #[test]
    fn test_size_stock_update_is_positional() {
        let tee = product("Tee", 499.0, 0, &[("M", 5)]);
        let id = tee.id.unwrap();

        let (filter, update) = size_stock_update(&id, &tee, &ProductSize { size: "m".into(), stock: 9 });
        assert_eq!(filter, doc! { "_id": id, "sizes.size": "M" });
        assert_eq!(update, doc! { "$set": { "sizes.$.stock": 9_i64 } });

        let (filter, update) = size_stock_update(&id, &tee, &ProductSize { size: "XL".into(), stock: 2 });
        assert_eq!(filter, doc! { "_id": id, "sizes.size": { "$ne": "XL" } });
        assert_eq!(update, doc! { "$push": { "sizes": { "size": "XL", "stock": 2_i64 } } });
    }

    #[test]
    fn test_review_pipeline_appends_literal_review() {
        let review = Review {
            id: "r1".into(),
            user_id: "u1".into(),
            user_name: "Asha".into(),
            rating: 4,
            comment: "$$ worth it".into(),
            created_at: 1,
        };
        let pipeline = review_pipeline(&review).unwrap();
        assert_eq!(pipeline.len(), 2);

        let appended = pipeline[0]
            .get_document("$set")
            .unwrap()
            .get_document("reviews")
            .unwrap()
            .get_array("$concatArrays")
            .unwrap();
        let literal = appended[1].as_array().unwrap()[0].as_document().unwrap();
        assert_eq!(
            literal.get_document("$literal").unwrap().get_str("comment").unwrap(),
            "$$ worth it"
        );

        let totals = pipeline[1].get_document("$set").unwrap();
        assert!(totals.contains_key("rating"));
        assert_eq!(totals.get_document("num_reviews").unwrap(), &doc! { "$size": "$reviews" });
    }

    fn claims(sub: &str) -> Claims {
        Claims {
            sub: sub.to_string(),
            email: format!("{}@example.com", sub),
            name: Some(sub.to_string()),
            roles: vec!["customer".into()],
            typ: "access".into(),
            iat: 0,
            exp: usize::MAX,
            jti: new_sub_id(),
            aud: "test".into(),
            iss: "test".into(),
        }
    }

    async fn insert(db: &MongoDB, product: &Product) -> ObjectId {
        db.collection::<Product>(PRODUCTS).insert_one(product).await.unwrap();
        product.id.unwrap()
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB"]
    async fn test_update_product_keeps_concurrent_reservation() {
        let db = crate::database::test_db().await;
        let id = insert(&db, &product("Kurta", 899.0, 0, &[("M", 5)])).await;

        // stock taken by a checkout after the admin form was loaded
        db.collection::<Product>(PRODUCTS)
            .update_one(
                doc! { "_id": id, "sizes": { "$elemMatch": { "size": "M", "stock": { "$gte": 2 } } } },
                doc! { "$inc": { "sizes.$.stock": -2, "total_stock": -2 } },
            )
            .await
            .unwrap();

        let updated = update_product(
            &db,
            &id,
            UpdateProductRequest { description: Some("Handloom cotton".into()), ..Default::default() },
        )
        .await
        .unwrap();

        assert_eq!(updated.total_stock, 3);
        let stored = find_product(&db, &id).await.unwrap();
        assert_eq!(stored.sizes[0].stock, 3);
        assert_eq!(stored.description, "Handloom cotton");
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB"]
    async fn test_update_stock_leaves_unlisted_sizes() {
        let db = crate::database::test_db().await;
        let id = insert(&db, &product("Tee", 499.0, 0, &[("S", 2), ("M", 5)])).await;

        let updated = update_stock(
            &db,
            &id,
            UpdateStockRequest { stock: None, sizes: Some(vec![ProductSize { size: "s".into(), stock: 10 }]) },
        )
        .await
        .unwrap();

        assert_eq!(updated.total_stock, 15);
        let stored = find_product(&db, &id).await.unwrap();
        assert_eq!(stored.available(Some("M")), Some(5));
        assert_eq!(stored.available(Some("S")), Some(10));
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB"]
    async fn test_concurrent_reviews_are_all_kept() {
        let db = crate::database::test_db().await;
        let id = insert(&db, &product("Saree", 2499.0, 3, &[])).await;

        let (alice, bob) = (claims("alice"), claims("bob"));
        let review = |rating| ReviewRequest { rating, comment: "Lovely".into() };
        let (a, b) = tokio::join!(
            add_review(&db, &alice, &id, review(5)),
            add_review(&db, &bob, &id, review(4))
        );
        a.unwrap();
        b.unwrap();

        let stored = find_product(&db, &id).await.unwrap();
        assert_eq!(stored.num_reviews, 2);
        assert_eq!(stored.rating, 4.5);

        let again = add_review(&db, &alice, &id, review(1)).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[test]
    fn test_create_request_validation() {
        let request: CreateProductRequest = serde_json::from_value(serde_json::json!({
            "name": "X",
            "description": "",
            "price": 0.0,
            "category": "",
            "sizes": [{ "size": "", "stock": 1 }]
        }))
        .unwrap();
        let err: AppError = request.validate().unwrap_err().into();
        match err {
            AppError::Validation(errors) => {
                assert!(errors.iter().any(|e| e.starts_with("name:")));
                assert!(errors.iter().any(|e| e.starts_with("price:")));
                assert!(errors.iter().any(|e| e.starts_with("sizes[0].size:")));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
