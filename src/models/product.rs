use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Product document in the "products" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub description: String,
    pub price: f64,
    /// MRP shown struck through next to the selling price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub colors: Vec<ProductColor>,
    #[serde(default)]
    pub sizes: Vec<ProductSize>,
    /// Aggregate stock, used only when the product has no sizes
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub total_stock: u32,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub num_reviews: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema, validator::Validate)]
pub struct ProductColor {
    #[validate(length(min = 1, max = 30, message = "is required"))]
    pub name: String,
    #[serde(default)]
    pub hex: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema, validator::Validate)]
pub struct ProductSize {
    #[validate(length(min = 1, max = 10, message = "is required"))]
    pub size: String,
    pub stock: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
pub struct Review {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub rating: u8,
    pub comment: String,
    pub created_at: i64,
}

impl Product {
    /// Runs before every write: keeps the derived totals in step with sizes and reviews.
    pub fn refresh_totals(&mut self) {
        self.total_stock = total_stock(&self.sizes, self.stock);
        self.num_reviews = self.reviews.len() as u32;
        self.rating = average_rating(&self.reviews);
    }

    pub fn has_sizes(&self) -> bool {
        !self.sizes.is_empty()
    }

    /// Units available for the given size (or the aggregate when sized stock does not apply).
    pub fn available(&self, size: Option<&str>) -> Option<u32> {
        if self.has_sizes() {
            let size = size?;
            self.sizes.iter().find(|s| s.size.eq_ignore_ascii_case(size)).map(|s| s.stock)
        } else {
            Some(self.stock)
        }
    }

    /// Size label as stored on the product, for a case-insensitive lookup.
    pub fn canonical_size(&self, size: &str) -> Option<&str> {
        self.sizes
            .iter()
            .find(|s| s.size.eq_ignore_ascii_case(size))
            .map(|s| s.size.as_str())
    }

    pub fn primary_image(&self) -> Option<String> {
        self.images.first().cloned()
    }
}

pub fn total_stock(sizes: &[ProductSize], aggregate: u32) -> u32 {
    if sizes.is_empty() {
        aggregate
    } else {
        sizes.iter().map(|s| s.stock).sum()
    }
}

/// Mean review rating rounded to one decimal place.
pub fn average_rating(reviews: &[Review]) -> f64 {
    if reviews.is_empty() {
        return 0.0;
    }
    let sum: u32 = reviews.iter().map(|r| u32::from(r.rating)).sum();
    let mean = f64::from(sum) / reviews.len() as f64;
    (mean * 10.0).round() / 10.0
}

/// API view of a product
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub original_price: Option<f64>,
    pub discount_percent: Option<u32>,
    pub category: String,
    pub brand: Option<String>,
    pub sku: Option<String>,
    pub images: Vec<String>,
    pub colors: Vec<ProductColor>,
    pub sizes: Vec<ProductSize>,
    pub stock: u32,
    pub total_stock: u32,
    pub in_stock: bool,
    pub reviews: Vec<Review>,
    pub rating: f64,
    pub num_reviews: u32,
    pub tags: Vec<String>,
    pub is_featured: bool,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        let discount_percent = p
            .original_price
            .filter(|mrp| *mrp > p.price && *mrp > 0.0)
            .map(|mrp| (((mrp - p.price) / mrp) * 100.0).round() as u32);

        ProductResponse {
            id: p.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: p.name,
            description: p.description,
            price: p.price,
            original_price: p.original_price,
            discount_percent,
            category: p.category,
            brand: p.brand,
            sku: p.sku,
            images: p.images,
            colors: p.colors,
            sizes: p.sizes,
            stock: p.stock,
            in_stock: p.total_stock > 0,
            total_stock: p.total_stock,
            reviews: p.reviews,
            rating: p.rating,
            num_reviews: p.num_reviews,
            tags: p.tags,
            is_featured: p.is_featured,
            is_active: p.is_active,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Compact card used in listings, carts and wishlists
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ProductSummary {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub original_price: Option<f64>,
    pub image: Option<String>,
    pub category: String,
    pub rating: f64,
    pub num_reviews: u32,
    pub total_stock: u32,
    pub is_active: bool,
}

impl From<&Product> for ProductSummary {
    fn from(p: &Product) -> Self {
        ProductSummary {
            id: p.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: p.name.clone(),
            price: p.price,
            original_price: p.original_price,
            image: p.primary_image(),
            category: p.category.clone(),
            rating: p.rating,
            num_reviews: p.num_reviews,
            total_stock: p.total_stock,
            is_active: p.is_active,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::product;
    use super::*;

    fn review(rating: u8) -> Review {
        Review {
            id: "r".into(),
            user_id: "u".into(),
            user_name: "User".into(),
            rating,
            comment: "ok".into(),
            created_at: 0,
        }
    }

    #[test]
    fn test_total_stock_sums_sizes() {
        let p = product("Tee", 499.0, 99, &[("S", 2), ("M", 5), ("L", 0)]);
        assert_eq!(p.total_stock, 7);
    }

    #[test]
    fn test_total_stock_falls_back_to_aggregate() {
        let p = product("Mug", 299.0, 12, &[]);
        assert_eq!(p.total_stock, 12);
    }

    #[test]
    fn test_available_by_size() {
        let p = product("Tee", 499.0, 0, &[("S", 2), ("M", 5)]);
        assert_eq!(p.available(Some("m")), Some(5));
        assert_eq!(p.available(Some("XL")), None);
        assert_eq!(p.available(None), None);
        assert_eq!(p.canonical_size("s"), Some("S"));

        let mug = product("Mug", 299.0, 3, &[]);
        assert_eq!(mug.available(None), Some(3));
        assert_eq!(mug.available(Some("M")), Some(3));
    }

    #[test]
    fn test_rating_recomputed_from_reviews() {
        let mut p = product("Tee", 499.0, 1, &[]);
        p.reviews = vec![review(5), review(4), review(4)];
        p.refresh_totals();
        assert_eq!(p.num_reviews, 3);
        assert_eq!(p.rating, 4.3);
    }

    #[test]
    fn test_discount_percent_in_response() {
        let mut p = product("Tee", 750.0, 1, &[]);
        p.original_price = Some(1000.0);
        let resp = ProductResponse::from(p);
        assert_eq!(resp.discount_percent, Some(25));
        assert!(resp.in_stock);
    }
}
