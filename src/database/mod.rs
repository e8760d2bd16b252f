use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};
use std::error::Error;
use std::time::Duration;

use crate::config::{DatabaseProvider, Settings};

pub const USERS: &str = "users";
pub const PRODUCTS: &str = "products";
pub const ORDERS: &str = "orders";
pub const CLIENTS: &str = "clients";
pub const COUNTERS: &str = "counters";

const DEFAULT_DB_NAME: &str = "storefront";

#[derive(Clone)]
pub struct MongoDB {
    client: Client,
    db: Database,
    provider: DatabaseProvider,
}

/// Database name from the path segment of a MongoDB URI, if any.
pub fn database_name_from_uri(uri: &str) -> Option<String> {
    let without_scheme = uri.split("://").nth(1)?;
    let path = without_scheme.split_once('/')?.1;
    let name = path.split('?').next()?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

impl MongoDB {
    pub async fn new(settings: &Settings) -> Result<Self, Box<dyn Error>> {
        let mut client_options = ClientOptions::parse(&settings.database_url).await?;

        client_options.app_name = Some("storefront-api".to_string());
        client_options.connect_timeout = Some(Duration::from_secs(5));
        client_options.server_selection_timeout = Some(Duration::from_secs(5));
        client_options.max_idle_time = Some(Duration::from_secs(300));

        match settings.db_provider {
            DatabaseProvider::MongoDb => {
                client_options.max_pool_size = Some(20);
                client_options.min_pool_size = Some(5);
            }
            DatabaseProvider::CosmosDb => {
                // Cosmos' MongoDB API rejects retryable writes
                client_options.retry_writes = Some(false);
                client_options.max_pool_size = Some(10);
                client_options.min_pool_size = Some(1);
            }
        }

        let client = Client::with_options(client_options)?;

        let db_name = settings
            .database_name
            .clone()
            .or_else(|| database_name_from_uri(&settings.database_url))
            .unwrap_or_else(|| DEFAULT_DB_NAME.to_string());

        let db = client.database(&db_name);

        let mongodb = Self {
            client,
            db,
            provider: settings.db_provider,
        };

        mongodb.ping().await?;
        log::info!("📊 Using database '{}' ({:?})", db_name, settings.db_provider);

        mongodb.ensure_indexes().await;

        Ok(mongodb)
    }

    /// Creates the indexes the query paths rely on. Failures are not fatal.
    async fn ensure_indexes(&self) {
        log::info!("🔧 Creating database indexes...");

        let unique = IndexOptions::builder().unique(true).build();
        let unique_sparse = IndexOptions::builder().unique(true).sparse(true).build();

        let indexes: Vec<(&str, Document, Option<IndexOptions>)> = vec![
            (USERS, doc! { "email": 1 }, Some(unique.clone())),
            (PRODUCTS, doc! { "category": 1 }, None),
            (PRODUCTS, doc! { "is_active": 1, "is_featured": 1 }, None),
            (PRODUCTS, doc! { "sku": 1 }, Some(unique_sparse)),
            (ORDERS, doc! { "user": 1, "created_at": -1 }, None),
            (ORDERS, doc! { "order_number": 1 }, Some(unique)),
            (CLIENTS, doc! { "is_active": 1, "display_order": 1 }, None),
        ];

        for (collection, keys, options) in indexes {
            let label = format!("{}({})", collection, keys.keys().cloned().collect::<Vec<_>>().join(", "));
            let model = IndexModel::builder().keys(keys).options(options).build();

            match self.collection::<Document>(collection).create_index(model).await {
                Ok(_) => log::info!("   ✅ Index ready: {}", label),
                Err(e) => log::debug!("   ℹ️  Index {} skipped: {}", label, e),
            }
        }

        log::info!("✅ Database indexes ready");
    }

    pub async fn ping(&self) -> Result<(), mongodb::error::Error> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    /// Atomically increments and returns the named counter.
    pub async fn next_sequence(&self, name: &str) -> Result<i64, mongodb::error::Error> {
        let counters = self.collection::<Document>(COUNTERS);
        let updated = counters
            .find_one_and_update(doc! { "_id": name }, doc! { "$inc": { "seq": 1_i64 } })
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?;

        Ok(updated
            .and_then(|d| d.get("seq").and_then(|v| v.as_i64().or_else(|| v.as_i32().map(i64::from))))
            .unwrap_or(1))
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn provider(&self) -> DatabaseProvider {
        self.provider
    }
}

/// Connection to a throwaway database for `#[ignore]`d integration tests.
#[cfg(test)]
pub(crate) async fn test_db() -> MongoDB {
    dotenv::dotenv().ok();
    let mut settings = Settings::from_env();
    settings.database_name = Some("storefront_test".to_string());
    MongoDB::new(&settings).await.expect("MongoDB for integration tests")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_name_from_uri() {
        assert_eq!(
            database_name_from_uri("mongodb://localhost:27017/shop").as_deref(),
            Some("shop")
        );
        assert_eq!(
            database_name_from_uri("mongodb://u:p@acct.mongo.cosmos.azure.com:10255/store?ssl=true&replicaSet=globaldb").as_deref(),
            Some("store")
        );
        assert_eq!(database_name_from_uri("mongodb://localhost:27017/"), None);
        assert_eq!(database_name_from_uri("mongodb://localhost:27017"), None);
        assert_eq!(database_name_from_uri("mongodb://localhost:27017/?ssl=true"), None);
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_mongodb_connection_and_sequence() {
        dotenv::dotenv().ok();
        let settings = Settings::from_env();

        let db = MongoDB::new(&settings).await.expect("connect");
        let first = db.next_sequence("test-sequence").await.unwrap();
        let second = db.next_sequence("test-sequence").await.unwrap();
        assert_eq!(second, first + 1);
    }
}
