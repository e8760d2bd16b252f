use std::env;

lazy_static::lazy_static! {
    static ref SETTINGS: Settings = Settings::from_env();
}

/// Process-wide settings, read from the environment on first use.
pub fn settings() -> &'static Settings {
    &SETTINGS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseProvider {
    MongoDb,
    /// Azure Cosmos DB through its MongoDB-compatible API
    CosmosDb,
}

impl DatabaseProvider {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "mongodb" | "mongo" | "" => DatabaseProvider::MongoDb,
            "cosmos" | "cosmosdb" | "azure" => DatabaseProvider::CosmosDb,
            other => {
                log::warn!("⚠️  Unknown DB_PROVIDER '{}', falling back to mongodb", other);
                DatabaseProvider::MongoDb
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageProvider {
    Local,
    Azure,
}

impl StorageProvider {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "local" | "" => StorageProvider::Local,
            "azure" | "blob" => StorageProvider::Azure,
            other => {
                log::warn!("⚠️  Unknown STORAGE_PROVIDER '{}', falling back to local", other);
                StorageProvider::Local
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_name: Option<String>,
    pub db_provider: DatabaseProvider,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub jwt_expires_hours: i64,
    pub refresh_expires_days: i64,
    pub cors_origins: Vec<String>,
    pub storage_provider: StorageProvider,
    pub upload_dir: String,
    pub azure_storage_account: Option<String>,
    pub azure_storage_container: String,
    pub azure_storage_sas_token: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub admin_name: String,
    pub store_name: String,
    pub store_gstin: Option<String>,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn var_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("⚠️  Invalid value for {}: '{}', using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let cors_origins = var_or("CORS_ORIGINS", "http://localhost:3000,http://127.0.0.1:3000")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            host: var_or("HOST", "0.0.0.0"),
            port: var_parse("PORT", 5000),
            database_url: var_or("DATABASE_URL", "mongodb://localhost:27017/storefront"),
            database_name: var_opt("DB_NAME"),
            db_provider: DatabaseProvider::parse(&var_or("DB_PROVIDER", "mongodb")),
            jwt_secret: var_or("JWT_SECRET", "default-secret-change-me"),
            jwt_issuer: var_or("JWT_ISSUER", "storefront-api"),
            jwt_audience: var_or("JWT_AUDIENCE", "storefront-web"),
            jwt_expires_hours: var_parse("JWT_EXPIRES_HOURS", 24 * 7),
            refresh_expires_days: var_parse("REFRESH_EXPIRES_DAYS", 30),
            cors_origins,
            storage_provider: StorageProvider::parse(&var_or("STORAGE_PROVIDER", "local")),
            upload_dir: var_or("UPLOAD_DIR", "uploads"),
            azure_storage_account: var_opt("AZURE_STORAGE_ACCOUNT"),
            azure_storage_container: var_or("AZURE_STORAGE_CONTAINER", "product-images"),
            azure_storage_sas_token: var_opt("AZURE_STORAGE_SAS_TOKEN"),
            admin_email: var_opt("ADMIN_EMAIL"),
            admin_password: var_opt("ADMIN_PASSWORD"),
            admin_name: var_or("ADMIN_NAME", "Store Admin"),
            store_name: var_or("STORE_NAME", "Storefront"),
            store_gstin: var_opt("STORE_GSTIN"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_provider_parse() {
        assert_eq!(DatabaseProvider::parse("MongoDB"), DatabaseProvider::MongoDb);
        assert_eq!(DatabaseProvider::parse(" cosmos "), DatabaseProvider::CosmosDb);
        assert_eq!(DatabaseProvider::parse("azure"), DatabaseProvider::CosmosDb);
        assert_eq!(DatabaseProvider::parse("postgres"), DatabaseProvider::MongoDb);
    }

    #[test]
    fn test_storage_provider_parse() {
        assert_eq!(StorageProvider::parse("AZURE"), StorageProvider::Azure);
        assert_eq!(StorageProvider::parse(""), StorageProvider::Local);
        assert_eq!(StorageProvider::parse("s3"), StorageProvider::Local);
    }
}
