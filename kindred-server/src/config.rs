use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// In-memory store when unset.
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_database_pool_size")]
    pub database_pool_size: u32,
    /// Rate limiting and the presence mirror are off when unset.
    #[serde(default)]
    pub redis_url: Option<String>,

    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_jwt_access_ttl_secs")]
    pub jwt_access_ttl_secs: i64,
    #[serde(default = "default_jwt_refresh_ttl_secs")]
    pub jwt_refresh_ttl_secs: i64,
    #[serde(default = "default_password_hash_memory_kib")]
    pub password_hash_memory_kib: u32,
    #[serde(default = "default_password_hash_iterations")]
    pub password_hash_iterations: u32,
    /// Comma separated; accounts with these emails are admins.
    #[serde(default)]
    pub admin_emails: String,

    #[serde(default = "default_max_photos")]
    pub max_photos: usize,
    #[serde(default = "default_max_photo_bytes")]
    pub max_photo_bytes: usize,
    #[serde(default)]
    pub s3_endpoint: Option<String>,
    #[serde(default)]
    pub s3_access_key: Option<String>,
    #[serde(default)]
    pub s3_secret_key: Option<String>,
    #[serde(default = "default_s3_bucket")]
    pub s3_bucket: String,
    #[serde(default)]
    pub s3_public_url: Option<String>,

    #[serde(default = "default_hub_queue_capacity")]
    pub hub_queue_capacity: usize,
    #[serde(default = "default_typing_ttl_secs")]
    pub typing_ttl_secs: u64,
    #[serde(default = "default_temp_ban_days")]
    pub default_temp_ban_days: i64,
    #[serde(default = "default_reactivation_sweep_secs")]
    pub reactivation_sweep_secs: u64,

    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u64,
    /// Comma separated; any origin is allowed when empty.
    #[serde(default)]
    pub cors_origins: String,
}

fn default_port() -> u16 { 8080 }
fn default_database_pool_size() -> u32 { 10 }
fn default_jwt_secret() -> String { "development-secret-change-in-production".into() }
fn default_jwt_access_ttl_secs() -> i64 { 3600 }
fn default_jwt_refresh_ttl_secs() -> i64 { 2_592_000 }
fn default_password_hash_memory_kib() -> u32 { 19_456 }
fn default_password_hash_iterations() -> u32 { 2 }
fn default_max_photos() -> usize { 6 }
fn default_max_photo_bytes() -> usize { 8 * 1024 * 1024 }
fn default_s3_bucket() -> String { "kindred-photos".into() }
fn default_hub_queue_capacity() -> usize { 64 }
fn default_typing_ttl_secs() -> u64 { 6 }
fn default_temp_ban_days() -> i64 { 7 }
fn default_reactivation_sweep_secs() -> u64 { 60 }
fn default_rate_limit_per_minute() -> u64 { 120 }

/// Settings for an S3-compatible photo bucket.
#[derive(Debug, Clone)]
pub struct ObjectStoreConfig<'a> {
    pub endpoint: &'a str,
    pub access_key: &'a str,
    pub secret_key: &'a str,
    pub bucket: &'a str,
    pub public_url: &'a str,
}

impl AppConfig {
    /// Reads `KINDRED_*` variables; nested keys use `__`.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("KINDRED")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn admin_emails(&self) -> Vec<String> {
        split_list(&self.admin_emails).map(|e| e.to_lowercase()).collect()
    }

    pub fn cors_origins(&self) -> Vec<String> {
        split_list(&self.cors_origins).map(str::to_string).collect()
    }

    /// `None` unless endpoint and both keys are set.
    pub fn object_store(&self) -> Option<ObjectStoreConfig<'_>> {
        let endpoint = self.s3_endpoint.as_deref()?;
        Some(ObjectStoreConfig {
            endpoint,
            access_key: self.s3_access_key.as_deref()?,
            secret_key: self.s3_secret_key.as_deref()?,
            bucket: &self.s3_bucket,
            public_url: self.s3_public_url.as_deref().unwrap_or(endpoint),
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            database_url: None,
            database_pool_size: default_database_pool_size(),
            redis_url: None,
            jwt_secret: default_jwt_secret(),
            jwt_access_ttl_secs: default_jwt_access_ttl_secs(),
            jwt_refresh_ttl_secs: default_jwt_refresh_ttl_secs(),
            password_hash_memory_kib: default_password_hash_memory_kib(),
            password_hash_iterations: default_password_hash_iterations(),
            admin_emails: String::new(),
            max_photos: default_max_photos(),
            max_photo_bytes: default_max_photo_bytes(),
            s3_endpoint: None,
            s3_access_key: None,
            s3_secret_key: None,
            s3_bucket: default_s3_bucket(),
            s3_public_url: None,
            hub_queue_capacity: default_hub_queue_capacity(),
            typing_ttl_secs: default_typing_ttl_secs(),
            default_temp_ban_days: default_temp_ban_days(),
            reactivation_sweep_secs: default_reactivation_sweep_secs(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
            cors_origins: String::new(),
        }
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}
