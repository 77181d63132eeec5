//! Configuration management

use serde::{Deserialize, Serialize};

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default Mongo host for the Record Store.
pub const DEFAULT_MONGO_HOST: &str = "127.0.0.1";

/// Default Mongo port.
pub const DEFAULT_MONGO_PORT: u16 = 27017;

/// Default Mongo database name.
pub const DEFAULT_MONGO_DB: &str = "healthbridge";

/// Default sqlite path for the Job Catalog.
pub const DEFAULT_CATALOG_PATH: &str = "healthbridge.sqlite";

/// Default maximum catalog connections in the pool.
pub const DEFAULT_CATALOG_MAX_CONNECTIONS: u32 = 10;

/// Default minimum catalog connections in the pool.
pub const DEFAULT_CATALOG_MIN_CONNECTIONS: u32 = 1;

/// Default catalog connection timeout in seconds.
pub const DEFAULT_CATALOG_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default catalog idle timeout in seconds (10 minutes).
pub const DEFAULT_CATALOG_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Default mapping engine LLM model name, used only for log/metadata tagging.
pub const DEFAULT_LLM_MODEL_NAME: &str = "none";

/// Top-level configuration assembled from environment variables and defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub catalog: CatalogConfig,
    pub record_store: RecordStoreConfig,
    pub mapping: MappingConfig,
    pub cors: CorsConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Job Catalog configuration. The catalog is a local sqlite database holding
/// `MappingJob`, `IngestionJob`, and `ConceptApproval` rows — the system's
/// durable state is not large enough to justify a server-mode database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub path: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// Record Store configuration (MongoDB, holding staging/FHIR/OMOP documents).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordStoreConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl RecordStoreConfig {
    pub fn connection_uri(&self) -> String {
        format!("mongodb://{}:{}", self.host, self.port)
    }
}

/// AI Mapping Engine configuration: whether to call out to an embedding
/// service and/or a reasoning LLM, and where to find them. Both are optional;
/// when unset the engine falls back to lexical-only scoring (degraded mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    pub use_sbert_embeddings: bool,
    pub embedding_url: Option<String>,
    pub llm_url: Option<String>,
    pub llm_model_name: String,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: std::env::var("HOST").unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: std::env::var("PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: std::env::var("SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            },
            catalog: CatalogConfig {
                path: std::env::var("DATABASE_PATH")
                    .unwrap_or_else(|_| DEFAULT_CATALOG_PATH.to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_CATALOG_MAX_CONNECTIONS),
                min_connections: std::env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_CATALOG_MIN_CONNECTIONS),
                connect_timeout_secs: std::env::var("DATABASE_CONNECT_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_CATALOG_CONNECT_TIMEOUT_SECS),
                idle_timeout_secs: std::env::var("DATABASE_IDLE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_CATALOG_IDLE_TIMEOUT_SECS),
            },
            record_store: RecordStoreConfig {
                host: std::env::var("MONGO_HOST").unwrap_or_else(|_| DEFAULT_MONGO_HOST.to_string()),
                port: std::env::var("MONGO_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_MONGO_PORT),
                database: std::env::var("MONGO_DB").unwrap_or_else(|_| DEFAULT_MONGO_DB.to_string()),
            },
            mapping: MappingConfig {
                use_sbert_embeddings: std::env::var("USE_SBERT_EMBEDDINGS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(false),
                embedding_url: std::env::var("EMBEDDING_URL").ok(),
                llm_url: std::env::var("LLM_URL").ok(),
                llm_model_name: std::env::var("LLM_MODEL_NAME")
                    .unwrap_or_else(|_| DEFAULT_LLM_MODEL_NAME.to_string()),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
                allow_credentials: std::env::var("CORS_ALLOW_CREDENTIALS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.catalog.path.is_empty() {
            anyhow::bail!("Job catalog database path cannot be empty");
        }

        if self.catalog.max_connections == 0 {
            anyhow::bail!("Catalog max_connections must be greater than 0");
        }

        if self.catalog.min_connections > self.catalog.max_connections {
            anyhow::bail!(
                "Catalog min_connections ({}) cannot be greater than max_connections ({})",
                self.catalog.min_connections,
                self.catalog.max_connections
            );
        }

        if self.record_store.database.is_empty() {
            anyhow::bail!("Record store database name cannot be empty");
        }

        if self.mapping.use_sbert_embeddings && self.mapping.embedding_url.is_none() {
            anyhow::bail!("USE_SBERT_EMBEDDINGS is set but EMBEDDING_URL is missing");
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            catalog: CatalogConfig {
                path: DEFAULT_CATALOG_PATH.to_string(),
                max_connections: DEFAULT_CATALOG_MAX_CONNECTIONS,
                min_connections: DEFAULT_CATALOG_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_CATALOG_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: DEFAULT_CATALOG_IDLE_TIMEOUT_SECS,
            },
            record_store: RecordStoreConfig {
                host: DEFAULT_MONGO_HOST.to_string(),
                port: DEFAULT_MONGO_PORT,
                database: DEFAULT_MONGO_DB.to_string(),
            },
            mapping: MappingConfig {
                use_sbert_embeddings: false,
                embedding_url: None,
                llm_url: None,
                llm_model_name: DEFAULT_LLM_MODEL_NAME.to_string(),
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: true,
            },
        }
    }
}
