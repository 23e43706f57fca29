use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Endpoint settings for the object store holding file bytes.
#[derive(Debug, Clone)]
pub struct ObjectStoreConfig {
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub bucket: String,
    pub region: String,
}

/// Model endpoints. An unset URL disables the adapter that uses it.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub vision_url: Option<String>,
    pub vision_model: String,
    pub embed_url: Option<String>,
    pub embed_model: String,
    pub llm_url: Option<String>,
    pub llm_model: String,
    pub transcribe_url: Option<String>,
    pub extractor_url: Option<String>,
    pub vector_index_url: Option<String>,
    /// Time budget for a single adapter call
    pub timeout: Duration,
}

/// Worker pool and queue tuning.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of concurrent workers (default: 10)
    pub worker_count: usize,
    /// Bound of the in-memory job channel (default: 1000)
    pub queue_capacity: usize,
    /// Overflow pump tick (default: 10 s)
    pub pump_interval: Duration,
    /// Retries per job before the file is failed (default: 3)
    pub max_retries: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_count: 10,
            queue_capacity: 1000,
            pump_interval: Duration::from_secs(10),
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SecurityConfig {
    /// HS256 secret for bearer tokens. Auth is disabled when unset.
    pub jwt_secret: Option<String>,
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub redis_url: Option<String>,
    pub object_store: ObjectStoreConfig,
    pub models: ModelConfig,
    pub pipeline: PipelineConfig,
    pub security: SecurityConfig,
    pub shutdown_grace: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = get("API_PORT").ok_or(ConfigError::Missing("API_PORT"))?;
        let port = parse_value("API_PORT", &port)?;

        let database_url = match get("POSTGRES_URL") {
            Some(url) => url,
            None => postgres_url_from_parts(&get)?,
        };

        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            worker_count: parse_or("WORKER_COUNT", get("WORKER_COUNT"), defaults.worker_count)?,
            queue_capacity: parse_or(
                "QUEUE_CAPACITY",
                get("QUEUE_CAPACITY"),
                defaults.queue_capacity,
            )?,
            pump_interval: Duration::from_secs(parse_or(
                "PUMP_INTERVAL_SECS",
                get("PUMP_INTERVAL_SECS"),
                defaults.pump_interval.as_secs(),
            )?),
            max_retries: parse_or("JOB_MAX_RETRIES", get("JOB_MAX_RETRIES"), defaults.max_retries)?,
        };
        if pipeline.worker_count == 0 {
            return Err(ConfigError::Invalid {
                name: "WORKER_COUNT",
                value: "0".to_string(),
            });
        }
        if pipeline.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                name: "QUEUE_CAPACITY",
                value: "0".to_string(),
            });
        }

        let vision_url = get("VISION_MODEL_URL");
        let models = ModelConfig {
            llm_url: get("LLM_URL").or_else(|| vision_url.clone()),
            vision_url,
            vision_model: get("VISION_MODEL").unwrap_or_else(|| "llava".to_string()),
            embed_url: get("EMBED_MODEL_URL"),
            embed_model: get("EMBED_MODEL").unwrap_or_else(|| "nomic-embed-text".to_string()),
            llm_model: get("LLM_MODEL").unwrap_or_else(|| "llama3.2".to_string()),
            transcribe_url: get("TRANSCRIBE_MODEL_URL"),
            extractor_url: get("EXTRACTOR_URL"),
            vector_index_url: get("VECTOR_INDEX_URL"),
            timeout: Duration::from_secs(parse_or(
                "ADAPTER_TIMEOUT_SECS",
                get("ADAPTER_TIMEOUT_SECS"),
                60,
            )?),
        };

        let object_store = ObjectStoreConfig {
            endpoint: get("OBJECT_STORE_ENDPOINT"),
            access_key: get("OBJECT_STORE_ACCESS_KEY"),
            secret_key: get("OBJECT_STORE_SECRET_KEY"),
            bucket: get("OBJECT_STORE_BUCKET").unwrap_or_else(|| "files".to_string()),
            region: get("OBJECT_STORE_REGION").unwrap_or_else(|| "us-east-1".to_string()),
        };

        let security = SecurityConfig {
            jwt_secret: get("JWT_SECRET"),
            allowed_origins: get("ALLOWED_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty() && o != "*")
                        .collect()
                })
                .unwrap_or_default(),
        };

        Ok(Self {
            port,
            database_url,
            redis_url: get("REDIS_URL"),
            object_store,
            models,
            pipeline,
            security,
            shutdown_grace: Duration::from_secs(parse_or(
                "SHUTDOWN_GRACE_SECS",
                get("SHUTDOWN_GRACE_SECS"),
                10,
            )?),
        })
    }
}

fn postgres_url_from_parts<G>(get: &G) -> Result<String, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let host = get("POSTGRES_HOST").ok_or(ConfigError::Missing("POSTGRES_URL or POSTGRES_HOST"))?;
    let db = get("POSTGRES_DB").ok_or(ConfigError::Missing("POSTGRES_DB"))?;
    let port: u16 = parse_or("POSTGRES_PORT", get("POSTGRES_PORT"), 5432)?;
    let user = get("POSTGRES_USER").unwrap_or_else(|| "postgres".to_string());
    let user = utf8_percent_encode(&user, NON_ALPHANUMERIC).to_string();

    let credentials = match get("POSTGRES_PASSWORD") {
        Some(password) => format!(
            "{}:{}",
            user,
            utf8_percent_encode(&password, NON_ALPHANUMERIC)
        ),
        None => user,
    };

    Ok(format!("postgres://{}@{}:{}/{}", credentials, host, port, db))
}

fn parse_value<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(v) => parse_value(name, &v),
        None => Ok(default),
    }
}
