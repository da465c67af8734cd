use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::store::{MemoryJobStore, UploadJobStore};
use dashmap::DashMap;
use ingest::IngestFileStager;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Rate limit tracking: API key -> (count, window_start)
    pub rate_limiter: Arc<DashMap<String, (u32, std::time::Instant)>>,

    /// Stages upload bodies into the configured directory
    pub stager: IngestFileStager,

    /// Upload jobs and their ingest tasks
    pub store: Arc<dyn UploadJobStore>,
}

impl ServerState {
    /// Create new server state backed by an in-memory job store
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        Self::with_store(config, Arc::new(MemoryJobStore::new()))
    }

    /// Create server state with a caller-provided job store
    pub fn with_store(config: ServerConfig, store: Arc<dyn UploadJobStore>) -> ServerResult<Self> {
        let stager = IngestFileStager::new(config.staging_config())
            .map_err(|err| ServerError::Config(err.to_string()))?;

        Ok(Self {
            config: Arc::new(config),
            rate_limiter: Arc::new(DashMap::new()),
            stager,
            store,
        })
    }

    /// Check if API key is valid
    pub fn is_valid_api_key(&self, key: &str) -> bool {
        self.config.api_keys.contains(key)
    }

    /// Check rate limit for API key
    pub fn check_rate_limit(&self, key: &str) -> bool {
        let now = std::time::Instant::now();
        let window = std::time::Duration::from_secs(60);
        let limit = self.config.rate_limit_per_minute;

        let mut entry = self.rate_limiter.entry(key.to_string()).or_insert((0, now));
        let (count, window_start) = entry.value_mut();

        // Reset if window has passed
        if now.duration_since(*window_start) > window {
            *count = 0;
            *window_start = now;
        }

        if *count >= limit {
            return false;
        }

        *count += 1;
        true
    }
}
