use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

pub const DEFAULT_PER_PAGE: u32 = 50;
pub const DEFAULT_MAX_PER_PAGE: u32 = 200;
const DEFAULT_DB_FILE: &str = "bookshelf.db";
const DEFAULT_GOOGLE_BOOKS_URL: &str = "https://www.googleapis.com/books/v1";
const HTTP_TIMEOUT_SECS: u64 = 6;
const HTTP_MAX_RETRIES: u64 = 1;
const HTTP_USER_AGENT: &str = "Bookshelf/0.1";

static METADATA_DEBUG_ENABLED: OnceLock<bool> = OnceLock::new();

/// Runtime settings for the catalog helpers.
///
/// Every field has a compiled-in default; `from_env` lets a deployment
/// override the ones that tend to differ between machines.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub database_path: PathBuf,
    pub default_per_page: u32,
    pub max_per_page: u32,
    pub google_books_url: String,
    pub http_timeout: Duration,
    pub http_max_retries: u64,
    pub user_agent: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DB_FILE),
            default_per_page: DEFAULT_PER_PAGE,
            max_per_page: DEFAULT_MAX_PER_PAGE,
            google_books_url: DEFAULT_GOOGLE_BOOKS_URL.to_string(),
            http_timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
            http_max_retries: HTTP_MAX_RETRIES,
            user_agent: HTTP_USER_AGENT.to_string(),
        }
    }
}

impl CatalogConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(path) = env_string("BOOKSHELF_DB_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Some(per_page) = env_number("BOOKSHELF_PER_PAGE").filter(|value| *value > 0) {
            config.default_per_page = per_page as u32;
        }
        if let Some(max) = env_number("BOOKSHELF_MAX_PER_PAGE").filter(|value| *value > 0) {
            config.max_per_page = max as u32;
        }
        if let Some(url) = env_string("BOOKSHELF_GOOGLE_BOOKS_URL") {
            config.google_books_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = env_number("BOOKSHELF_HTTP_TIMEOUT_SECS").filter(|value| *value > 0) {
            config.http_timeout = Duration::from_secs(secs);
        }
        if config.max_per_page < config.default_per_page {
            log::warn!(
                "max page size {} is below default page size {}, raising it",
                config.max_per_page,
                config.default_per_page
            );
            config.max_per_page = config.default_per_page;
        }
        config
    }
}

pub(crate) fn metadata_debug_enabled() -> bool {
    *METADATA_DEBUG_ENABLED.get_or_init(|| {
        std::env::var("BOOKSHELF_METADATA_DEBUG")
            .map(|value| {
                let lowered = value.trim().to_ascii_lowercase();
                lowered == "1" || lowered == "true" || lowered == "yes" || lowered == "on"
            })
            .unwrap_or(false)
    })
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_number(key: &str) -> Option<u64> {
    let raw = env_string(key)?;
    match raw.parse::<u64>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("ignoring {}={:?}: not a number", key, raw);
            None
        }
    }
}
