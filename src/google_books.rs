use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::{metadata_debug_enabled, CatalogConfig};
use crate::error::{CatalogError, Result};
use crate::metadata::Volume;

const SEARCH_MAX_RESULTS: usize = 10;

#[derive(Debug, Deserialize)]
struct VolumeList {
    #[serde(default)]
    items: Vec<Volume>,
}

/// Blocking client for the Google Books volumes API.
pub struct GoogleBooksClient {
    client: Client,
    base_url: String,
    user_agent: String,
    max_retries: u64,
}

impl GoogleBooksClient {
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.http_timeout).build()?;
        Ok(Self {
            client,
            base_url: config.google_books_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            max_retries: config.http_max_retries,
        })
    }

    pub fn fetch_volume(&self, volume_id: &str) -> Result<Volume> {
        let url = format!(
            "{}/volumes/{}",
            self.base_url,
            urlencoding::encode(volume_id)
        );
        let data = self.fetch_json_with_retry(&url)?;
        Ok(Volume::deserialize(&data)?)
    }

    pub fn search(&self, query: &str) -> Result<Vec<Volume>> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Ok(vec![]);
        }
        let url = format!(
            "{}/volumes?q={}&maxResults={}",
            self.base_url,
            urlencoding::encode(trimmed),
            SEARCH_MAX_RESULTS
        );
        let data = self.fetch_json_with_retry(&url)?;
        let list = VolumeList::deserialize(&data)?;
        Ok(list.items)
    }

    fn fetch_json_with_retry(&self, url: &str) -> Result<Value> {
        let debug_enabled = metadata_debug_enabled();
        if debug_enabled {
            log::info!("[metadata-debug] google books http start url={}", url);
        }

        let mut attempt = 0;
        loop {
            let response = self
                .client
                .get(url)
                .header(reqwest::header::ACCEPT, "application/json")
                .header(reqwest::header::USER_AGENT, self.user_agent.as_str())
                .send();

            let response = match response {
                Ok(value) => value,
                Err(err) => {
                    log::warn!(
                        "google books transport error url={} attempt={}: {}",
                        url,
                        attempt + 1,
                        err
                    );
                    if attempt < self.max_retries {
                        std::thread::sleep(Duration::from_millis(350 * (attempt + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Err(err.into());
                }
            };

            let status = response.status();
            if status.is_success() {
                if debug_enabled {
                    log::info!(
                        "[metadata-debug] google books http success url={} status={}",
                        url,
                        status
                    );
                }
                return Ok(response.json::<Value>()?);
            }

            log::warn!(
                "google books http status url={} status={} attempt={}",
                url,
                status,
                attempt + 1
            );

            if (status.as_u16() == 429 || status.is_server_error()) && attempt < self.max_retries {
                let retry_after_ms = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<u64>().ok())
                    .map(|value| value * 1000)
                    .unwrap_or(350 * (attempt + 1));
                std::thread::sleep(Duration::from_millis(retry_after_ms.min(4_000)));
                attempt += 1;
                continue;
            }

            return Err(CatalogError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_list_tolerates_missing_items() {
        let list = VolumeList::deserialize(&serde_json::json!({ "totalItems": 0 })).unwrap();
        assert!(list.items.is_empty());
    }

    #[test]
    fn blank_search_skips_the_network() {
        let config = CatalogConfig {
            google_books_url: "http://127.0.0.1:9".to_string(),
            ..CatalogConfig::default()
        };
        let client = GoogleBooksClient::new(&config).unwrap();
        assert!(client.search("   ").unwrap().is_empty());
    }

    #[test]
    #[ignore = "hits the live Google Books API"]
    fn live_volume_lookup() {
        let volume_id = std::env::var("BOOKSHELF_PROBE_VOLUME")
            .unwrap_or_else(|_| "B1hSG45JCX4C".to_string());
        let client = GoogleBooksClient::new(&CatalogConfig::from_env()).unwrap();
        let volume = client.fetch_volume(&volume_id).unwrap();
        println!(
            "live id={} title={:?} authors={:?}",
            volume.id, volume.volume_info.title, volume.volume_info.authors
        );
        for hit in client.search("dune herbert").unwrap() {
            println!("search hit id={} title={:?}", hit.id, hit.volume_info.title);
        }
    }
}
