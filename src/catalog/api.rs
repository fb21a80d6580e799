//! Remote catalog index.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::model::CatalogRemote;
use crate::error::Result;
use crate::net::HttpClient;

/// Default repository the index and packages are served from.
pub const DEFAULT_REPO_URL: &str = "https://tachiyomi.kanade.eu/repo";

/// Lists the catalogs available for installation.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn find_catalogs(&self) -> Result<Vec<CatalogRemote>>;
}

/// One entry of `index.min.json`.
#[derive(Debug, Deserialize)]
struct IndexEntry {
    name: String,
    pkg: String,
    version: String,
    code: i32,
    lang: String,
    apk: String,
    id: i64,
    #[serde(default)]
    description: String,
    #[serde(default)]
    nsfw: Option<bool>,
}

impl IndexEntry {
    fn into_remote(self, repo_url: &str) -> CatalogRemote {
        let icon = self.apk.replace(".apk", ".png");
        CatalogRemote {
            name: self.name,
            description: self.description,
            source_id: self.id,
            pkg_name: self.pkg,
            version_name: self.version,
            version_code: self.code,
            lang: self.lang,
            pkg_url: format!("{}/apk/{}", repo_url, self.apk),
            icon_url: format!("{}/icon/{}", repo_url, icon),
            nsfw: self.nsfw.unwrap_or(false),
        }
    }
}

/// Parses the body of `index.min.json` served from `repo_url`.
pub fn parse_index(body: &[u8], repo_url: &str) -> Result<Vec<CatalogRemote>> {
    let entries: Vec<IndexEntry> = serde_json::from_slice(body)?;
    Ok(entries
        .into_iter()
        .map(|entry| entry.into_remote(repo_url))
        .collect())
}

/// [`CatalogApi`] reading `{repo_url}/index.min.json` over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteIndexApi {
    repo_url: String,
    client: HttpClient,
}

impl RemoteIndexApi {
    pub fn new(repo_url: impl Into<String>) -> Self {
        let repo_url = repo_url.into().trim_end_matches('/').to_string();
        let host = url::Url::parse(&repo_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| repo_url.clone());

        Self {
            client: HttpClient::new(host),
            repo_url,
        }
    }

    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    pub fn index_url(&self) -> String {
        format!("{}/index.min.json", self.repo_url)
    }
}

impl Default for RemoteIndexApi {
    fn default() -> Self {
        Self::new(DEFAULT_REPO_URL)
    }
}

#[async_trait]
impl CatalogApi for RemoteIndexApi {
    async fn find_catalogs(&self) -> Result<Vec<CatalogRemote>> {
        let url = self.index_url();
        let body = self.client.get(&url).await.inspect_err(|e| {
            warn!(url = %url, error = %e, "Failed to fetch catalog index");
        })?;

        let catalogs = parse_index(&body, &self.repo_url)?;
        debug!(count = catalogs.len(), "Fetched catalog index");
        Ok(catalogs)
    }
}
