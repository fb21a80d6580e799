//! Common test utilities
//!
//! Fakes for the collaborators of the catalog repository and the chapter synchronizer.
// Not every test file uses every helper
#![allow(dead_code)]

use async_trait::async_trait;
use hondana::catalog::{
    CatalogApi, CatalogInstalled, CatalogRemote, PackageInstaller, PendingPackage,
    PreparedPackage,
};
use hondana::chapter::{Chapter, Manga};
use hondana::error::{Error, Result};
use hondana::source::Source;
use hondana::types::{ChapterInfo, MangaInfo};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

static INIT: Once = Once::new();

/// Installs a tracing subscriber once per test binary; filter with `RUST_LOG`.
pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Source serving whatever chapter list the test sets.
pub struct FakeSource {
    id: i64,
    name: String,
    chapters: Mutex<Vec<ChapterInfo>>,
    failing: AtomicBool,
}

impl FakeSource {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            chapters: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_chapters(&self, chapters: Vec<ChapterInfo>) {
        *self.chapters.lock() = chapters;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Source for FakeSource {
    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_manga_details(&self, manga: &MangaInfo) -> Result<MangaInfo> {
        Ok(manga.clone())
    }

    async fn fetch_chapter_list(&self, _manga: &MangaInfo) -> Result<Vec<ChapterInfo>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::source(self.id, "source unavailable"));
        }
        Ok(self.chapters.lock().clone())
    }

    async fn fetch_page_list(&self, _chapter: &ChapterInfo) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

pub fn info(key: &str, name: &str) -> ChapterInfo {
    ChapterInfo {
        key: key.to_string(),
        name: name.to_string(),
        date_upload: 0,
        number: -1.0,
        scanlator: None,
    }
}

pub fn manga(id: i64, source_id: i64) -> Manga {
    Manga {
        id,
        source_id,
        key: format!("/manga/{}", id),
        title: "Some Manga".to_string(),
    }
}

pub fn keys(chapters: &[Chapter]) -> Vec<String> {
    chapters.iter().map(|c| c.key.clone()).collect()
}

pub fn remote(pkg_name: &str, source_id: i64, version_code: i32) -> CatalogRemote {
    CatalogRemote {
        name: pkg_name.to_string(),
        description: String::new(),
        source_id,
        pkg_name: pkg_name.to_string(),
        version_name: format!("1.0.{}", version_code),
        version_code,
        lang: "en".to_string(),
        pkg_url: format!("https://example.com/apk/{}.apk", pkg_name),
        icon_url: format!("https://example.com/icon/{}.png", pkg_name),
        nsfw: false,
    }
}

pub fn installed(pkg_name: &str, source_id: i64, version_code: i32) -> CatalogInstalled {
    CatalogInstalled {
        name: pkg_name.to_string(),
        description: String::new(),
        pkg_name: pkg_name.to_string(),
        version_name: format!("1.0.{}", version_code),
        version_code,
        source: Arc::new(FakeSource::new(source_id, pkg_name)),
        has_update: false,
    }
}

/// Installer keeping "installed" packages in memory.
#[derive(Default)]
pub struct FakeInstaller {
    pub preinstalled: Mutex<Vec<CatalogInstalled>>,
    pub installed: Mutex<HashSet<String>>,
    pub download_delay: Mutex<Option<Duration>>,
    pub fail_download: AtomicBool,
    pub reject_uninstall: AtomicBool,
    pub downloads: AtomicUsize,
    /// Temporary file of the last download
    pub last_download: Mutex<Option<PathBuf>>,
}

impl FakeInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preinstalled(catalogs: Vec<CatalogInstalled>) -> Self {
        let installer = Self::default();
        *installer.installed.lock() = catalogs.iter().map(|c| c.pkg_name.clone()).collect();
        *installer.preinstalled.lock() = catalogs;
        installer
    }

    pub fn is_installed(&self, pkg_name: &str) -> bool {
        self.installed.lock().contains(pkg_name)
    }
}

#[async_trait]
impl PackageInstaller for FakeInstaller {
    async fn load_installed(&self) -> Result<Vec<Result<CatalogInstalled>>> {
        Ok(self.preinstalled.lock().iter().cloned().map(Ok).collect())
    }

    async fn download(&self, catalog: &CatalogRemote) -> Result<PendingPackage> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.download_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_download.load(Ordering::SeqCst) {
            return Err(Error::source("repo", "HTTP 404 Not Found"));
        }

        let file = tempfile::NamedTempFile::new()?;
        *self.last_download.lock() = Some(file.path().to_path_buf());
        Ok(PendingPackage::new(catalog.clone(), file))
    }

    async fn prepare(&self, package: PendingPackage) -> Result<PreparedPackage> {
        let catalog = &package.catalog;
        let installed = CatalogInstalled {
            name: catalog.name.clone(),
            description: catalog.description.clone(),
            pkg_name: catalog.pkg_name.clone(),
            version_name: catalog.version_name.clone(),
            version_code: catalog.version_code,
            source: Arc::new(FakeSource::new(catalog.source_id, &catalog.name)),
            has_update: false,
        };
        Ok(PreparedPackage::new(installed, package.into_file()))
    }

    fn persist(&self, package: PreparedPackage) -> Result<CatalogInstalled> {
        let (catalog, _file) = package.into_parts();
        self.installed.lock().insert(catalog.pkg_name.clone());
        Ok(catalog)
    }

    async fn uninstall(&self, pkg_name: &str) -> Result<()> {
        if self.reject_uninstall.load(Ordering::SeqCst) {
            return Err(Error::uninstall_rejected(pkg_name, "user cancelled"));
        }
        self.installed.lock().remove(pkg_name);
        Ok(())
    }
}

/// Remote index returning a settable list, or failing.
#[derive(Default)]
pub struct FakeApi {
    pub catalogs: Mutex<Vec<CatalogRemote>>,
    pub failing: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeApi {
    pub fn with_catalogs(catalogs: Vec<CatalogRemote>) -> Self {
        let api = Self::default();
        *api.catalogs.lock() = catalogs;
        api
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogApi for FakeApi {
    async fn find_catalogs(&self) -> Result<Vec<CatalogRemote>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::source("repo", "connection refused"));
        }
        Ok(self.catalogs.lock().clone())
    }
}
