//! The catalog repository.
//!
//! [`CatalogRepository`] owns the three catalog collections and keeps the
//! [`SourceRegistry`] in step with them:
//!
//! - **internal** catalogs are fixed at construction and registered by [`init`]
//! - **installed** catalogs change through [`install_catalog`], [`update_catalog`] and
//!   [`uninstall_catalog`]
//! - **remote** catalogs come from the [`CatalogApi`], with a [`CatalogCache`] fallback
//!
//! Each collection is published through a `tokio::sync::watch` channel: a new subscriber
//! sees the current value right away, then every later change.
//!
//! Operations on one package are serialized; operations on different packages run
//! independently. Changes to the installed collection and the registry are applied
//! together under a single lock.
//!
//! [`init`]: CatalogRepository::init
//! [`install_catalog`]: CatalogRepository::install_catalog
//! [`update_catalog`]: CatalogRepository::update_catalog
//! [`uninstall_catalog`]: CatalogRepository::uninstall_catalog

use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedMutexGuard, watch};
use tracing::{debug, error, info, warn};

use super::api::{CatalogApi, RemoteIndexApi};
use super::cache::CatalogCache;
use super::installer::{FsPackageInstaller, PackageInstaller, PendingPackage, PreparedPackage};
use super::loader::{CatalogLoader, SourceFactory};
use super::model::{
    Catalog, CatalogInstalled, CatalogInternal, CatalogLocal, CatalogRemote, InstallStep,
};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::source::SourceRegistry;

/// Progress of an install, see [`InstallStep`].
pub type InstallSteps = BoxStream<'static, InstallStep>;

/// Default bound on each of the download and install phases.
pub const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// Default minimum delay between two non-forced index fetches.
pub const DEFAULT_REMOTE_CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Filters for [`CatalogRepository::catalog_listing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingOptions {
    /// Leave out remote catalogs whose package is already installed
    pub exclude_remote_installed: bool,
    /// Include remote catalogs flagged as NSFW
    pub with_nsfw: bool,
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            exclude_remote_installed: false,
            with_nsfw: true,
        }
    }
}

/// Catalogs to show to a user.
#[derive(Debug, Clone)]
pub struct CatalogListing {
    /// Internal catalogs first, then installed ones
    pub local: Vec<CatalogLocal>,
    pub remote: Vec<CatalogRemote>,
}

impl CatalogListing {
    /// Flattens the listing into one list, local catalogs first.
    pub fn into_catalogs(self) -> Vec<Catalog> {
        self.local
            .into_iter()
            .map(Catalog::from)
            .chain(self.remote.into_iter().map(Catalog::from))
            .collect()
    }
}

struct CatalogState {
    internal: watch::Sender<Vec<CatalogInternal>>,
    installed: watch::Sender<Vec<CatalogInstalled>>,
    remote: watch::Sender<Vec<CatalogRemote>>,
    /// Held while the installed collection and the registry change together
    commit: Mutex<()>,
    package_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    refresh: tokio::sync::Mutex<()>,
    last_api_check: Mutex<Option<Instant>>,
}

/// Tracks internal, installed and remote catalogs.
///
/// Cloning is cheap and every clone shares the same state.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use futures::StreamExt;
/// use hondana::prelude::*;
/// use hondana::catalog::{CatalogRepository, PackageManifest};
///
/// #[tokio::main]
/// async fn main() -> hondana::Result<()> {
///     let config = Config::load("hondana.json")?;
///     let registry = Arc::new(SourceRegistry::new());
///     let factory = |_: &PackageManifest| -> hondana::Result<Arc<dyn Source>> {
///         Err(hondana::Error::Other("no source plugins linked".into()))
///     };
///
///     let catalogs = CatalogRepository::from_config(&config, registry, Vec::new(), Arc::new(factory));
///     catalogs.init().await;
///
///     if let Some(remote) = catalogs.remote_catalogs().into_iter().next() {
///         let mut steps = catalogs.install_catalog(remote);
///         while let Some(step) = steps.next().await {
///             println!("{:?}", step);
///         }
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct CatalogRepository {
    sources: Arc<SourceRegistry>,
    installer: Arc<dyn PackageInstaller>,
    api: Arc<dyn CatalogApi>,
    cache: CatalogCache,
    state: Arc<CatalogState>,
    install_timeout: Duration,
    remote_check_interval: Duration,
}

impl CatalogRepository {
    pub fn new(
        sources: Arc<SourceRegistry>,
        internal: Vec<CatalogInternal>,
        installer: Arc<dyn PackageInstaller>,
        api: Arc<dyn CatalogApi>,
        cache: CatalogCache,
    ) -> Self {
        let state = CatalogState {
            internal: watch::Sender::new(internal),
            installed: watch::Sender::new(Vec::new()),
            remote: watch::Sender::new(Vec::new()),
            commit: Mutex::new(()),
            package_locks: Mutex::new(HashMap::new()),
            refresh: tokio::sync::Mutex::new(()),
            last_api_check: Mutex::new(None),
        };

        Self {
            sources,
            installer,
            api,
            cache,
            state: Arc::new(state),
            install_timeout: DEFAULT_INSTALL_TIMEOUT,
            remote_check_interval: DEFAULT_REMOTE_CHECK_INTERVAL,
        }
    }

    /// Builds a repository backed by the filesystem installer and the remote index
    /// described by `config`.
    ///
    /// With `include_test_source` set (and the `test-source` feature enabled) the bundled
    /// [`TestSource`](crate::sources::TestSource) is added to `internal`.
    pub fn from_config(
        config: &Config,
        sources: Arc<SourceRegistry>,
        internal: Vec<CatalogInternal>,
        factory: Arc<dyn SourceFactory>,
    ) -> Self {
        #[cfg(feature = "test-source")]
        let internal = {
            let mut internal = internal;
            if config.include_test_source {
                let mut test = CatalogInternal::new(Arc::new(crate::sources::TestSource::new()));
                test.description = "Source used for testing".to_string();
                internal.push(test);
            }
            internal
        };

        let loader = CatalogLoader::new(&config.packages_dir, factory)
            .with_lib_versions(config.lib_version_min, config.lib_version_max);
        let cache = config
            .cache_path
            .clone()
            .map(CatalogCache::new)
            .unwrap_or_default();

        Self::new(
            sources,
            internal,
            Arc::new(FsPackageInstaller::new(loader)),
            Arc::new(RemoteIndexApi::new(config.repo_url.clone())),
            cache,
        )
        .with_install_timeout(config.install_timeout())
        .with_remote_check_interval(config.remote_check_interval())
    }

    pub fn with_install_timeout(mut self, timeout: Duration) -> Self {
        self.install_timeout = timeout;
        self
    }

    pub fn with_remote_check_interval(mut self, interval: Duration) -> Self {
        self.remote_check_interval = interval;
        self
    }

    pub fn sources(&self) -> &Arc<SourceRegistry> {
        &self.sources
    }

    /// Registers internal sources, loads installed packages and the remote index.
    ///
    /// Packages that fail to load, or whose source id is already taken, are logged and
    /// skipped. The remote index is first read from the cache, then refreshed without
    /// forcing; a failed refresh keeps the cached copy.
    pub async fn init(&self) {
        for catalog in self.state.internal.borrow().iter() {
            self.sources.register_source(catalog.source.clone(), false);
        }

        let cached = self.cache.load().await;
        debug!(count = cached.len(), "Loaded cached remote catalogs");
        self.publish_remote(cached);

        let loaded = match self.installer.load_installed().await {
            Ok(loaded) => loaded,
            Err(e) => {
                error!(error = %e, "Failed to load installed catalogs");
                Vec::new()
            }
        };

        {
            let _commit = self.state.commit.lock();
            let remotes = self.state.remote.borrow().clone();
            let mut installed: Vec<CatalogInstalled> = Vec::with_capacity(loaded.len());

            for result in loaded {
                let catalog = match result {
                    Ok(catalog) => catalog,
                    Err(e) => {
                        error!(error = %e, "Skipping catalog that failed to load");
                        continue;
                    }
                };
                if let Err(e) = self.check_source_free(&catalog, &installed) {
                    error!(error = %e, "Skipping catalog");
                    continue;
                }
                self.sources.register_source(catalog.source.clone(), false);
                installed.push(catalog.with_update_check(&remotes));
            }

            info!(count = installed.len(), "Loaded installed catalogs");
            self.state.installed.send_replace(installed);
        }

        if let Err(e) = self.refresh_remote_catalogs(false).await {
            warn!(error = %e, "Initial catalog refresh failed");
        }
    }

    pub fn subscribe_internal(&self) -> watch::Receiver<Vec<CatalogInternal>> {
        self.state.internal.subscribe()
    }

    pub fn subscribe_installed(&self) -> watch::Receiver<Vec<CatalogInstalled>> {
        self.state.installed.subscribe()
    }

    pub fn subscribe_remote(&self) -> watch::Receiver<Vec<CatalogRemote>> {
        self.state.remote.subscribe()
    }

    pub fn internal_catalogs(&self) -> Vec<CatalogInternal> {
        self.state.internal.borrow().clone()
    }

    pub fn installed_catalogs(&self) -> Vec<CatalogInstalled> {
        self.state.installed.borrow().clone()
    }

    pub fn remote_catalogs(&self) -> Vec<CatalogRemote> {
        self.state.remote.borrow().clone()
    }

    /// Returns the installed catalog of package `pkg_name`.
    pub fn installed_catalog(&self, pkg_name: &str) -> Option<CatalogInstalled> {
        self.state
            .installed
            .borrow()
            .iter()
            .find(|c| c.pkg_name == pkg_name)
            .cloned()
    }

    /// Returns the remote catalog of package `pkg_name`.
    pub fn remote_catalog(&self, pkg_name: &str) -> Option<CatalogRemote> {
        self.state
            .remote
            .borrow()
            .iter()
            .find(|c| c.pkg_name == pkg_name)
            .cloned()
    }

    /// Returns the local catalog providing `source_id`.
    ///
    /// Internal catalogs win over installed ones.
    pub fn get(&self, source_id: i64) -> Option<CatalogLocal> {
        if let Some(internal) = self
            .state
            .internal
            .borrow()
            .iter()
            .find(|c| c.source_id() == source_id)
        {
            return Some(CatalogLocal::Internal(internal.clone()));
        }

        self.state
            .installed
            .borrow()
            .iter()
            .find(|c| c.source_id() == source_id)
            .cloned()
            .map(CatalogLocal::Installed)
    }

    /// Returns local and remote catalogs filtered by `options`.
    pub fn catalog_listing(&self, options: &ListingOptions) -> CatalogListing {
        let installed = self.installed_catalogs();

        let mut local: Vec<CatalogLocal> = self
            .internal_catalogs()
            .into_iter()
            .map(CatalogLocal::Internal)
            .collect();
        local.extend(installed.iter().cloned().map(CatalogLocal::Installed));

        let remote = self
            .remote_catalogs()
            .into_iter()
            .filter(|r| options.with_nsfw || !r.nsfw)
            .filter(|r| {
                !options.exclude_remote_installed
                    || !installed.iter().any(|i| i.pkg_name == r.pkg_name)
            })
            .collect();

        CatalogListing { local, remote }
    }

    /// Fetches the remote index.
    ///
    /// Without `force` the fetch is skipped when the previous one started less than the
    /// check interval ago, and a failure only logs a warning, keeping the current
    /// catalogs. With `force` the index is always fetched and failures are returned.
    ///
    /// A successful fetch replaces the cache and the remote collection, and recomputes
    /// `has_update` on installed catalogs.
    pub async fn refresh_remote_catalogs(&self, force: bool) -> Result<()> {
        let _refresh = self.state.refresh.lock().await;

        {
            let mut last = self.state.last_api_check.lock();
            if !force
                && last.is_some_and(|checked| checked.elapsed() < self.remote_check_interval)
            {
                debug!("Catalog index checked recently, skipping refresh");
                return Ok(());
            }
            *last = Some(Instant::now());
        }

        match self.api.find_catalogs().await {
            Ok(catalogs) => {
                if let Err(e) = self.cache.store(&catalogs).await {
                    warn!(error = %e, "Failed to store catalog cache");
                }
                info!(count = catalogs.len(), "Refreshed remote catalogs");
                self.publish_remote(catalogs);
                Ok(())
            }
            Err(e) if force => Err(e),
            Err(e) => {
                warn!(error = %e, "Catalog refresh failed, keeping cached catalogs");
                Ok(())
            }
        }
    }

    fn publish_remote(&self, catalogs: Vec<CatalogRemote>) {
        let _commit = self.state.commit.lock();
        self.state.installed.send_if_modified(|installed| {
            let mut changed = false;
            for catalog in installed.iter_mut() {
                let checked = catalog.with_update_check(&catalogs);
                if checked.has_update != catalog.has_update {
                    *catalog = checked;
                    changed = true;
                }
            }
            changed
        });
        self.state.remote.send_replace(catalogs);
    }

    /// Installs the package of `catalog`.
    ///
    /// The returned stream is lazy: nothing happens until it is polled. It yields
    /// `Pending`, `Downloading` and `Installing`, then ends with `Installed` or with an
    /// `Error` describing the failure. Dropping it before `Installed` leaves the
    /// installed catalogs and the registry as they were and discards downloaded data.
    ///
    /// A catalog of the same package that is already installed is replaced.
    pub fn install_catalog(&self, catalog: CatalogRemote) -> InstallSteps {
        let task = InstallTask {
            repo: self.clone(),
            catalog,
            stage: Stage::Start,
            guard: None,
        };
        stream::unfold(task, |task| task.advance()).boxed()
    }

    /// Installs the remote version of `catalog`.
    ///
    /// Ends with an `Error` step when the remote index doesn't list the package.
    pub fn update_catalog(&self, catalog: &CatalogInstalled) -> InstallSteps {
        let repo = self.clone();
        let pkg_name = catalog.pkg_name.clone();

        stream::once(async move {
            match repo.remote_catalog(&pkg_name) {
                Some(remote) => repo.install_catalog(remote),
                None => stream::iter([InstallStep::Error(format!(
                    "No remote catalog found for {}",
                    pkg_name
                ))])
                .boxed(),
            }
        })
        .flatten()
        .boxed()
    }

    /// Removes an installed catalog and unregisters its source.
    ///
    /// Waits for any other operation on the same package first.
    ///
    /// # Errors
    ///
    /// * [`Error::NotFound`] - If the package is not installed
    /// * [`Error::UninstallRejected`] - If the installer declined or failed; nothing changed
    pub async fn uninstall_catalog(&self, catalog: &CatalogInstalled) -> Result<()> {
        let pkg_name = catalog.pkg_name.as_str();
        let lock = self.package_lock(pkg_name);
        let _guard = lock.lock().await;

        let current = self
            .installed_catalog(pkg_name)
            .ok_or_else(|| Error::not_found(format!("installed catalog {}", pkg_name)))?;

        self.installer
            .uninstall(pkg_name)
            .await
            .map_err(|e| match e {
                Error::UninstallRejected { .. } => e,
                other => Error::uninstall_rejected(pkg_name, other.to_string()),
            })?;

        {
            let _commit = self.state.commit.lock();
            self.sources.unregister_source(current.source.as_ref());
            self.state
                .installed
                .send_modify(|installed| installed.retain(|c| c.pkg_name != pkg_name));
        }

        info!(pkg = %pkg_name, "Uninstalled catalog");
        Ok(())
    }

    fn package_lock(&self, pkg_name: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.state
            .package_locks
            .lock()
            .entry(pkg_name.to_string())
            .or_default()
            .clone()
    }

    /// Fails if another catalog already provides the source of `catalog`.
    ///
    /// An installed catalog of the same package doesn't count: it is about to be replaced.
    fn check_source_free(
        &self,
        catalog: &CatalogInstalled,
        installed: &[CatalogInstalled],
    ) -> Result<()> {
        self.check_source_id_free(catalog.source_id(), &catalog.pkg_name, installed)
    }

    fn check_source_id_free(
        &self,
        source_id: i64,
        pkg_name: &str,
        installed: &[CatalogInstalled],
    ) -> Result<()> {
        if let Some(internal) = self
            .state
            .internal
            .borrow()
            .iter()
            .find(|c| c.source_id() == source_id)
        {
            return Err(Error::install(
                pkg_name,
                format!("source {} is provided by {}", source_id, internal.name),
            ));
        }

        if let Some(other) = installed
            .iter()
            .find(|c| c.source_id() == source_id && c.pkg_name != pkg_name)
        {
            return Err(Error::install(
                pkg_name,
                format!("source {} is provided by {}", source_id, other.pkg_name),
            ));
        }

        Ok(())
    }

    /// Installs `package`, adding or replacing it in the installed collection and the
    /// registry.
    ///
    /// The source check runs before the installer persists anything, so a rejected
    /// package leaves both the installed packages and this state as they were.
    fn commit_installed(&self, package: PreparedPackage) -> Result<()> {
        let _commit = self.state.commit.lock();
        let mut installed = self.state.installed.borrow().clone();
        self.check_source_free(&package.catalog, &installed)?;

        let catalog = self
            .installer
            .persist(package)?
            .with_update_check(&self.state.remote.borrow());
        match installed.iter().position(|c| c.pkg_name == catalog.pkg_name) {
            Some(index) => {
                let previous = std::mem::replace(&mut installed[index], catalog.clone());
                self.sources.unregister_source(previous.source.as_ref());
                info!(pkg = %catalog.pkg_name, from = %previous.version_name, to = %catalog.version_name, "Updated catalog");
            }
            None => {
                info!(pkg = %catalog.pkg_name, version = %catalog.version_name, "Installed catalog");
                installed.push(catalog.clone());
            }
        }

        self.sources.register_source(catalog.source.clone(), true);
        self.state.installed.send_replace(installed);
        Ok(())
    }
}

enum Stage {
    Start,
    Lock,
    Download,
    Install(PendingPackage),
    Done,
}

/// State of one install stream.
///
/// Holds the package lock from the download until the terminal step. Dropping it drops
/// any downloaded package.
struct InstallTask {
    repo: CatalogRepository,
    catalog: CatalogRemote,
    stage: Stage,
    guard: Option<OwnedMutexGuard<()>>,
}

impl InstallTask {
    async fn advance(mut self) -> Option<(InstallStep, Self)> {
        let step = match std::mem::replace(&mut self.stage, Stage::Done) {
            Stage::Start => {
                self.stage = Stage::Lock;
                InstallStep::Pending
            }
            Stage::Lock => {
                let lock = self.repo.package_lock(&self.catalog.pkg_name);
                self.guard = Some(lock.lock_owned().await);

                let installed = self.repo.installed_catalogs();
                match self.repo.check_source_id_free(
                    self.catalog.source_id,
                    &self.catalog.pkg_name,
                    &installed,
                ) {
                    Ok(()) => {
                        self.stage = Stage::Download;
                        InstallStep::Downloading
                    }
                    Err(e) => self.fail(e),
                }
            }
            Stage::Download => match self.download().await {
                Ok(package) => {
                    self.stage = Stage::Install(package);
                    InstallStep::Installing
                }
                Err(e) => self.fail(e),
            },
            Stage::Install(package) => match self.install(package).await {
                Ok(()) => {
                    self.guard = None;
                    InstallStep::Installed
                }
                Err(e) => self.fail(e),
            },
            Stage::Done => return None,
        };

        debug!(pkg = %self.catalog.pkg_name, step = ?step, "Install step");
        Some((step, self))
    }

    async fn download(&self) -> Result<PendingPackage> {
        let pkg_name = &self.catalog.pkg_name;
        tokio::time::timeout(
            self.repo.install_timeout,
            self.repo.installer.download(&self.catalog),
        )
        .await
        .map_err(|_| Error::install(pkg_name, "download timed out"))?
    }

    async fn install(&self, package: PendingPackage) -> Result<()> {
        let pkg_name = self.catalog.pkg_name.as_str();
        let prepared = tokio::time::timeout(
            self.repo.install_timeout,
            self.repo.installer.prepare(package),
        )
        .await
        .map_err(|_| Error::install(pkg_name, "installation timed out"))??;

        self.repo.commit_installed(prepared)
    }

    /// Ends the stream with an error step.
    fn fail(&mut self, error: Error) -> InstallStep {
        warn!(pkg = %self.catalog.pkg_name, error = %error, "Catalog installation failed");
        self.stage = Stage::Done;
        self.guard = None;
        InstallStep::Error(error.to_string())
    }
}
