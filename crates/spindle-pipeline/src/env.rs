//! `Env`: the shared state table and the four lifecycle phases
//! (`retrieve_and_build`, `load_installer`/`install`, `load_uploader`/
//! `upload`) that drive it.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tokio::sync::{watch, Mutex, Notify};

use spindle_index::{Artifact, ArtifactIndex, IndexKey};
use spindle_mapping::{DataValue, Mapping, MappingError};
use spindle_requirement::{PackageName, Requirement};
use spindle_version::Version;

use crate::collaborators::{Builder, Environment, MetadataReader, RemoteServer, Transport, UpstreamIndex};
use crate::error::StageError;
use crate::guard::UniquenessGuard;
use crate::job::Job;
use crate::service::Service;
use crate::stages::{BuilderStage, DependencerStage, DownloaderStage, FinderStage, InstallerStage, UploaderStage};

/// Packages dropped unconditionally at `feed`, whether filed as a root or
/// discovered as a dependency — bootstrap tooling assumed already present.
pub const DEFAULT_BLACKLIST: &[&str] = &["setuptools"];

/// One requirement that failed somewhere in the pipeline, with enough
/// context to render a "grouped by package, with the requester chain"
/// error report.
#[derive(Debug, Clone)]
pub struct Failure {
    pub requirement: Requirement,
    pub dependency_of: Option<Requirement>,
    pub error: StageError,
}

#[derive(Debug, Clone, Default)]
pub struct Progress {
    pub admitted: usize,
    pub built: usize,
    pub failed: usize,
    pub repeated: u64,
}

pub struct RetrieveReport {
    pub built: usize,
    pub failed: Vec<Failure>,
    pub repeated: u64,
}

pub struct InstallTarget {
    pub requirement: Requirement,
    pub version: Option<Version>,
    pub wheel: PathBuf,
}

pub struct InstallPlan {
    pub targets: Vec<InstallTarget>,
    pub conflicts: Vec<MappingError>,
}

pub struct Report {
    pub built: usize,
    pub repeated: u64,
    pub retrieve_failures: Vec<Failure>,
    pub conflicts: Vec<MappingError>,
    pub install_failures: Vec<Failure>,
    pub upload_failures: Vec<Failure>,
}

#[derive(Default)]
struct EnvState {
    admitted: HashSet<String>,
    packages: HashSet<PackageName>,
    built: FxHashMap<String, (Requirement, Artifact)>,
    failed: FxHashMap<String, Failure>,
    repeated: u64,
    mapping: Mapping,
}

pub struct Env {
    pub(crate) finder: Arc<Service<FinderStage>>,
    pub(crate) downloader: Arc<Service<DownloaderStage>>,
    pub(crate) builder: Arc<Service<BuilderStage>>,
    pub(crate) dependencer: Arc<Service<DependencerStage>>,
    artifact_index: Arc<dyn ArtifactIndex>,
    upstream_index: Arc<dyn UpstreamIndex>,
    environment: Arc<dyn Environment>,
    remote_server: Arc<dyn RemoteServer>,
    blacklist: Vec<String>,
    state: Mutex<EnvState>,
    notify: Notify,
    progress: watch::Sender<Progress>,
    pub(crate) downloader_guard: Arc<UniquenessGuard>,
}

impl Env {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        upstream_index: Arc<dyn UpstreamIndex>,
        transport: Arc<dyn Transport>,
        builder_collaborator: Arc<dyn Builder>,
        metadata_reader: Arc<dyn MetadataReader>,
        environment: Arc<dyn Environment>,
        remote_server: Arc<dyn RemoteServer>,
        artifact_index: Arc<dyn ArtifactIndex>,
        workers: usize,
    ) -> Self {
        let (progress, _) = watch::channel(Progress::default());
        Env {
            finder: Arc::new(Service::new(FinderStage::new(Arc::clone(&upstream_index))).with_workers(workers)),
            downloader: Arc::new(Service::new(DownloaderStage::new(transport)).with_workers(workers)),
            builder: Arc::new(Service::new(BuilderStage::new(builder_collaborator)).with_workers(workers)),
            dependencer: Arc::new(Service::new(DependencerStage::new(metadata_reader)).with_workers(workers)),
            artifact_index,
            upstream_index,
            environment,
            remote_server,
            blacklist: DEFAULT_BLACKLIST.iter().map(ToString::to_string).collect(),
            state: Mutex::new(EnvState::default()),
            notify: Notify::new(),
            progress,
            downloader_guard: Arc::new(UniquenessGuard::default()),
        }
    }

    #[must_use]
    pub fn with_blacklist(mut self, blacklist: Vec<String>) -> Self {
        self.blacklist = blacklist;
        self
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    async fn publish_progress(&self) {
        let state = self.state.lock().await;
        let _ = self.progress.send(Progress {
            admitted: state.admitted.len(),
            built: state.built.len(),
            failed: state.failed.len(),
            repeated: state.repeated,
        });
    }

    /// Four-step admission algorithm: drop blacklisted names, file the
    /// requester relationship regardless of outcome so the `Mapping` can
    /// report a full requester chain even for a dropped or deduplicated
    /// requirement, short-circuit to the Dependencer or Builder on a cache
    /// hit, and otherwise queue to the Finder.
    ///
    /// This is the *only* dedup point for a requirement's normalized text;
    /// it carries no counter of its own, and it is distinct from the
    /// Finder-to-Downloader uniqueness guard, which this function's
    /// URL-requirement branch also applies and which *does* account for its
    /// drops in `EnvState::repeated` since that path admits the requirement
    /// before dropping it.
    pub async fn feed(&self, requirement: Requirement, dependency_of: Option<Requirement>) {
        if requirement
            .package_name()
            .is_some_and(|name| self.blacklist.iter().any(|b| b == name.as_str()))
        {
            tracing::debug!(%requirement, "dropped: blacklisted");
            return;
        }

        let key = requirement.to_string();
        let is_repeat = {
            let mut state = self.state.lock().await;
            state.mapping.file_requirement(requirement.clone(), dependency_of.clone());
            if let Some(name) = requirement.package_name() {
                state.packages.insert(name.clone());
            }
            !state.admitted.insert(key)
        };

        if is_repeat {
            tracing::debug!(%requirement, "dropped: already in the requirement set");
            return;
        }

        self.publish_progress().await;

        let wheel_key = IndexKey::wheel(requirement.clone());
        if let Ok(locator) = self.artifact_index.get(&wheel_key) {
            tracing::debug!(%requirement, "cache hit (wheel), skipping finder, downloader and builder");
            let mut job = Job::new(requirement, dependency_of);
            job.wheel = Some(Artifact::Wheel(PathBuf::from(locator)));
            self.dependencer.queue(job);
            return;
        }

        let source_key = IndexKey::source(requirement.clone());
        if let Ok(locator) = self.artifact_index.get(&source_key) {
            tracing::debug!(%requirement, "cache hit (source), skipping finder and downloader");
            let mut job = Job::new(requirement, dependency_of);
            job.source = Some(Artifact::Source(PathBuf::from(locator)));
            self.builder.queue(job);
            return;
        }

        // URL-form requirements already carry their own location and skip
        // the Finder entirely (`spindle_requirement::Requirement` docs), but
        // still pass through the uniqueness guard the Finder->Downloader
        // edge would otherwise apply — two URL requirements can share a
        // basename just as easily as two Finder-resolved ones.
        if let Requirement::Url(ref located) = requirement {
            let url = located.url.clone();
            let mut job = Job::new(requirement, dependency_of);
            job.url = Some(url);
            if self.downloader_guard.admit(&job).await {
                self.downloader.queue(job);
            } else {
                self.mark_repeated(job).await;
            }
            return;
        }

        self.finder.queue(Job::new(requirement, dependency_of));
    }

    /// A requirement the uniqueness guard dropped at the Finder-to-Downloader
    /// edge. It was already counted in `admitted` by `feed`, so — unlike a
    /// `feed`-level duplicate, which never entered `admitted` at all — it
    /// must be counted here too, or `is_settled` would wait forever for a
    /// job that will never reach `built` or `failed`: this counter
    /// participates in the termination predicate so those requirements
    /// don't block completion.
    pub async fn mark_repeated(&self, job: Job) {
        tracing::debug!(requirement = %job.requirement, "dropped: duplicate download already in flight");
        {
            let mut state = self.state.lock().await;
            state.repeated += 1;
        }
        self.publish_progress().await;
        self.notify.notify_waiters();
    }

    pub async fn mark_built(&self, job: Job) {
        let Some(wheel) = job.wheel.clone() else {
            return;
        };
        let key = job.requirement.to_string();
        {
            let mut state = self.state.lock().await;
            state.mapping.set_data(
                &job.requirement,
                "wheel",
                DataValue::Wheel(wheel.path().display().to_string()),
            );
            if let Some(version) = infer_version_from_wheel(&wheel) {
                state.mapping.set_data(&job.requirement, "version", DataValue::Version(version));
            }
            state.built.insert(key, (job.requirement, wheel));
        }
        self.publish_progress().await;
        self.notify.notify_waiters();
    }

    pub async fn mark_failed(&self, job: Job, error: StageError) {
        let key = job.requirement.to_string();
        {
            let mut state = self.state.lock().await;
            state
                .mapping
                .set_data(&job.requirement, "exception", DataValue::Exception(error.to_string()));
            state.failed.insert(
                key,
                Failure {
                    requirement: job.requirement,
                    dependency_of: job.dependency_of,
                    error,
                },
            );
        }
        self.publish_progress().await;
        self.notify.notify_waiters();
    }

    async fn is_settled(&self) -> bool {
        let state = self.state.lock().await;
        state.admitted.len() == state.built.len() + state.failed.len() + state.repeated as usize
    }

    /// Feed every root requirement, then block until the working set has
    /// stopped growing: `|admitted| == |built| + |failed| + |repeated|`.
    /// The uniqueness guard's drops get their own counter rather than
    /// inflating `built`, so the equation adds a third term. Woken by
    /// [`Notify`] on every state mutation, with a 1s poll as a fallback in
    /// case a wakeup races a mutation it should have observed.
    pub async fn retrieve_and_build(&self, roots: Vec<Requirement>) -> RetrieveReport {
        for root in roots {
            self.feed(root, None).await;
        }

        loop {
            if self.is_settled().await {
                // A feedback-edge `feed()` call triggered by the very last
                // `dependency_found` event may still be in flight between
                // the broadcast send and this check; confirm settlement
                // survives a short debounce before declaring done.
                tokio::time::sleep(std::time::Duration::from_millis(25)).await;
                if self.is_settled().await {
                    break;
                }
                continue;
            }
            let notified = self.notify.notified();
            tokio::select! {
                () = notified => {}
                () = tokio::time::sleep(std::time::Duration::from_secs(1)) => {}
            }
        }

        let state = self.state.lock().await;
        RetrieveReport {
            built: state.built.len(),
            failed: state.failed.values().cloned().collect(),
            repeated: state.repeated,
        }
    }

    /// A non-blocking read of current progress, for a caller that can't wait
    /// on [`Env::retrieve_and_build`] to settle — e.g. a CLI printing what
    /// was built so far after a user interrupt.
    pub async fn snapshot(&self) -> RetrieveReport {
        let state = self.state.lock().await;
        RetrieveReport {
            built: state.built.len(),
            failed: state.failed.values().cloned().collect(),
            repeated: state.repeated,
        }
    }

    /// Reconcile one version per package name seen during retrieval, plus
    /// every successfully built URL-form requirement (which has no package
    /// name to reconcile against).
    pub async fn load_installer(&self) -> InstallPlan {
        let state = self.state.lock().await;
        let mut targets = Vec::new();
        let mut conflicts = Vec::new();

        for name in &state.packages {
            match state.mapping.best_version(name) {
                Ok((version, requirement)) => {
                    if let Some(path) = state.mapping.get_data(&requirement, "wheel").and_then(DataValue::as_wheel) {
                        targets.push(InstallTarget {
                            requirement,
                            version: Some(version),
                            wheel: PathBuf::from(path),
                        });
                    }
                }
                Err(err) => conflicts.push(err),
            }
        }

        for (requirement, wheel) in state.built.values() {
            if requirement.package_name().is_none() {
                targets.push(InstallTarget {
                    requirement: requirement.clone(),
                    version: None,
                    wheel: wheel.path().to_path_buf(),
                });
            }
        }

        InstallPlan { targets, conflicts }
    }

    /// Install every target in `plan` through a dedicated `InstallerStage`
    /// worker pool, draining its failures rather than its successes.
    pub async fn install(&self, plan: &InstallPlan) -> Vec<Failure> {
        if plan.targets.is_empty() {
            return Vec::new();
        }

        let service = Arc::new(Service::new(InstallerStage::new(Arc::clone(&self.environment))).with_workers(4));
        let mut failed = service.subscribe_failed();
        service.start();

        for target in &plan.targets {
            let mut job = Job::new(target.requirement.clone(), None);
            job.wheel = Some(Artifact::Wheel(target.wheel.clone()));
            service.queue(job);
        }

        drain_failures(&service, &mut failed, plan.targets.len() as u64).await
    }

    /// Upload every built wheel whose package name an upstream index
    /// reported as needing an update, one `UploaderStage` job per
    /// `(wheel, server)` pair.
    pub async fn upload(&self, plan: &InstallPlan) -> Vec<Failure> {
        let targets_by_server = self.upstream_index.servers_to_update();
        if targets_by_server.is_empty() {
            return Vec::new();
        }

        let service = Arc::new(Service::new(UploaderStage::new(Arc::clone(&self.remote_server))).with_workers(4));
        let mut failed = service.subscribe_failed();
        service.start();

        let mut queued = 0u64;
        for (server, names) in &targets_by_server {
            for name in names {
                let Some(target) = plan.targets.iter().find(|t| t.requirement.package_name() == Some(name)) else {
                    continue;
                };
                let mut job = Job::new(target.requirement.clone(), None);
                job.wheel = Some(Artifact::Wheel(target.wheel.clone()));
                job.url = Some(server.clone());
                service.queue(job);
                queued += 1;
            }
        }

        drain_failures(&service, &mut failed, queued).await
    }

    /// Run the full lifecycle: retrieve and build every root and its
    /// transitive dependencies, reconcile versions, install the chosen
    /// set, and — if `upload` is set — republish built wheels upstream.
    ///
    /// Only a non-empty error map at the end of retrieve-and-build
    /// suppresses the install phase — a non-empty `retrieve.failed` skips
    /// `install`/`upload` entirely rather than installing whatever subset
    /// did build. A version conflict surfaced by reconciliation is part of
    /// that same error map: `load_installer` can report built packages
    /// alongside conflicts for others, but the install phase does not start
    /// at all when any conflict is present, even for a non-conflicting
    /// sibling that built cleanly.
    pub async fn run(&self, roots: Vec<Requirement>, upload: bool) -> Report {
        let retrieve = self.retrieve_and_build(roots).await;

        if !retrieve.failed.is_empty() {
            return Report {
                built: retrieve.built,
                repeated: retrieve.repeated,
                retrieve_failures: retrieve.failed,
                conflicts: Vec::new(),
                install_failures: Vec::new(),
                upload_failures: Vec::new(),
            };
        }

        let plan = self.load_installer().await;
        if !plan.conflicts.is_empty() {
            return Report {
                built: retrieve.built,
                repeated: retrieve.repeated,
                retrieve_failures: retrieve.failed,
                conflicts: plan.conflicts,
                install_failures: Vec::new(),
                upload_failures: Vec::new(),
            };
        }

        let install_failures = self.install(&plan).await;
        let upload_failures = if upload { self.upload(&plan).await } else { Vec::new() };

        Report {
            built: retrieve.built,
            repeated: retrieve.repeated,
            retrieve_failures: retrieve.failed,
            conflicts: plan.conflicts,
            install_failures,
            upload_failures,
        }
    }
}

async fn drain_failures<S: crate::service::Stage>(
    service: &Arc<Service<S>>,
    failed: &mut tokio::sync::broadcast::Receiver<(Job, StageError)>,
    expected: u64,
) -> Vec<Failure> {
    let mut failures = Vec::new();
    while service.completed() < expected {
        match failed.try_recv() {
            Ok((job, error)) => failures.push(Failure {
                requirement: job.requirement,
                dependency_of: job.dependency_of,
                error,
            }),
            Err(_) => tokio::time::sleep(std::time::Duration::from_millis(10)).await,
        }
    }
    while let Ok((job, error)) = failed.try_recv() {
        failures.push(Failure {
            requirement: job.requirement,
            dependency_of: job.dependency_of,
            error,
        });
    }
    failures
}

fn infer_version_from_wheel(wheel: &Artifact) -> Option<Version> {
    let stem = wheel.path().file_stem()?.to_str()?;
    let mut parts = stem.split('-');
    let _name = parts.next()?;
    let version_part = parts.next()?;
    Version::parse(version_part).ok()
}
