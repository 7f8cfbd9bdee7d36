//! End-to-end exercises of the wired pipeline against the in-memory stub
//! collaborators, covering the seed scenarios of a single root with no
//! dependencies, a root with a satisfiable transitive dependency, an
//! artifact-index cache hit short-circuiting the finder and downloader, and
//! a bare URL requirement routing straight to the downloader.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use spindle_index::{Artifact, ArtifactIndex, IndexKey, InMemoryIndex};
use spindle_pipeline::env::Env;
use spindle_pipeline::pipeline::wire;
use spindle_pipeline::stub::{StubBuilder, StubEnvironment, StubIndex, StubMetadataReader, StubRemoteServer, StubTransport};
use spindle_pipeline::{StageError, Transport};
use spindle_requirement::Requirement;
use url::Url;

fn new_env(
    index: StubIndex,
    metadata: StubMetadataReader,
    artifact_index: InMemoryIndex,
) -> (Arc<Env>, Arc<StubEnvironment>) {
    let environment = Arc::new(StubEnvironment::new());
    let env = Env::new(
        Arc::new(index),
        Arc::new(StubTransport::new()),
        Arc::new(StubBuilder::new()),
        Arc::new(metadata),
        Arc::clone(&environment) as Arc<dyn spindle_pipeline::Environment>,
        Arc::new(StubRemoteServer::new()),
        Arc::new(artifact_index),
        2,
    );
    let env = Arc::new(env);
    wire(&env);
    (env, environment)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_root_with_no_dependencies_builds_and_installs() {
    let index = StubIndex::new().with("flask", "https://example.com/flask-1.0.tar.gz");
    let metadata = StubMetadataReader::new();
    let (env, environment) = new_env(index, metadata, InMemoryIndex::new());

    let root = Requirement::parse("flask").unwrap();
    let retrieve = env.retrieve_and_build(vec![root]).await;

    assert_eq!(retrieve.built, 1);
    assert!(retrieve.failed.is_empty());

    let plan = env.load_installer().await;
    assert_eq!(plan.targets.len(), 1);
    assert!(plan.conflicts.is_empty());

    let install_failures = env.install(&plan).await;
    assert!(install_failures.is_empty());
    assert_eq!(environment.installed().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn root_with_satisfiable_dependency_builds_both() {
    let index = StubIndex::new()
        .with("sure", "https://example.com/sure-1.0.tar.gz")
        .with("forbiddenfruit", "https://example.com/forbiddenfruit-0.1.5.tar.gz");
    let metadata = StubMetadataReader::new().with("sure-1.0.whl", vec![Requirement::parse("forbiddenfruit").unwrap()]);
    let (env, _environment) = new_env(index, metadata, InMemoryIndex::new());

    let root = Requirement::parse("sure").unwrap();
    let retrieve = env.retrieve_and_build(vec![root]).await;

    assert_eq!(retrieve.built, 2);
    assert!(retrieve.failed.is_empty());

    let plan = env.load_installer().await;
    assert_eq!(plan.targets.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cache_hit_skips_finder_and_downloader() {
    let requirement = Requirement::parse("curdling").unwrap();
    let artifact_index = InMemoryIndex::new();
    artifact_index.put(IndexKey::wheel(requirement.clone()), "cache/curdling-0.1.0.whl".to_string());

    // No finder/transport entry for "curdling" at all: if the pipeline
    // routed through the finder instead of the cache, this would fail.
    let index = StubIndex::new();
    let metadata = StubMetadataReader::new();
    let (env, _environment) = new_env(index, metadata, artifact_index);

    let retrieve = env.retrieve_and_build(vec![requirement]).await;

    assert_eq!(retrieve.built, 1);
    assert!(retrieve.failed.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn source_cache_hit_skips_finder_and_downloader_but_still_builds() {
    let requirement = Requirement::parse("curdling").unwrap();
    let artifact_index = InMemoryIndex::new();
    artifact_index.put(
        IndexKey::source(requirement.clone()),
        "cache/curdling-0.1.0.tar.gz".to_string(),
    );

    // No finder/transport entry at all: a cached source must route straight
    // to the builder, never touching the finder or downloader.
    let index = StubIndex::new();
    let metadata = StubMetadataReader::new();
    let (env, _environment) = new_env(index, metadata, artifact_index);

    let retrieve = env.retrieve_and_build(vec![requirement]).await;

    assert_eq!(retrieve.built, 1);
    assert!(retrieve.failed.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn bare_url_requirement_routes_straight_to_downloader() {
    // No finder entry configured; a URL requirement must never consult it.
    let index = StubIndex::new();
    let metadata = StubMetadataReader::new();
    let (env, _environment) = new_env(index, metadata, InMemoryIndex::new());

    let requirement = Requirement::parse("https://example.com/extra-2.0.tar.gz").unwrap();
    let retrieve = env.retrieve_and_build(vec![requirement]).await;

    assert_eq!(retrieve.built, 1);
    assert!(retrieve.failed.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn blacklisted_root_is_dropped_without_building() {
    let index = StubIndex::new().with("setuptools", "https://example.com/setuptools-1.0.tar.gz");
    let metadata = StubMetadataReader::new();
    let (env, _environment) = new_env(index, metadata, InMemoryIndex::new());

    let requirement = Requirement::parse("setuptools").unwrap();
    let retrieve = env.retrieve_and_build(vec![requirement]).await;

    assert_eq!(retrieve.built, 0);
    assert!(retrieve.failed.is_empty());
}

/// A `Transport` that sleeps before serving one configured basename, long
/// enough for a second job resolving to the same basename to reach the
/// uniqueness guard while the first is still "downloading".
struct SlowTransport {
    slow_basename: String,
    delay: Duration,
}

#[async_trait]
impl Transport for SlowTransport {
    async fn fetch(&self, url: &Url) -> Result<Artifact, StageError> {
        let basename = url.path_segments().and_then(Iterator::last).unwrap_or_default();
        if basename == self.slow_basename {
            tokio::time::sleep(self.delay).await;
        }
        Ok(Artifact::Source(std::path::PathBuf::from(basename)))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn second_job_sharing_a_basename_is_dropped_and_counted_as_repeated() {
    let index = StubIndex::new()
        .with("pkg-a", "https://mirror-one.example/shared-1.0.tar.gz")
        .with("pkg-b", "https://mirror-two.example/shared-1.0.tar.gz");
    let metadata = StubMetadataReader::new();
    let environment = Arc::new(StubEnvironment::new());
    let env = Env::new(
        Arc::new(index),
        Arc::new(SlowTransport {
            slow_basename: "shared-1.0.tar.gz".to_string(),
            delay: Duration::from_millis(300),
        }),
        Arc::new(StubBuilder::new()),
        Arc::new(metadata),
        Arc::clone(&environment) as Arc<dyn spindle_pipeline::Environment>,
        Arc::new(StubRemoteServer::new()),
        Arc::new(InMemoryIndex::new()),
        4,
    );
    let env = Arc::new(env);
    wire(&env);

    let a = Requirement::parse("pkg-a").unwrap();
    let b = Requirement::parse("pkg-b").unwrap();
    env.feed(a, None).await;
    tokio::time::sleep(Duration::from_millis(60)).await;
    env.feed(b, None).await;

    let retrieve = env.retrieve_and_build(vec![]).await;

    // Exactly one of the two basename-sharing requirements is built; the
    // other is dropped by the uniqueness guard and counted as `repeated`,
    // and termination still completes without waiting on it.
    assert_eq!(retrieve.built, 1);
    assert_eq!(retrieve.repeated, 1);
    assert!(retrieve.failed.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unresolvable_requirement_is_reported_as_a_failure() {
    let index = StubIndex::new();
    let metadata = StubMetadataReader::new();
    let (env, _environment) = new_env(index, metadata, InMemoryIndex::new());

    let requirement = Requirement::parse("missing").unwrap();
    let retrieve = env.retrieve_and_build(vec![requirement.clone()]).await;

    assert_eq!(retrieve.built, 0);
    assert_eq!(retrieve.failed.len(), 1);
    assert_eq!(retrieve.failed[0].requirement, requirement);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn a_failed_root_suppresses_the_install_phase_even_when_a_sibling_built() {
    let index = StubIndex::new().with("flask", "https://example.com/flask-1.0.tar.gz");
    let metadata = StubMetadataReader::new();
    let (env, environment) = new_env(index, metadata, InMemoryIndex::new());

    let built_root = Requirement::parse("flask").unwrap();
    let missing_root = Requirement::parse("missing").unwrap();
    let report = env.run(vec![built_root, missing_root], false).await;

    assert_eq!(report.built, 1);
    assert_eq!(report.retrieve_failures.len(), 1);
    assert!(report.install_failures.is_empty());
    assert!(environment.installed().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn a_version_conflict_suppresses_the_install_phase_even_when_a_sibling_built() {
    // Root `a` depends on `b (==1.0)` and `b (==2.0)`; both build (they're
    // distinct requirements, so neither is deduplicated at `feed`), but no
    // single `b` version satisfies both predicates. `a` itself has nothing
    // to conflict over and builds cleanly.
    let index = StubIndex::new()
        .with("a", "https://example.com/a-1.0.tar.gz")
        .with("b (==1.0)", "https://example.com/b-1.0.tar.gz")
        .with("b (==2.0)", "https://example.com/b-2.0.tar.gz");
    let metadata = StubMetadataReader::new().with(
        "a-1.0.whl",
        vec![Requirement::parse("b (==1.0)").unwrap(), Requirement::parse("b (==2.0)").unwrap()],
    );
    let (env, environment) = new_env(index, metadata, InMemoryIndex::new());

    let root = Requirement::parse("a").unwrap();
    let report = env.run(vec![root], false).await;

    assert_eq!(report.built, 3);
    assert!(report.retrieve_failures.is_empty());
    assert_eq!(report.conflicts.len(), 1);
    assert!(report.install_failures.is_empty());
    assert!(environment.installed().is_empty());
}
