//! Wires the four retrieve-and-build services into a fixed edge topology:
//! Finder → Downloader → (Builder | direct-to-Dependencer) → Dependencer,
//! with Dependencer feeding back into `Env::feed` for every dependency it
//! discovers, and every stage's failures routed to `Env`'s error table.

use std::sync::Arc;

use crate::env::Env;

/// Start the four retrieve-and-build services and spawn the listener tasks
/// that route jobs between them. Call once per `Env`; `Service::start` is
/// idempotent so re-wiring is harmless but unnecessary.
pub fn wire(env: &Arc<Env>) {
    env.finder.start();
    env.downloader.start();
    env.builder.start();
    env.dependencer.start();

    // Edge 1: Finder.finished -> Downloader.queue, guarded by uniqueness: a
    // second job resolving to a basename another in-flight Downloader job
    // already owns is dropped, not queued, and counted under `repeated`.
    {
        let env = Arc::clone(env);
        let mut finished = env.finder.subscribe_finished();
        tokio::spawn(async move {
            while let Ok(job) = finished.recv().await {
                if env.downloader_guard.admit(&job).await {
                    env.downloader.queue(job);
                } else {
                    env.mark_repeated(job).await;
                }
            }
        });
    }
    {
        let env = Arc::clone(env);
        let mut failed = env.finder.subscribe_failed();
        tokio::spawn(async move {
            while let Ok((job, err)) = failed.recv().await {
                env.mark_failed(job, err).await;
            }
        });
    }

    // Edge 2: Downloader.finished -> Builder.queue if a source archive was
    // fetched, or straight to Dependencer.queue if the URL already pointed
    // at a prebuilt wheel.
    {
        let env = Arc::clone(env);
        let mut finished = env.downloader.subscribe_finished();
        tokio::spawn(async move {
            while let Ok(job) = finished.recv().await {
                env.downloader_guard.release(&job).await;
                if job.wheel.is_some() {
                    env.dependencer.queue(job);
                } else {
                    env.builder.queue(job);
                }
            }
        });
    }
    {
        let env = Arc::clone(env);
        let mut failed = env.downloader.subscribe_failed();
        tokio::spawn(async move {
            while let Ok((job, err)) = failed.recv().await {
                env.downloader_guard.release(&job).await;
                env.mark_failed(job, err).await;
            }
        });
    }

    // Edge 3: Builder.finished -> Dependencer.queue.
    {
        let env = Arc::clone(env);
        let mut finished = env.builder.subscribe_finished();
        tokio::spawn(async move {
            while let Ok(job) = finished.recv().await {
                env.dependencer.queue(job);
            }
        });
    }
    {
        let env = Arc::clone(env);
        let mut failed = env.builder.subscribe_failed();
        tokio::spawn(async move {
            while let Ok((job, err)) = failed.recv().await {
                env.mark_failed(job, err).await;
            }
        });
    }

    // Edge 4: Dependencer.finished -> Env records the built wheel.
    {
        let env = Arc::clone(env);
        let mut finished = env.dependencer.subscribe_finished();
        tokio::spawn(async move {
            while let Ok(job) = finished.recv().await {
                env.mark_built(job).await;
            }
        });
    }
    {
        let env = Arc::clone(env);
        let mut failed = env.dependencer.subscribe_failed();
        tokio::spawn(async move {
            while let Ok((job, err)) = failed.recv().await {
                env.mark_failed(job, err).await;
            }
        });
    }

    // Edge 5 (the feedback edge): Dependencer.dependency_found -> Env::feed,
    // re-entering the pipeline at its head (or the cache short-circuit).
    {
        let env = Arc::clone(env);
        let mut dependency_found = env.dependencer.subscribe_dependency_found();
        tokio::spawn(async move {
            while let Ok(found) = dependency_found.recv().await {
                env.feed(found.child, Some(found.dependency_of)).await;
            }
        });
    }
}
