//! Tracks in-flight download basenames so the Finder-to-Downloader edge can
//! drop a second job resolving to the same tarball while the first is still
//! downloading. A dropped job's requirement stays in `Env`'s admitted set
//! but never reaches `built`/`failed`; the caller must count it under
//! `Env`'s `repeated` counter so termination detection still sees it as
//! settled. Keyed on URL basename rather than a content hash — see
//! `DESIGN.md` for the tradeoff.

use std::collections::HashSet;

use tokio::sync::Mutex;

use crate::job::Job;

#[derive(Default)]
pub(crate) struct UniquenessGuard {
    in_flight: Mutex<HashSet<String>>,
}

impl UniquenessGuard {
    fn basename_of(job: &Job) -> Option<String> {
        job.url.as_ref().and_then(|u| u.path_segments()).and_then(Iterator::last).map(ToString::to_string)
    }

    /// Records `job`'s basename as in flight. Returns `false` if another
    /// job for the same basename is already in flight — the caller must
    /// drop `job` rather than queue it to the Downloader.
    pub async fn admit(&self, job: &Job) -> bool {
        let Some(basename) = Self::basename_of(job) else {
            return true;
        };
        self.in_flight.lock().await.insert(basename)
    }

    pub async fn release(&self, job: &Job) {
        if let Some(basename) = Self::basename_of(job) {
            self.in_flight.lock().await.remove(&basename);
        }
    }
}
