//! `indicatif`-based progress reporters for the retrieve-and-build phase,
//! driven by `Env::subscribe_progress`'s
//! `update_retrieve_and_build(total, retrieved, built, failed)` signal.

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;

use spindle_pipeline::Progress;

use crate::printer::Printer;

/// Spawn a task that renders `Env`'s progress watch channel as a spinner
/// until the channel closes (i.e. `Env` is dropped). Returns a handle the
/// caller should `.await` after the retrieve-and-build phase completes, so
/// the bar gets a chance to render its final state before being cleared.
pub fn spawn(mut updates: watch::Receiver<Progress>, printer: Printer) -> tokio::task::JoinHandle<()> {
    if printer.is_quiet() {
        return tokio::spawn(async move {
            while updates.changed().await.is_ok() {}
        });
    }

    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.enable_steady_tick(std::time::Duration::from_millis(100));

    tokio::spawn(async move {
        loop {
            let progress = updates.borrow().clone();
            bar.set_message(render(&progress));
            if updates.changed().await.is_err() {
                break;
            }
        }
        bar.finish_and_clear();
    })
}

fn render(progress: &Progress) -> String {
    format!(
        "admitted {} · built {} · failed {} · repeated {}",
        progress.admitted, progress.built, progress.failed, progress.repeated
    )
}
