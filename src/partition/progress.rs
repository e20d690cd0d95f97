//! Progress notification for the partitioner.
//!
//! The partitioner reports a fraction in `[0, 1]` after every group. It makes
//! no assumption about which thread the observer lives on; failures returned
//! by an observer are logged and otherwise ignored.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

/// Receives progress updates.
pub trait ProgressObserver {
    fn on_progress(&self, fraction: f64) -> Result<()>;
}

impl<F> ProgressObserver for F
where
    F: Fn(f64) -> Result<()>,
{
    fn on_progress(&self, fraction: f64) -> Result<()> {
        self(fraction)
    }
}

/// Observer that ignores every update.
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _fraction: f64) -> Result<()> {
        Ok(())
    }
}

/// Deliver an update, logging a failing observer instead of propagating.
pub(crate) fn notify(observer: &dyn ProgressObserver, fraction: f64) {
    if let Err(e) = observer.on_progress(fraction) {
        warn!("Progress callback failed: {}", e);
    }
}

/// Terminal progress bar driven by partitioner updates.
pub struct ProgressBarObserver {
    bar: ProgressBar,
}

/// Resolution of the bar; fractions are scaled to this length.
const BAR_LENGTH: u64 = 100;

impl ProgressBarObserver {
    pub fn new() -> Self {
        let bar = ProgressBar::new(BAR_LENGTH);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}%")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressBarObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for ProgressBarObserver {
    fn on_progress(&self, fraction: f64) -> Result<()> {
        let position = (fraction.clamp(0.0, 1.0) * BAR_LENGTH as f64).round() as u64;
        self.bar.set_position(position);
        Ok(())
    }
}
