//! Terminal progress bars driven by upload events.

use std::collections::HashMap;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use skydrop_transfer::TransferStatus;
use skydrop_uploader::UploadEvent;
use tokio::sync::mpsc;

const BAR_TEMPLATE: &str = "{prefix:>28.bold} [{bar:40.cyan/blue}] {pos:>3}% {msg}";

/// One bar per queued file.
///
/// Files are matched to task ids by order: the ingest queue reports
/// `Pending` for every file in input order before any transfer starts.
pub struct UploadBars {
    multi: MultiProgress,
    names: Vec<String>,
    bars: HashMap<String, ProgressBar>,
}

impl UploadBars {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            multi: MultiProgress::new(),
            names,
            bars: HashMap::new(),
        }
    }

    /// Renders events until the channel closes.
    pub async fn run(mut self, mut events: mpsc::Receiver<UploadEvent>) {
        while let Some(event) = events.recv().await {
            self.apply(event);
        }
    }

    fn apply(&mut self, event: UploadEvent) {
        match event {
            UploadEvent::Status { task_id, status } => {
                let bar = self.bar(&task_id);
                bar.set_message(status_label(status));
            }
            UploadEvent::Progress { task_id, percent } => {
                self.bar(&task_id).set_position(percent.round() as u64);
            }
            UploadEvent::Completed { task_id, file } => {
                let bar = self.bar(&task_id);
                bar.set_position(100);
                bar.finish_with_message(format!("done (id {})", file.id));
            }
            UploadEvent::Failed { task_id, error, .. } => {
                self.bar(&task_id)
                    .abandon_with_message(format!("failed: {error}"));
            }
            UploadEvent::Aborted { task_id } => {
                self.bar(&task_id).abandon_with_message("cancelled");
            }
            UploadEvent::Refresh => tracing::debug!("remote listing changed"),
            UploadEvent::BatchFailed { failures } => {
                tracing::debug!(failures = failures.len(), "batch finished with failures");
            }
        }
    }

    fn bar(&mut self, task_id: &str) -> &ProgressBar {
        let next = self.bars.len();
        let multi = &self.multi;
        let names = &self.names;
        self.bars.entry(task_id.to_string()).or_insert_with(|| {
            let bar = multi.add(ProgressBar::new(100));
            bar.set_style(bar_style());
            let name = names.get(next).cloned().unwrap_or_else(|| task_id.to_string());
            bar.set_prefix(name);
            bar
        })
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn status_label(status: TransferStatus) -> &'static str {
    match status {
        TransferStatus::Pending => "queued",
        TransferStatus::Negotiating => "opening session",
        TransferStatus::Transferring => "uploading",
        TransferStatus::Finalizing => "assembling",
        TransferStatus::Completed => "done",
        TransferStatus::Failed => "failed",
        TransferStatus::Aborted => "cancelled",
    }
}

/// Formats a byte count with binary units.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.2} {}", UNITS[unit_idx])
    }
}
