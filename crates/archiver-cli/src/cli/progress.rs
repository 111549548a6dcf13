//! Progress lines on stdout, fed from the engine's progress channel.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use archiver_core::progress::ProgressUpdate;
use archiver_core::tasks::{spawn_supervised, Supervised};
use tokio::sync::mpsc;

const PRINT_INTERVAL: Duration = Duration::from_millis(500);

fn mib(bytes: u64) -> f64 {
    bytes as f64 / 1_048_576.0
}

pub(crate) fn format_line(update: &ProgressUpdate) -> String {
    let eta = update
        .eta_secs()
        .map(|s| format!("{:.0}s", s))
        .unwrap_or_else(|| "?".to_string());
    format!(
        "  [{}] {:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s  ETA {}",
        update.context_id.get(..8).unwrap_or(&update.context_id),
        mib(update.bytes_written),
        mib(update.content_length),
        update.fraction() * 100.0,
        update.bytes_per_sec() / 1_048_576.0,
        eta
    )
}

/// Print updates until every sender is dropped. At most one line per job
/// every 500 ms, plus the completing update.
pub fn spawn_printer(mut rx: mpsc::Receiver<ProgressUpdate>) -> Supervised<()> {
    spawn_supervised("progress-printer", async move {
        let mut last_print: HashMap<String, Instant> = HashMap::new();
        while let Some(update) = rx.recv().await {
            let now = Instant::now();
            let due = last_print
                .get(&update.context_id)
                .map(|t| now.duration_since(*t) >= PRINT_INTERVAL)
                .unwrap_or(true);
            if due || update.is_complete() {
                println!("{}", format_line(&update));
                if update.is_complete() {
                    last_print.remove(&update.context_id);
                } else {
                    last_print.insert(update.context_id.clone(), now);
                }
            }
        }
        Ok(())
    })
}

/// Wait for the printer to drain. Its failure never fails the command.
pub async fn finish_printer(printer: Supervised<()>) {
    if let Err(e) = printer.join().await {
        tracing::warn!(error = %format!("{:#}", e), "progress output incomplete");
    }
}
