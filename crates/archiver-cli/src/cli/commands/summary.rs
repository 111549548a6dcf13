//! End-of-run summary shared by the download commands.

use anyhow::Result;
use archiver_core::scheduler::PoolReport;

/// Print what the pool did; fail if any job failed.
pub(super) fn report_pool(report: &PoolReport) -> Result<()> {
    for job in report.failed() {
        if let Err(err) = &job.result {
            eprintln!("  failed: {} ({})", job.descriptor.url, err);
        }
    }
    println!(
        "Downloaded {}, already present {}, failed {}.",
        report.downloaded(),
        report.skipped(),
        report.failed_count()
    );
    if report.failed_count() > 0 {
        anyhow::bail!("{} download(s) failed", report.failed_count());
    }
    Ok(())
}
