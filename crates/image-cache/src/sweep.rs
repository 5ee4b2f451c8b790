//! Startup eviction of entries older than the retention window

use crate::error::Result;
use crate::store::DualStore;
use crate::types::SweepReport;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

/// Delete every entry whose age at `now` exceeds `retention`.
///
/// An entry exactly `retention` old is kept. Records whose timestamp cannot be
/// read are skipped and left in place. Temp files left by interrupted writes
/// are removed first.
pub async fn sweep_expired(
    store: &DualStore,
    retention: Duration,
    now: DateTime<Utc>,
) -> Result<SweepReport> {
    let mut report = SweepReport {
        temp_removed: store.remove_temp_files().await?,
        ..SweepReport::default()
    };

    for path in store.metadata_files().await? {
        report.scanned += 1;

        let record = match store.read_metadata_file(&path).await {
            Ok(record) => record,
            Err(e) => {
                warn!(path = ?path, error = %e, "Skipping unreadable metadata record");
                report.skipped += 1;
                continue;
            }
        };

        let age = now - record.created_at;
        if age > retention {
            debug!(key = %record.key, age_secs = age.num_seconds(), "Evicting expired entry");
            store.delete(&record.key).await?;
            report.evicted += 1;
        }
    }

    info!(
        scanned = report.scanned,
        evicted = report.evicted,
        skipped = report.skipped,
        temp_removed = report.temp_removed,
        "Eviction sweep complete"
    );
    Ok(report)
}
