//! Startup synchronization policy.
//!
//! Runs once before the router starts: optional export to the remote registry,
//! then optional import from it.

use tracing::{info, warn};

use crate::error::NotifyResult;
use crate::reconciler::BucketSyncSummary;
use crate::service::NotificationService;

/// Which syncs to run at startup and how to react to failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartupSync {
    /// Push local rules to the remote registry.
    pub export: bool,
    /// Drop our remote entries before exporting.
    pub export_clear: bool,
    /// Pull remote rules into the local store.
    pub import: bool,
    /// Drop local rules before importing.
    pub import_clear: bool,
    /// Abort startup if a sync fails.
    pub halt_on_error: bool,
}

impl StartupSync {
    /// The policy actually applied.
    ///
    /// When both export and import run, the remote clear is disabled: import
    /// runs after export, so clearing locally still drops rules the export
    /// failed to push.
    #[must_use]
    pub fn effective(self) -> Self {
        if self.export && self.import && self.export_clear {
            warn!("export_clear ignored while both export and import are enabled");
            return Self {
                export_clear: false,
                ..self
            };
        }
        self
    }
}

/// Outcome of [`run_startup_sync`].
#[derive(Debug, Default)]
pub struct StartupReport {
    /// Per-bucket export results, when the export ran and succeeded.
    pub exported: Option<Vec<BucketSyncSummary>>,
    /// Per-bucket import results, when the import ran and succeeded.
    pub imported: Option<Vec<BucketSyncSummary>>,
    /// Failures tolerated because `halt_on_error` was off.
    pub failures: Vec<String>,
}

impl StartupReport {
    /// Returns true if every requested sync succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run the startup syncs requested by `policy`.
///
/// With `halt_on_error`, the first failure is returned; otherwise failures are
/// logged, recorded in the report and startup continues degraded.
pub fn run_startup_sync(service: &NotificationService, policy: StartupSync) -> NotifyResult<StartupReport> {
    let policy = policy.effective();
    let mut report = StartupReport::default();

    if policy.export {
        match service.export_all(policy.export_clear) {
            Ok(summary) => {
                info!(buckets = summary.len(), clear = policy.export_clear, "startup export done");
                report.exported = Some(summary);
            }
            Err(err) if policy.halt_on_error => return Err(err),
            Err(err) => {
                warn!(error = %err, "startup export failed; continuing");
                report.failures.push(format!("export: {err}"));
            }
        }
    }

    if policy.import {
        match service.import_all(policy.import_clear) {
            Ok(summary) => {
                info!(buckets = summary.len(), clear = policy.import_clear, "startup import done");
                report.imported = Some(summary);
            }
            Err(err) if policy.halt_on_error => return Err(err),
            Err(err) => {
                warn!(error = %err, "startup import failed; continuing");
                report.failures.push(format!("import: {err}"));
            }
        }
    }

    Ok(report)
}
