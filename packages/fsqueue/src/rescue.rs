//! Returning jobs held by dead workers to the submittable pool.

use std::io;

use queue_core::{OwnerId, RescueReport, RescuedJob};
use storage::{Liveness, RenameError};

use crate::error::{QueueError, Result};
use crate::queue::Queue;

impl Queue {
    /// Scan `owned/`, find owners that are no longer running and move their
    /// jobs back to `submittable/`.
    ///
    /// Owners that are alive, or whose liveness cannot be determined, are left
    /// alone. Problems with one owner or one job are logged and the sweep moves
    /// on; only failing to list `owned/` itself is returned as an error.
    ///
    /// Safe to run concurrently with itself and with every other operation.
    pub fn rescue_dead_jobs(&self) -> Result<RescueReport> {
        let owned = self.layout().owned();
        let names = storage::list_names(&owned).map_err(|e| {
            tracing::warn!(dir = %owned.display(), error = %e, "could not list owner slots");
            QueueError::from_io(&owned, e)
        })?;

        let mut report = RescueReport::default();
        for name in names {
            let owner = match name.to_str().map(OwnerId::parse) {
                Some(Ok(owner)) => owner,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "skipping entry under owned/");
                    report.entries_skipped += 1;
                    continue;
                }
                None => {
                    tracing::warn!(name = ?name, "skipping non-UTF-8 entry under owned/");
                    report.entries_skipped += 1;
                    continue;
                }
            };

            report.owners_examined += 1;
            if owner == self.owner() {
                report.owners_alive += 1;
                continue;
            }

            match self.owner_liveness(owner) {
                Ok(Liveness::Alive) => report.owners_alive += 1,
                Ok(Liveness::Dead) => {
                    tracing::info!(%owner, "owner has gone away");
                    self.rescue_owner(owner, &mut report);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "leaving owner's jobs in place");
                    report.owners_indeterminate += 1;
                }
            }
        }

        if !report.is_noop() {
            tracing::info!(
                jobs = report.jobs_rescued(),
                owners = report.recovered_owners.len(),
                "rescue sweep finished"
            );
        }
        Ok(report)
    }

    fn owner_liveness(&self, owner: OwnerId) -> Result<Liveness> {
        self.liveness()
            .check(owner.as_u32())
            .map_err(|source| QueueError::IndeterminateLiveness { owner, source })
    }

    fn rescue_owner(&self, owner: OwnerId, report: &mut RescueReport) {
        let slot = self.layout().owner_slot(owner);
        let submittable = self.layout().submittable();

        let ids = match self.list_ids(&slot) {
            Ok(ids) => ids,
            // Another sweep already cleared this slot.
            Err(e) if e.is_not_found() => return,
            Err(e) => {
                tracing::warn!(%owner, error = %e, "could not list dead owner's jobs");
                report.slots_left += 1;
                return;
            }
        };

        for id in ids {
            match storage::rename(&slot.join(&id), &submittable.join(&id)) {
                Ok(()) => {
                    tracing::info!(job = %id, %owner, "rescheduled job from dead owner");
                    report.rescued.push(RescuedJob { owner, job_id: id });
                }
                Err(RenameError::SourceMissing(_)) => {
                    tracing::debug!(job = %id, %owner, "job already moved by another sweep");
                }
                Err(e) => {
                    tracing::warn!(job = %id, %owner, error = %e, "failed to reschedule job");
                    report.failures += 1;
                }
            }
        }

        match std::fs::remove_dir(&slot) {
            Ok(()) => {
                tracing::info!(%owner, "removed dead owner's slot");
                report.recovered_owners.push(owner);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(slot = %slot.display(), error = %e, "failed to remove owner slot");
                report.slots_left += 1;
            }
        }
    }
}
