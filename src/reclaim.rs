//! Time-based reclamation sweeps.
//!
//! Each sweep pages through matching contacts by rowid and handles every
//! contact in its own transaction, so a failure on one row is logged and
//! counted without aborting the rest. Writes stamp `updated_at = now` and
//! are guarded on the row version read by the scan, which makes a rerun
//! with the same `now` a no-op.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;

use crate::assign::AssignmentEngine;
use crate::config::Config;
use crate::db::{Database, StaleFilter};
use crate::error::{CrmError, Result};
use crate::models::{Contact, ContactLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Sweep {
    /// Assigned contacts nobody worked within the stale window.
    Stale,
    /// Pending contacts whose caller went quiet.
    Inactive,
    /// Import-time special contacts that were never followed up.
    SpecialDecay,
}

impl Sweep {
    /// Run order for a full pass.
    pub const ALL: [Sweep; 3] = [Sweep::Stale, Sweep::Inactive, Sweep::SpecialDecay];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stale => "stale",
            Self::Inactive => "inactive",
            Self::SpecialDecay => "special-decay",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "stale" => Some(Self::Stale),
            "inactive" => Some(Self::Inactive),
            "special-decay" | "special" => Some(Self::SpecialDecay),
            _ => None,
        }
    }
}

impl fmt::Display for Sweep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub sweep: Sweep,
    /// Contacts matched by the scan.
    pub examined: usize,
    pub changed: usize,
    /// Matched but left alone: lost a race or nobody to hand over to.
    pub skipped: usize,
    pub failed: usize,
}

impl SweepReport {
    fn new(sweep: Sweep) -> Self {
        Self {
            sweep,
            examined: 0,
            changed: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

pub struct Reclaimer<'a> {
    db: &'a Database,
    config: &'a Config,
    engine: AssignmentEngine<'a>,
}

impl<'a> Reclaimer<'a> {
    pub fn new(db: &'a Database, config: &'a Config) -> Self {
        Self {
            db,
            config,
            engine: AssignmentEngine::new(db, config),
        }
    }

    /// Every sweep in [`Sweep::ALL`] order.
    pub fn run_all(&self, now: DateTime<Utc>) -> Result<Vec<SweepReport>> {
        Sweep::ALL.iter().map(|sweep| self.run(*sweep, now)).collect()
    }

    pub fn run(&self, sweep: Sweep, now: DateTime<Utc>) -> Result<SweepReport> {
        match sweep {
            Sweep::Stale => self.sweep_stale(now),
            Sweep::Inactive => self.sweep_inactive(now),
            Sweep::SpecialDecay => self.sweep_special_decay(now),
        }
    }

    /// Hand assigned, unworked contacts to a different caller.
    pub fn sweep_stale(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let hours = self.config.stale_after.num_hours();
        let reason = format!("no activity for {}h", hours);
        self.pass(
            Sweep::Stale,
            StaleFilter::Unworked,
            cutoff(now, self.config.stale_after)?,
            |contact| Ok(self.engine.reassign(contact, &reason, now)?.is_some()),
        )
    }

    /// Clear the caller of pending contacts untouched for the inactive window.
    pub fn sweep_inactive(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let days = self.config.inactive_after.num_days();
        self.pass(
            Sweep::Inactive,
            StaleFilter::Inactive,
            cutoff(now, self.config.inactive_after)?,
            |contact| {
                let caller = contact
                    .assigned_caller
                    .map(|id| self.engine.username(id))
                    .transpose()?
                    .unwrap_or_default();
                self.db.immediate(|| {
                    self.db.clear_caller_if_unchanged(contact, now)?;
                    self.db.insert_contact_log(
                        &ContactLog::new(
                            contact.id,
                            format!("Caller {} removed after {} days without activity", caller, days),
                            None,
                        )
                        .at(now),
                    )?;
                    Ok(true)
                })
            },
        )
    }

    /// Special contacts with no call inside the decay window lose both the
    /// caller and the special flag. The flag never comes back.
    pub fn sweep_special_decay(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let hours = self.config.special_decay_after.num_hours();
        self.pass(
            Sweep::SpecialDecay,
            StaleFilter::SpecialNoCall,
            cutoff(now, self.config.special_decay_after)?,
            |contact| {
                self.db.immediate(|| {
                    self.db.demote_special(contact, now)?;
                    self.db.insert_contact_log(
                        &ContactLog::new(
                            contact.id,
                            format!("Special status expired after {}h without a call", hours),
                            None,
                        )
                        .at(now),
                    )?;
                    Ok(true)
                })
            },
        )
    }

    fn pass(
        &self,
        sweep: Sweep,
        filter: StaleFilter,
        cutoff: DateTime<Utc>,
        handle: impl Fn(&Contact) -> Result<bool>,
    ) -> Result<SweepReport> {
        let mut report = SweepReport::new(sweep);
        let mut cursor = 0;

        loop {
            let page = self
                .db
                .sweep_page(filter, cutoff, cursor, self.config.sweep_batch_size)?;
            let Some(last) = page.last() else {
                break;
            };
            cursor = last.rowid;

            for row in &page {
                report.examined += 1;
                match handle(&row.contact) {
                    Ok(true) => report.changed += 1,
                    Ok(false) => report.skipped += 1,
                    Err(CrmError::Conflict(id)) => {
                        tracing::debug!(sweep = %sweep, contact_id = %id, "Contact changed during sweep, skipping");
                        report.skipped += 1;
                    }
                    Err(e) => {
                        tracing::error!(sweep = %sweep, contact_id = %row.contact.id, "Sweep failed for contact: {}", e);
                        report.failed += 1;
                    }
                }
            }
        }

        tracing::info!(
            sweep = %sweep,
            examined = report.examined,
            changed = report.changed,
            skipped = report.skipped,
            failed = report.failed,
            "Sweep finished"
        );
        Ok(report)
    }
}

/// `now - window`, or a validation error when that leaves chrono's range.
fn cutoff(now: DateTime<Utc>, window: Duration) -> Result<DateTime<Utc>> {
    now.checked_sub_signed(window).ok_or_else(|| {
        CrmError::validation(format!(
            "window of {} days reaches past the earliest representable date",
            window.num_days()
        ))
    })
}
