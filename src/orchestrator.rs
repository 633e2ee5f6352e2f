//! Bulk DMARC rollout
//!
//! One pass over the account's zones: discover, confirm once, then for each
//! zone look up the `_dmarc` record and replace or create it. A failing zone
//! is recorded and the pass moves on.

use std::time::Duration;

use tracing::{info, warn};

use crate::cloudflare::DmarcBackend;
use crate::error::{DmarcError, Result};
use crate::policy::DmarcPolicy;
use crate::report;
use crate::types::{RecordLookup, RunTally, Zone, ZoneOutcome};

/// Delay between consecutive zones to stay under the API rate limit
pub const ZONE_PACING: Duration = Duration::from_millis(500);

pub const CONFIRM_QUESTION: &str = "Proceed with DMARC update for all domains? (yes/no)";

/// Source of the yes/no answer gating the apply phase
pub trait ConfirmPrompt: Send + Sync {
    fn ask(&self, question: &str) -> Result<String>;
}

/// Reads the answer from the terminal
pub struct ConsolePrompt;

impl ConfirmPrompt for ConsolePrompt {
    fn ask(&self, question: &str) -> Result<String> {
        dialoguer::Input::<String>::new()
            .with_prompt(question)
            .allow_empty(true)
            .interact_text()
            .map_err(|e| DmarcError::Prompt(e.to_string()))
    }
}

/// Only the literal `yes` (any case) proceeds
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("yes")
}

/// Where a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Discovery returned no zones
    NoZones,
    /// The confirmation was declined; nothing was written
    Cancelled,
    /// Every zone was processed
    Applied,
}

/// Result of a full run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub state: RunState,
    pub zones: Vec<Zone>,
    /// Per-zone outcomes in enumeration order; empty unless applied
    pub outcomes: Vec<ZoneOutcome>,
    pub tally: RunTally,
}

impl RunReport {
    fn stopped(state: RunState, zones: Vec<Zone>) -> Self {
        Self {
            state,
            zones,
            outcomes: Vec::new(),
            tally: RunTally::default(),
        }
    }
}

/// Drives one rollout of a single policy over every zone
pub struct BulkUpdater<B> {
    backend: B,
    policy: DmarcPolicy,
    pacing: Duration,
}

impl<B: DmarcBackend> BulkUpdater<B> {
    pub fn new(backend: B, policy: DmarcPolicy) -> Self {
        Self {
            backend,
            policy,
            pacing: ZONE_PACING,
        }
    }

    /// Override the inter-zone delay
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn policy(&self) -> &DmarcPolicy {
        &self.policy
    }

    /// Discover, confirm, apply, report
    pub async fn run(&self, prompt: &dyn ConfirmPrompt) -> Result<RunReport> {
        let content = self.policy.to_string();

        if let Some(address) = self.policy.report_address() {
            println!("\nDMARC Reports will go to: {address}");
        }
        println!("Policy to apply: {}", report::policy_preview(&content, 60));
        println!("{}", report::rule());

        println!("\nFetching all domains from Cloudflare...");
        let zones = self.backend.list_zones().await;
        if zones.is_empty() {
            warn!("No zones returned by Cloudflare");
            println!("{}", report::no_zones_help());
            return Ok(RunReport::stopped(RunState::NoZones, zones));
        }
        info!(count = zones.len(), "Discovered zones");
        println!("SUCCESS: Found {} domains\n", zones.len());

        println!("{}", report::zone_list("Domains to update:", &zones));
        println!("{}", report::stage_guidance(&content));

        let answer = prompt.ask(&format!("\n{CONFIRM_QUESTION}"))?;
        if !is_affirmative(&answer) {
            info!("Rollout declined at confirmation");
            println!("Update cancelled");
            return Ok(RunReport::stopped(RunState::Cancelled, zones));
        }

        println!("\nStarting updates...\n");
        let (outcomes, tally) = self.apply(&zones).await;

        println!("{}", report::summary(&tally, zones.len()));
        if tally.successes() > 0 {
            println!(
                "{}",
                report::follow_up(&content, self.policy.report_address())
            );
        }

        Ok(RunReport {
            state: RunState::Applied,
            zones,
            outcomes,
            tally,
        })
    }

    /// Upsert the policy into every zone, pacing between zones
    pub async fn apply(&self, zones: &[Zone]) -> (Vec<ZoneOutcome>, RunTally) {
        let content = self.policy.to_string();
        let mut outcomes = Vec::with_capacity(zones.len());
        let mut tally = RunTally::default();

        for (i, zone) in zones.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.pacing).await;
            }

            let outcome = self.apply_zone(zone, &content).await;
            match &outcome {
                ZoneOutcome::Created => println!("{}... SUCCESS: Created", zone.name),
                ZoneOutcome::Updated => println!("{}... SUCCESS: Updated", zone.name),
                ZoneOutcome::Failed(reason) => {
                    warn!(zone = %zone.name, reason = %reason, "DMARC upsert failed");
                    println!("{}... ERROR: {}", zone.name, reason);
                }
            }

            tally.record(zone, &outcome);
            outcomes.push(outcome);
        }

        info!(
            created = tally.created,
            updated = tally.updated,
            failed = tally.failed,
            "DMARC rollout complete"
        );

        (outcomes, tally)
    }

    async fn apply_zone(&self, zone: &Zone, content: &str) -> ZoneOutcome {
        match self.backend.find_dmarc_record(zone).await {
            RecordLookup::Found(record) => {
                match self
                    .backend
                    .update_dmarc_record(zone, &record.id, content)
                    .await
                {
                    Ok(true) => ZoneOutcome::Updated,
                    Ok(false) => ZoneOutcome::Failed("Failed to update".to_string()),
                    Err(e) => ZoneOutcome::Failed(e.to_string()),
                }
            }
            RecordLookup::Absent => match self.backend.create_dmarc_record(zone, content).await {
                Ok(true) => ZoneOutcome::Created,
                Ok(false) => ZoneOutcome::Failed("Failed to create".to_string()),
                Err(e) => ZoneOutcome::Failed(e.to_string()),
            },
            RecordLookup::QueryFailed(reason) => {
                ZoneOutcome::Failed(format!("Could not check existing record: {reason}"))
            }
        }
    }
}
