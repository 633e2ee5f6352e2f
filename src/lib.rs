//! Cloudflare DMARC Rollout Library
//!
//! Publishes one DMARC policy to the `_dmarc` TXT record of every zone in a
//! Cloudflare account, creating or replacing records as needed.

pub mod check;
pub mod cloudflare;
pub mod config;
pub mod credentials;
pub mod error;
pub mod orchestrator;
pub mod policy;
pub mod report;
pub mod types;

pub use cloudflare::{CloudflareClient, DmarcBackend};
pub use config::Settings;
pub use credentials::Credentials;
pub use error::{DmarcError, Result};
pub use orchestrator::{BulkUpdater, ConfirmPrompt, ConsolePrompt, RunReport, RunState};
pub use policy::{DmarcPolicy, PolicyStage, StageMode};
pub use types::{DnsRecord, RecordLookup, RunTally, Zone, ZoneOutcome, ZoneStatus};
