//! Zone, record and run-result types

use serde::{Deserialize, Serialize};

/// Zone activation status as reported by Cloudflare
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneStatus {
    #[default]
    Active,
    Pending,
    #[serde(other)]
    Other,
}

impl std::fmt::Display for ZoneStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZoneStatus::Active => write!(f, "active"),
            ZoneStatus::Pending => write!(f, "pending"),
            ZoneStatus::Other => write!(f, "other"),
        }
    }
}

/// A DNS zone (domain) in the account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: ZoneStatus,
}

impl Zone {
    /// Fully qualified DMARC host for this zone
    pub fn dmarc_name(&self) -> String {
        format!("_dmarc.{}", self.name)
    }
}

/// A TXT record as returned by the DNS records API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "auto_ttl")]
    pub ttl: u32,
}

/// Cloudflare's "automatic" TTL
pub const AUTO_TTL: u32 = 1;

fn auto_ttl() -> u32 {
    AUTO_TTL
}

/// Outcome of looking up a zone's `_dmarc` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordLookup {
    /// A record exists and should be replaced
    Found(DnsRecord),
    /// The query succeeded and no DMARC record exists; safe to create
    Absent,
    /// The query itself failed; state unknown, do not mutate
    QueryFailed(String),
}

impl RecordLookup {
    /// Collapsed view: the record if one was found.
    ///
    /// `Absent` and `QueryFailed` both map to `None` here and cannot be told
    /// apart through this accessor.
    pub fn existing(&self) -> Option<&DnsRecord> {
        match self {
            RecordLookup::Found(record) => Some(record),
            RecordLookup::Absent | RecordLookup::QueryFailed(_) => None,
        }
    }
}

/// What happened to one zone during the apply phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "reason", rename_all = "lowercase")]
pub enum ZoneOutcome {
    Created,
    Updated,
    Failed(String),
}

/// Per-run counts of created, updated and failed zones
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunTally {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub failed_domains: Vec<String>,
}

impl RunTally {
    /// Fold one zone's outcome into the tally
    pub fn record(&mut self, zone: &Zone, outcome: &ZoneOutcome) {
        match outcome {
            ZoneOutcome::Created => self.created += 1,
            ZoneOutcome::Updated => self.updated += 1,
            ZoneOutcome::Failed(_) => {
                self.failed += 1;
                self.failed_domains.push(zone.name.clone());
            }
        }
    }

    pub fn successes(&self) -> usize {
        self.created + self.updated
    }

    pub fn total(&self) -> usize {
        self.successes() + self.failed
    }
}
