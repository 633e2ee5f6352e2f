//! Read-only DMARC audit
//!
//! Lists the account's zones and shows the current `_dmarc` record for each
//! one without changing anything.

use tracing::{debug, warn};

use crate::cloudflare::DmarcBackend;
use crate::report;
use crate::types::{RecordLookup, Zone};

/// Per-zone lookup results of an audit
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub zones: Vec<Zone>,
    pub lookups: Vec<RecordLookup>,
}

impl CheckReport {
    pub fn with_record(&self) -> usize {
        self.count(|l| matches!(l, RecordLookup::Found(_)))
    }

    pub fn without_record(&self) -> usize {
        self.count(|l| matches!(l, RecordLookup::Absent))
    }

    pub fn unknown(&self) -> usize {
        self.count(|l| matches!(l, RecordLookup::QueryFailed(_)))
    }

    fn count(&self, pred: impl Fn(&RecordLookup) -> bool) -> usize {
        self.lookups.iter().filter(|l| pred(l)).count()
    }
}

/// Print every zone and its DMARC record
pub async fn audit<B: DmarcBackend + ?Sized>(backend: &B) -> CheckReport {
    println!("\nFetching domains...");
    let zones = backend.list_zones().await;
    if zones.is_empty() {
        println!("{}", report::no_zones_help());
        return CheckReport::default();
    }
    println!("{}", report::zone_list(&format!("Found {} domains:", zones.len()), &zones));

    let mut lookups = Vec::with_capacity(zones.len());
    for zone in &zones {
        debug!(zone = %zone.name, "Checking DMARC record");
        let lookup = backend.find_dmarc_record(zone).await;
        match &lookup {
            RecordLookup::Found(record) => {
                println!("SUCCESS: DMARC record exists for {}", zone.name);
                println!("  Content: {}", record.content);
            }
            RecordLookup::Absent => println!("INFO: No DMARC record found for {}", zone.name),
            RecordLookup::QueryFailed(reason) => {
                warn!(zone = %zone.name, reason = %reason, "DMARC lookup failed");
                println!("ERROR: Could not check {}: {}", zone.name, reason);
            }
        }
        lookups.push(lookup);
    }

    let audit = CheckReport { zones, lookups };
    println!("\n{}", report::rule());
    println!(
        "Check complete: {} with DMARC, {} without, {} unknown",
        audit.with_record(),
        audit.without_record(),
        audit.unknown()
    );
    println!("\nNext steps:");
    println!("1. If records are missing, run: cloudflare-dmarc apply --report-email <address>");
    println!("2. Monitor the aggregate reports sent to your rua address");
    println!("3. Use online tools to verify setup");

    audit
}
