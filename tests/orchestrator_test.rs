// Rollout tests driving `BulkUpdater` against a scripted backend.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::time::Instant;

use cloudflare_dmarc::orchestrator::ZONE_PACING;
use cloudflare_dmarc::{
    BulkUpdater, ConfirmPrompt, DmarcBackend, DmarcError, DmarcPolicy, DnsRecord, PolicyStage,
    RecordLookup, Result, RunState, Zone, ZoneOutcome, ZoneStatus,
};

// ── Helpers ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Lookup(String),
    Update { zone: String, record_id: String },
    Create(String),
}

#[derive(Default)]
struct ScriptedBackend {
    zones: Vec<Zone>,
    lookups: HashMap<String, RecordLookup>,
    refused: HashSet<String>,
    broken: HashSet<String>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedBackend {
    fn with_zones(names: &[&str]) -> Self {
        Self {
            zones: names.iter().map(|n| zone(n)).collect(),
            ..Self::default()
        }
    }

    fn existing(mut self, name: &str, record_id: &str) -> Self {
        self.lookups.insert(
            name.to_string(),
            RecordLookup::Found(DnsRecord {
                id: record_id.to_string(),
                name: format!("_dmarc.{name}"),
                content: "v=DMARC1; p=none".to_string(),
                ttl: 1,
            }),
        );
        self
    }

    fn lookup_fails(mut self, name: &str) -> Self {
        self.lookups.insert(
            name.to_string(),
            RecordLookup::QueryFailed("connection reset by peer".to_string()),
        );
        self
    }

    /// The API answers but refuses the write
    fn refuses(mut self, name: &str) -> Self {
        self.refused.insert(name.to_string());
        self
    }

    /// The write fails at the transport level
    fn broken(mut self, name: &str) -> Self {
        self.broken.insert(name.to_string());
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn writes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::Lookup(_)))
            .collect()
    }

    async fn write_result(&self, zone: &Zone) -> Result<bool> {
        if self.broken.contains(&zone.name) {
            let err = reqwest::Client::new()
                .get("not a url")
                .send()
                .await
                .unwrap_err();
            return Err(DmarcError::Http(err));
        }
        Ok(!self.refused.contains(&zone.name))
    }
}

#[async_trait]
impl DmarcBackend for ScriptedBackend {
    async fn list_zones(&self) -> Vec<Zone> {
        self.zones.clone()
    }

    async fn find_dmarc_record(&self, zone: &Zone) -> RecordLookup {
        self.calls.lock().unwrap().push(Call::Lookup(zone.name.clone()));
        self.lookups
            .get(&zone.name)
            .cloned()
            .unwrap_or(RecordLookup::Absent)
    }

    async fn update_dmarc_record(&self, zone: &Zone, record_id: &str, _content: &str) -> Result<bool> {
        self.calls.lock().unwrap().push(Call::Update {
            zone: zone.name.clone(),
            record_id: record_id.to_string(),
        });
        self.write_result(zone).await
    }

    async fn create_dmarc_record(&self, zone: &Zone, _content: &str) -> Result<bool> {
        self.calls.lock().unwrap().push(Call::Create(zone.name.clone()));
        self.write_result(zone).await
    }
}

struct Answer(&'static str);

impl ConfirmPrompt for Answer {
    fn ask(&self, _question: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}

struct NeverAsked;

impl ConfirmPrompt for NeverAsked {
    fn ask(&self, question: &str) -> Result<String> {
        panic!("prompt should not be shown: {question}");
    }
}

fn zone(name: &str) -> Zone {
    Zone {
        id: format!("id-{name}"),
        name: name.to_string(),
        status: ZoneStatus::Active,
    }
}

fn policy() -> DmarcPolicy {
    DmarcPolicy::for_stage(PolicyStage::Quarantine(25), "dmarc@example.com").unwrap()
}

// ── Full runs ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_mixed_run_isolates_failures() {
    let backend = ScriptedBackend::with_zones(&["a.com", "b.com", "c.com"])
        .existing("b.com", "rec-b")
        .lookup_fails("c.com");
    let updater = BulkUpdater::new(backend, policy());

    let started = Instant::now();
    let report = updater.run(&Answer("yes")).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(report.state, RunState::Applied);
    assert_eq!(report.tally.created, 1);
    assert_eq!(report.tally.updated, 1);
    assert_eq!(report.tally.failed, 1);
    assert_eq!(report.tally.failed_domains, vec!["c.com".to_string()]);
    assert_eq!(report.outcomes[0], ZoneOutcome::Created);
    assert_eq!(report.outcomes[1], ZoneOutcome::Updated);
    assert!(matches!(report.outcomes[2], ZoneOutcome::Failed(_)));

    // One pause between each pair of zones: two for three zones.
    assert!(elapsed >= ZONE_PACING * 2, "elapsed {elapsed:?}");
    assert!(elapsed < ZONE_PACING * 3, "elapsed {elapsed:?}");

    // A failed lookup never leads to a write.
    assert_eq!(
        updater.backend().writes(),
        vec![
            Call::Create("a.com".to_string()),
            Call::Update {
                zone: "b.com".to_string(),
                record_id: "rec-b".to_string()
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_update_only_when_record_found() {
    let backend = ScriptedBackend::with_zones(&["a.com", "b.com", "c.com", "d.com"])
        .existing("a.com", "rec-a")
        .existing("c.com", "rec-c");
    let updater = BulkUpdater::new(backend, policy());

    let report = updater.run(&Answer("YES")).await.unwrap();

    assert_eq!(report.tally.updated, 2);
    assert_eq!(report.tally.created, 2);
    assert_eq!(
        updater.backend().calls(),
        vec![
            Call::Lookup("a.com".to_string()),
            Call::Update {
                zone: "a.com".to_string(),
                record_id: "rec-a".to_string()
            },
            Call::Lookup("b.com".to_string()),
            Call::Create("b.com".to_string()),
            Call::Lookup("c.com".to_string()),
            Call::Update {
                zone: "c.com".to_string(),
                record_id: "rec-c".to_string()
            },
            Call::Lookup("d.com".to_string()),
            Call::Create("d.com".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_refused_and_broken_writes_do_not_stop_the_run() {
    let backend = ScriptedBackend::with_zones(&["a.com", "b.com", "c.com"])
        .existing("a.com", "rec-a")
        .refuses("a.com")
        .broken("b.com");
    let updater = BulkUpdater::new(backend, policy());

    let report = updater.run(&Answer("yes")).await.unwrap();

    assert_eq!(report.tally.failed, 2);
    assert_eq!(report.tally.created, 1);
    assert_eq!(
        report.tally.failed_domains,
        vec!["a.com".to_string(), "b.com".to_string()]
    );
    assert_eq!(
        report.outcomes[0],
        ZoneOutcome::Failed("Failed to update".to_string())
    );
    assert_eq!(report.outcomes[2], ZoneOutcome::Created);
}

#[tokio::test]
async fn test_declined_confirmation_writes_nothing() {
    for answer in ["no", "y", "", "yes!"] {
        let backend = ScriptedBackend::with_zones(&["a.com", "b.com"]).existing("b.com", "rec-b");
        let updater = BulkUpdater::new(backend, policy());

        let report = updater.run(&Answer(answer)).await.unwrap();

        assert_eq!(report.state, RunState::Cancelled, "answer '{answer}'");
        assert_eq!(report.tally.total(), 0);
        assert!(report.tally.failed_domains.is_empty());
        assert!(report.outcomes.is_empty());
        assert!(updater.backend().calls().is_empty());
    }
}

#[tokio::test]
async fn test_no_zones_stops_before_prompt() {
    let updater = BulkUpdater::new(ScriptedBackend::default(), policy());

    let report = updater.run(&NeverAsked).await.unwrap();

    assert_eq!(report.state, RunState::NoZones);
    assert_eq!(report.tally.total(), 0);
}

#[tokio::test]
async fn test_prompt_error_aborts_run() {
    struct Closed;
    impl ConfirmPrompt for Closed {
        fn ask(&self, _question: &str) -> Result<String> {
            Err(DmarcError::Prompt("stdin closed".to_string()))
        }
    }

    let updater = BulkUpdater::new(ScriptedBackend::with_zones(&["a.com"]), policy());

    assert!(matches!(
        updater.run(&Closed).await,
        Err(DmarcError::Prompt(_))
    ));
    assert!(updater.backend().calls().is_empty());
}

// ── Apply phase ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_single_zone_has_no_pause() {
    let updater = BulkUpdater::new(ScriptedBackend::default(), policy());

    let started = Instant::now();
    let (outcomes, tally) = updater.apply(&[zone("a.com")]).await;

    assert_eq!(outcomes, vec![ZoneOutcome::Created]);
    assert_eq!(tally.created, 1);
    assert!(started.elapsed() < ZONE_PACING);
}

#[tokio::test(start_paused = true)]
async fn test_custom_pacing() {
    let pacing = std::time::Duration::from_secs(5);
    let updater = BulkUpdater::new(ScriptedBackend::default(), policy()).with_pacing(pacing);

    let started = Instant::now();
    updater
        .apply(&[zone("a.com"), zone("b.com"), zone("c.com"), zone("d.com")])
        .await;
    let elapsed = started.elapsed();

    assert!(elapsed >= pacing * 3, "elapsed {elapsed:?}");
    assert!(elapsed < pacing * 4, "elapsed {elapsed:?}");
}
