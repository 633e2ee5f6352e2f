//! DMARC policy model
//!
//! A rollout walks through a fixed set of stages (monitor, partial quarantine,
//! full quarantine, reject). Each stage maps to one policy tag list; a run
//! publishes exactly one of them to every zone.

use std::fmt;
use std::str::FromStr;

use crate::error::{DmarcError, Result};

/// The `p=` / `sp=` disposition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyMode {
    None,
    Quarantine,
    Reject,
}

impl PolicyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyMode::None => "none",
            PolicyMode::Quarantine => "quarantine",
            PolicyMode::Reject => "reject",
        }
    }
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyMode {
    type Err = DmarcError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(PolicyMode::None),
            "quarantine" => Ok(PolicyMode::Quarantine),
            "reject" => Ok(PolicyMode::Reject),
            other => Err(DmarcError::InvalidPolicy(format!(
                "unknown policy mode '{other}'"
            ))),
        }
    }
}

/// SPF / DKIM identifier alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Relaxed,
    Strict,
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alignment::Relaxed => f.write_str("r"),
            Alignment::Strict => f.write_str("s"),
        }
    }
}

impl FromStr for Alignment {
    type Err = DmarcError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "r" => Ok(Alignment::Relaxed),
            "s" => Ok(Alignment::Strict),
            other => Err(DmarcError::InvalidPolicy(format!(
                "alignment must be 'r' or 's', got '{other}'"
            ))),
        }
    }
}

/// Rollout stage selected at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyStage {
    /// Collect reports only
    Monitor,
    /// Quarantine the given percentage of failing mail (100 = full)
    Quarantine(u8),
    /// Reject failing mail
    Reject,
}

impl fmt::Display for PolicyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyStage::Monitor => f.write_str("monitor"),
            PolicyStage::Quarantine(100) => f.write_str("quarantine"),
            PolicyStage::Quarantine(pct) => write!(f, "quarantine-{pct}"),
            PolicyStage::Reject => f.write_str("reject"),
        }
    }
}

impl FromStr for PolicyStage {
    type Err = DmarcError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "monitor" | "none" => return Ok(PolicyStage::Monitor),
            "quarantine" => return Ok(PolicyStage::Quarantine(100)),
            "reject" => return Ok(PolicyStage::Reject),
            _ => {}
        }

        let pct = s
            .strip_prefix("quarantine-")
            .and_then(|p| p.parse::<u8>().ok())
            .filter(|p| (1..=100).contains(p))
            .ok_or_else(|| {
                DmarcError::InvalidPolicy(format!(
                    "unknown stage '{s}' (expected monitor, quarantine, quarantine-<1..100> or reject)"
                ))
            })?;

        Ok(PolicyStage::Quarantine(pct))
    }
}

/// A DMARC TXT record value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmarcPolicy {
    pub policy: PolicyMode,
    pub percentage: Option<u8>,
    /// `rua=` destination URIs, comma separated
    pub aggregate_reports: Option<String>,
    /// `ruf=` destination URIs, comma separated
    pub forensic_reports: Option<String>,
    pub failure_options: Option<String>,
    pub subdomain_policy: Option<PolicyMode>,
    pub spf_alignment: Option<Alignment>,
    pub dkim_alignment: Option<Alignment>,
    /// Tags this model does not interpret, kept in order
    pub other_tags: Vec<(String, String)>,
}

impl DmarcPolicy {
    fn new(policy: PolicyMode) -> Self {
        Self {
            policy,
            percentage: None,
            aggregate_reports: None,
            forensic_reports: None,
            failure_options: None,
            subdomain_policy: None,
            spf_alignment: None,
            dkim_alignment: None,
            other_tags: Vec::new(),
        }
    }

    /// The predefined policy for a rollout stage, reporting to `report_email`
    pub fn for_stage(stage: PolicyStage, report_email: &str) -> Result<Self> {
        let email = report_email.trim();
        if email.is_empty() || !email.contains('@') || email.contains(';') {
            return Err(DmarcError::InvalidPolicy(format!(
                "report address '{report_email}' is not an email address"
            )));
        }
        let mailto = format!("mailto:{email}");

        let policy = match stage {
            PolicyStage::Monitor => Self {
                aggregate_reports: Some(mailto.clone()),
                forensic_reports: Some(mailto),
                failure_options: Some("1".to_string()),
                ..Self::new(PolicyMode::None)
            },
            PolicyStage::Quarantine(pct) => Self {
                percentage: (pct < 100).then_some(pct),
                aggregate_reports: Some(mailto),
                subdomain_policy: Some(PolicyMode::Quarantine),
                ..Self::new(PolicyMode::Quarantine)
            },
            PolicyStage::Reject => Self {
                aggregate_reports: Some(mailto),
                subdomain_policy: Some(PolicyMode::Reject),
                spf_alignment: Some(Alignment::Relaxed),
                dkim_alignment: Some(Alignment::Relaxed),
                ..Self::new(PolicyMode::Reject)
            },
        };

        Ok(policy)
    }

    /// Parse and validate a raw `tag=value; ...` list.
    ///
    /// `v=DMARC1` must come first and `p` second. Tags may not repeat or be empty.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |msg: String| DmarcError::InvalidPolicy(msg);

        let mut tags = Vec::new();
        for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (tag, value) = segment
                .split_once('=')
                .ok_or_else(|| invalid(format!("'{segment}' is not a tag=value pair")))?;
            let (tag, value) = (tag.trim().to_ascii_lowercase(), value.trim());
            if tag.is_empty() || value.is_empty() {
                return Err(invalid(format!("'{segment}' has an empty tag or value")));
            }
            if tags.iter().any(|(t, _): &(String, &str)| *t == tag) {
                return Err(invalid(format!("tag '{tag}' appears more than once")));
            }
            tags.push((tag, value));
        }

        let mut iter = tags.into_iter();
        match iter.next() {
            Some((tag, "DMARC1")) if tag == "v" => {}
            _ => return Err(invalid("policy must start with v=DMARC1".to_string())),
        }
        let mut policy = match iter.next() {
            Some((tag, value)) if tag == "p" => Self::new(value.parse()?),
            _ => return Err(invalid("the second tag must be p=".to_string())),
        };

        for (tag, value) in iter {
            match tag.as_str() {
                "pct" => {
                    let pct = value
                        .parse::<u8>()
                        .ok()
                        .filter(|p| *p <= 100)
                        .ok_or_else(|| invalid(format!("pct must be 0-100, got '{value}'")))?;
                    policy.percentage = Some(pct);
                }
                "rua" | "ruf" => {
                    if value.split(',').any(|uri| !uri.trim().contains(':')) {
                        return Err(invalid(format!("{tag} must be a list of URIs, got '{value}'")));
                    }
                    if tag == "rua" {
                        policy.aggregate_reports = Some(value.to_string());
                    } else {
                        policy.forensic_reports = Some(value.to_string());
                    }
                }
                "fo" => {
                    if value.split(':').any(|o| !matches!(o, "0" | "1" | "d" | "s")) {
                        return Err(invalid(format!("fo must combine 0, 1, d, s, got '{value}'")));
                    }
                    policy.failure_options = Some(value.to_string());
                }
                "sp" => policy.subdomain_policy = Some(value.parse()?),
                "aspf" => policy.spf_alignment = Some(value.parse()?),
                "adkim" => policy.dkim_alignment = Some(value.parse()?),
                "v" | "p" => {
                    return Err(invalid(format!("tag '{tag}' is out of position")));
                }
                _ => policy.other_tags.push((tag, value.to_string())),
            }
        }

        Ok(policy)
    }

    /// Rollout guidance class for this policy
    pub fn stage_mode(&self) -> StageMode {
        StageMode::from(self.policy)
    }

    /// The first aggregate report address without its `mailto:` scheme
    pub fn report_address(&self) -> Option<&str> {
        let first = self.aggregate_reports.as_deref()?.split(',').next()?.trim();
        Some(first.strip_prefix("mailto:").unwrap_or(first))
    }
}

impl fmt::Display for DmarcPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v=DMARC1; p={}", self.policy)?;
        if let Some(pct) = self.percentage {
            write!(f, "; pct={pct}")?;
        }
        if let Some(rua) = &self.aggregate_reports {
            write!(f, "; rua={rua}")?;
        }
        if let Some(ruf) = &self.forensic_reports {
            write!(f, "; ruf={ruf}")?;
        }
        if let Some(fo) = &self.failure_options {
            write!(f, "; fo={fo}")?;
        }
        if let Some(sp) = self.subdomain_policy {
            write!(f, "; sp={sp}")?;
        }
        if let Some(aspf) = self.spf_alignment {
            write!(f, "; aspf={aspf}")?;
        }
        if let Some(adkim) = self.dkim_alignment {
            write!(f, "; adkim={adkim}")?;
        }
        for (tag, value) in &self.other_tags {
            write!(f, "; {tag}={value}")?;
        }
        Ok(())
    }
}

/// Enforcement class shown before the confirmation prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageMode {
    Monitor,
    Quarantine,
    Reject,
}

impl From<PolicyMode> for StageMode {
    fn from(mode: PolicyMode) -> Self {
        match mode {
            PolicyMode::None => StageMode::Monitor,
            PolicyMode::Quarantine => StageMode::Quarantine,
            PolicyMode::Reject => StageMode::Reject,
        }
    }
}

impl StageMode {
    /// Classify a rendered policy by its `p` tag.
    ///
    /// Only the whole `p=` tag counts, so `sp=none` never reads as monitor.
    /// `None` when there is no `p` tag or its value is not a policy mode.
    pub fn classify(policy: &str) -> Option<Self> {
        policy
            .split(';')
            .filter_map(|segment| segment.split_once('='))
            .find(|(tag, _)| tag.trim().eq_ignore_ascii_case("p"))
            .and_then(|(_, value)| value.trim().parse::<PolicyMode>().ok())
            .map(Self::from)
    }

    pub fn headline(&self) -> &'static str {
        match self {
            StageMode::Monitor => "MONITOR MODE - No emails will be blocked",
            StageMode::Quarantine => "QUARANTINE MODE - Some emails may go to spam",
            StageMode::Reject => "REJECT MODE - Non-compliant emails will be blocked",
        }
    }

    pub fn advice(&self) -> &'static str {
        match self {
            StageMode::Monitor => "Safe to apply to all domains",
            StageMode::Quarantine => "Make sure SPF/DKIM are properly configured first",
            StageMode::Reject => "Only use after monitoring reports for 2+ weeks",
        }
    }
}
