//! Console rendering
//!
//! Everything a human reads on stdout: zone lists, stage guidance, the final
//! summary and remediation text. Logs go through `tracing` instead.

use std::fmt::Write;
use std::path::Path;

use crate::policy::StageMode;
use crate::types::{RunTally, Zone};

pub const RULE_WIDTH: usize = 70;

pub fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// Title followed by a horizontal rule
pub fn banner(title: &str) -> String {
    format!("\n{title}\n{}", rule())
}

/// At most `max` characters of the policy, with an ellipsis when cut
pub fn policy_preview(policy: &str, max: usize) -> String {
    if policy.chars().count() > max {
        format!("{}...", policy.chars().take(max).collect::<String>())
    } else {
        policy.to_string()
    }
}

/// Numbered list of zones with their status
pub fn zone_list(heading: &str, zones: &[Zone]) -> String {
    let mut out = format!("{heading}\n");
    for (i, zone) in zones.iter().enumerate() {
        let _ = writeln!(out, "   {}. {} ({})", i + 1, zone.name, zone.status);
    }
    out
}

/// Guidance block for the policy's enforcement class
pub fn stage_guidance(policy: &str) -> String {
    match StageMode::classify(policy) {
        Some(mode) => format!(
            "Current Policy Stage:\n   {}\n   {}",
            mode.headline(),
            mode.advice()
        ),
        None => "Current Policy Stage:\n   UNKNOWN - policy has no recognised p= tag".to_string(),
    }
}

/// Tabulated end-of-run counts and failed domains
pub fn summary(tally: &RunTally, zone_count: usize) -> String {
    let mut out = format!("\n{}\nDMARC Update Summary:\n", rule());
    let _ = writeln!(out, "   {:<15} {:>6}", "Created:", tally.created);
    let _ = writeln!(out, "   {:<15} {:>6}", "Updated:", tally.updated);
    let _ = writeln!(out, "   {:<15} {:>6}", "Failed:", tally.failed);
    let _ = writeln!(
        out,
        "   {:<15} {:>6}",
        "Total Success:",
        format!("{}/{}", tally.successes(), zone_count)
    );

    if !tally.failed_domains.is_empty() {
        out.push_str("\nFailed domains:\n");
        for domain in &tally.failed_domains {
            let _ = writeln!(out, "   - {domain}");
        }
    }

    out.push_str(&rule());
    out
}

/// Next steps after at least one record was written
pub fn follow_up(policy: &str, report_address: Option<&str>) -> String {
    let mut out = String::from("\nSUCCESS: DMARC policies successfully applied!\n");
    if let Some(address) = report_address {
        let _ = writeln!(out, "DMARC reports will be sent to: {address}");
    }

    out.push_str("\nNext Steps:\n");
    let steps: &[&str] = match StageMode::classify(policy) {
        Some(StageMode::Monitor) | None => &[
            "Monitor aggregate reports for 1-2 weeks",
            "Check email deliverability stays strong",
            "Move to --stage quarantine-25 after monitoring",
            "Gradually increase to full protection",
        ],
        Some(StageMode::Quarantine) => &[
            "Watch reports for legitimate mail landing in spam",
            "Raise the quarantine percentage step by step",
            "Move to --stage reject once failures are only spoofed mail",
        ],
        Some(StageMode::Reject) => &[
            "Keep reviewing aggregate reports for new senders",
            "Add SPF/DKIM for any new sending service before it goes live",
        ],
    };
    for (i, step) in steps.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, step);
    }

    out.push_str("\nVerify with: cloudflare-dmarc check\n");
    out
}

/// Shown when no usable credentials are configured
pub fn missing_credentials_help(env_file: &Path) -> String {
    format!(
        "ERROR: No Cloudflare credentials found in environment variables!

Looking for these variables:
   - CLOUDFLARE_API_TOKEN or CF_API_TOKEN (API Token)
   - CLOUDFLARE_API_KEY or CF_API_KEY (Global API Key)
   - CLOUDFLARE_EMAIL or CF_EMAIL (required for API Key)

To fix:
   1. Create {env} in the working directory
   2. Add: CLOUDFLARE_API_TOKEN=your_token_here
   OR
   3. Add: CLOUDFLARE_API_KEY=your_key_here
   4. Add: CLOUDFLARE_EMAIL=your_email@example.com",
        env = env_file.display()
    )
}

/// Shown when the verification call is rejected
pub fn invalid_credentials_help(status: u16, body: &str) -> String {
    format!(
        "ERROR: Credential verification failed: {status}
   Response: {body}

Quick Fix Options:
   A) Create a new API token with Zone:Read and DNS:Edit permissions
   B) Check the token has not expired or been revoked
   C) Set CLOUDFLARE_API_KEY and CLOUDFLARE_EMAIL to use the Global API Key instead"
    )
}

/// Shown when the account has no visible zones
pub fn no_zones_help() -> &'static str {
    "ERROR: No zones found!\n   Check if your API token has Zone:Read and DNS:Edit permissions"
}
