//! Cloudflare DMARC Rollout
//!
//! Publishes one DMARC policy to every zone in a Cloudflare account.
//! Credentials come from the environment or `.env.local`.
//!
//! # Usage
//! ```bash
//! # Stage 1: monitor only
//! cloudflare-dmarc --report-email dmarc@example.com
//!
//! # Later stages
//! cloudflare-dmarc apply --stage quarantine-25 --report-email dmarc@example.com
//! cloudflare-dmarc apply --stage reject --report-email dmarc@example.com
//!
//! # Show current records without changing anything
//! cloudflare-dmarc check
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use cloudflare_dmarc::{
    check, report, BulkUpdater, CloudflareClient, ConsolePrompt, Credentials, DmarcError,
    DmarcPolicy, PolicyStage, RunState, Settings,
};

// ============================================================
// CLI Definition
// ============================================================

#[derive(Debug, Parser)]
#[command(name = "cloudflare-dmarc")]
#[command(about = "Bulk DMARC record rollout for Cloudflare zones", long_about = None)]
#[command(version)]
struct Cli {
    /// Env file consulted for settings missing from the environment
    #[arg(long, default_value = ".env.local", global = true)]
    env_file: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    apply: ApplyArgs,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create or replace the DMARC record in every zone (default)
    Apply(ApplyArgs),

    /// Show each zone's current DMARC record without changing anything
    Check,
}

/// Each option falls back to a `DMARC_*` setting from the environment or env file.
#[derive(Debug, Default, Args)]
struct ApplyArgs {
    /// Rollout stage: monitor, quarantine-<pct>, quarantine, reject [DMARC_STAGE]
    #[arg(long)]
    stage: Option<PolicyStage>,

    /// Address receiving aggregate (and, when monitoring, forensic) reports [DMARC_REPORT_EMAIL]
    #[arg(long)]
    report_email: Option<String>,

    /// Raw DMARC policy, used instead of the stage presets [DMARC_POLICY]
    #[arg(long)]
    policy: Option<String>,
}

impl ApplyArgs {
    fn is_empty(&self) -> bool {
        self.stage.is_none() && self.report_email.is_none() && self.policy.is_none()
    }

    /// Fill unset options from options given before the subcommand
    fn or(self, fallback: ApplyArgs) -> Self {
        Self {
            stage: self.stage.or(fallback.stage),
            report_email: self.report_email.or(fallback.report_email),
            policy: self.policy.or(fallback.policy),
        }
    }

    /// Resolve the policy. Flags win over settings.
    fn build_policy(&self, settings: &Settings) -> Result<DmarcPolicy> {
        if let Some(raw) = self.policy.as_deref().or_else(|| settings.get("DMARC_POLICY")) {
            return DmarcPolicy::parse(raw).context("--policy is not a valid DMARC record");
        }

        let stage = match (self.stage, settings.get("DMARC_STAGE")) {
            (Some(stage), _) => stage,
            (None, Some(raw)) => raw.parse().context("DMARC_STAGE is not a valid stage")?,
            (None, None) => PolicyStage::Monitor,
        };

        let Some(email) = self
            .report_email
            .as_deref()
            .or_else(|| settings.get("DMARC_REPORT_EMAIL"))
        else {
            bail!("--report-email (or DMARC_REPORT_EMAIL) is required unless --policy is given");
        };

        DmarcPolicy::for_stage(stage, email).context("Failed to build DMARC policy")
    }
}

impl Cli {
    /// The command to run. Without a subcommand the top-level options drive `apply`.
    fn into_command(self) -> Result<Commands> {
        match self.command {
            None => Ok(Commands::Apply(self.apply)),
            Some(Commands::Apply(args)) => Ok(Commands::Apply(args.or(self.apply))),
            Some(Commands::Check) if self.apply.is_empty() => Ok(Commands::Check),
            Some(Commands::Check) => {
                bail!("--stage, --report-email and --policy cannot be used with check")
            }
        }
    }
}

// ============================================================
// Main Entry Point
// ============================================================

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("🚀 Cloudflare DMARC rollout starting...");
    let settings = Settings::load(&cli.env_file)?;
    let env_file = cli.env_file.clone();
    let command = cli.into_command()?;

    match command {
        Commands::Apply(args) => {
            let policy = args.build_policy(&settings)?;
            info!(policy = %policy, mode = ?policy.stage_mode(), "DMARC policy selected");

            println!("{}", report::banner("Cloudflare DMARC Bulk Updater"));
            let Some(client) = connect(&settings, &env_file).await? else {
                return Ok(ExitCode::FAILURE);
            };

            let updater = BulkUpdater::new(client, policy);
            let run = updater.run(&ConsolePrompt).await?;

            if run.state == RunState::NoZones {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Check => {
            println!("{}", report::banner("Cloudflare DMARC Check"));
            let Some(client) = connect(&settings, &env_file).await? else {
                return Ok(ExitCode::FAILURE);
            };

            let audit = check::audit(&client).await;
            if audit.zones.is_empty() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Resolve and verify credentials. `None` means guidance was printed and the
/// run should stop.
async fn connect(settings: &Settings, env_file: &Path) -> Result<Option<CloudflareClient>> {
    println!("Checking Cloudflare credentials...");

    let credentials = match Credentials::resolve(settings) {
        Ok(credentials) => credentials,
        Err(DmarcError::MissingCredentials) => {
            println!("{}", report::missing_credentials_help(env_file));
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let account_id = settings.account_id().map(str::to_string);
    info!(
        auth = credentials.kind(),
        account_filter = account_id.is_some(),
        "Using Cloudflare credentials"
    );

    let client = CloudflareClient::new(&credentials, account_id)?;
    match client.verify_credentials().await {
        Ok(()) => {
            info!("✅ Credentials verified");
            println!("SUCCESS: Credentials verified successfully!");
        }
        Err(DmarcError::InvalidCredentials { status, body }) => {
            println!("{}", report::invalid_credentials_help(status, &body));
            return Ok(None);
        }
        Err(e) => return Err(e).context("Failed to reach the Cloudflare API"),
    }

    Ok(Some(client))
}
