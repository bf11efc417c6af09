use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::Configuration;
use common::cli::{CommonArgs, CommonCommands, utils};
use common::logging;
use lifecycle::{DurationSpec, LifecycleRunner, RunSettings};
use provider_ec2::Ec2Provider;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "snapper")]
#[command(about = "Snapper - snapshots tagged EBS volumes and purges expired snapshots")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[arg(long, help = "Evaluate everything but create and delete nothing")]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<SnapperCommands>,
}

#[derive(Subcommand)]
enum SnapperCommands {
    #[command(flatten)]
    Common(CommonCommands),
}

impl Default for SnapperCommands {
    fn default() -> Self {
        Self::Common(CommonCommands::Run)
    }
}

fn run_settings(config: &Configuration) -> RunSettings {
    RunSettings {
        tag_name: config.snapper.tag_name.clone(),
        default_retention: config.snapper.retain.clone(),
        pause: config.snapper.pause,
        dry_run: config.snapper.dry_run,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = utils::load_config(cli.common.config.as_ref())?;
    if cli.dry_run {
        config.snapper.dry_run = true;
    }

    logging::init_logging(&cli.common, &config.logging)?;

    let command = cli.command.unwrap_or_default();
    let SnapperCommands::Common(ref common_cmd) = command;
    if utils::handle_common_command(common_cmd, &config)? {
        return Ok(());
    }

    config.validate().context("Invalid configuration")?;

    if let Err(e) = config.snapper.retain.parse::<DurationSpec>() {
        tracing::warn!(
            retain = %config.snapper.retain,
            error = %e,
            fallback = %DurationSpec::Default,
            "Default retention is not a valid expression, falling back"
        );
    }

    if config.snapper.dry_run {
        tracing::info!("Dry-run mode: no snapshots will be created or deleted");
    }
    tracing::info!(
        region = %config.aws.region,
        max_retries = config.aws.max_retries,
        static_credentials = config.aws.static_credentials().is_some(),
        "Connecting to EC2"
    );

    let provider = Ec2Provider::connect(&config.aws).await;
    let mut runner = LifecycleRunner::new(Arc::new(provider), run_settings(&config));

    let report = runner
        .run()
        .await
        .context("Snapshot lifecycle run aborted")?;

    if report.summary.total_failures() > 0 {
        tracing::warn!(
            run_id = %report.run_id,
            failures = report.summary.total_failures(),
            "Run completed with failures, see log for details"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_dry_run_flag_parses() {
        let cli = Cli::parse_from(["snapper", "--dry-run", "-c", "snapper.yaml"]);
        assert!(cli.dry_run);
        assert!(cli.command.is_none());

        let cli = Cli::parse_from(["snapper", "validate"]);
        assert!(matches!(
            cli.command,
            Some(SnapperCommands::Common(CommonCommands::Validate))
        ));
    }

    #[test]
    fn test_run_settings_from_configuration() {
        let mut config = Configuration::default();
        config.snapper.tag_name = "Nightly".to_string();
        config.snapper.retain = "2.days".to_string();
        config.snapper.pause = Duration::from_secs(1);
        config.snapper.dry_run = true;

        let settings = run_settings(&config);

        assert_eq!(settings.tag_name, "Nightly");
        assert_eq!(settings.default_retention, "2.days");
        assert_eq!(settings.pause, Duration::from_secs(1));
        assert!(settings.dry_run);
    }
}
