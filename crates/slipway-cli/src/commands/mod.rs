//! CLI command implementations.

use std::path::Path;

use anyhow::{Context, Result};
use slipway_config::parse_release_config;
use slipway_core::RunId;
use slipway_core::event::{Event, EventKind};
use slipway_core::stage::Credentials;
use slipway_docker::{BinfmtInstaller, BuildxBuilder, DockerLogin, HostTestGate};
use slipway_pipeline::{ReleasePipeline, RunOutcome, RunSpec};

pub struct PublishArgs {
    pub config_path: String,
    pub event_kind: EventKind,
    pub git_ref: String,
    pub username: String,
    pub password: String,
    pub push: bool,
}

/// Run the release pipeline for one source event.
pub async fn publish(args: PublishArgs) -> Result<()> {
    let content = std::fs::read_to_string(&args.config_path)
        .with_context(|| format!("Failed to read config file: {}", args.config_path))?;

    let config = parse_release_config(&content)
        .with_context(|| format!("Failed to parse release config: {}", args.config_path))?;

    // Paths in the config are relative to the config file's directory.
    let config_dir = Path::new(&args.config_path)
        .parent()
        .map(|p| {
            if p.as_os_str().is_empty() {
                Path::new(".")
            } else {
                p
            }
        })
        .unwrap_or(Path::new("."));

    let context_dir = config_dir
        .join(&config.image.context)
        .canonicalize()
        .context("Failed to resolve build context directory")?;
    let dockerfile = context_dir.join(&config.image.dockerfile);

    let run_id = RunId::new();
    let event = Event::new(args.event_kind, args.git_ref);
    let credentials = Credentials::new(args.username, args.password);

    let spec = RunSpec {
        event,
        registry: config.registry,
        primary_branch: config.primary_branch,
        image_name: config.image.name,
        dockerfile,
        context: context_dir.clone(),
        platforms: config.image.platforms,
        push: args.push,
    };

    let pipeline = ReleasePipeline::new(
        run_id,
        DockerLogin::new(),
        HostTestGate::new(config.test_command, &context_dir)?,
        BinfmtInstaller::new(run_id)?,
        BuildxBuilder::new(run_id),
    );

    let report = pipeline.run(&spec, credentials).await;

    match report.outcome {
        RunOutcome::Completed(result) => {
            let action = if result.pushed { "Published" } else { "Built" };
            println!(
                "✓ {} {} for {} platform(s) in {:?}",
                action,
                result.image,
                result.platforms.len(),
                result.duration
            );
            if let Some(digest) = result.digest {
                println!("  digest: {}", digest);
            }
            Ok(())
        }
        RunOutcome::Skipped => {
            println!("⊘ Event does not qualify for publishing; nothing to do");
            Ok(())
        }
        RunOutcome::Failed { stage, error } => {
            anyhow::bail!("release run failed during {}: {}", stage, error)
        }
    }
}

/// Parse and validate a release configuration without running anything.
pub fn validate(path: &str) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    match parse_release_config(&content) {
        Ok(config) => {
            println!(
                "Configuration is valid: project '{}', {} platform(s)",
                config.project,
                config.image.platforms.len()
            );
            Ok(())
        }
        Err(e) => {
            println!("Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}
