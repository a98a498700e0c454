// SPDX-License-Identifier: PMPL-1.0-or-later

//! pci-assess: run PCI DSS requirement plans against cloud projects
//!
//! Exit codes: 0 compliant, partially compliant or nothing assessable;
//! 2 gate abort; 3 non-compliant; 1 any other error.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::*;
use pci_assess::assess;
use pci_assess::cloud::CloudCli;
use pci_assess::gate::{AssumeNo, AssumeYes, Confirm, TerminalConfirm};
use pci_assess::plan::RequirementPlan;
use pci_assess::profile::AssessmentProfile;
use pci_assess::report::cleanup;
use pci_assess::report::consolidate::{self, ConsolidateOptions};
use pci_assess::scope::{ScopeDecl, ScopeResolver};
use pci_assess::types::ComplianceLabel;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pci-assess")]
#[command(version)]
#[command(about = "PCI DSS assessment orchestration over a cloud CLI")]
#[command(long_about = None)]
struct Cli {
    /// Assessment profile (JSON or YAML); built-in gcloud defaults otherwise
    #[arg(long, global = true, value_name = "FILE")]
    profile: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ScopeArgs {
    /// Project to assess (defaults to the CLI's configured project)
    #[arg(long, conflicts_with = "organization")]
    project: Option<String>,

    /// Organization whose projects are all assessed
    #[arg(long)]
    organization: Option<String>,

    /// Parallel workers for per-project commands
    #[arg(long)]
    workers: Option<usize>,

    /// Per-command timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

impl ScopeArgs {
    fn decl(&self) -> ScopeDecl {
        match &self.organization {
            Some(id) => ScopeDecl::Organization { id: id.clone() },
            None => ScopeDecl::Single {
                target: self.project.clone(),
            },
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a requirement plan and write its HTML report
    Assess {
        /// Requirement plan (JSON or YAML)
        #[arg(value_name = "PLAN")]
        plan: PathBuf,

        #[command(flatten)]
        scope: ScopeArgs,

        /// Report destination
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Continue with partial permission coverage without asking
        #[arg(short, long, conflicts_with = "no_input")]
        yes: bool,

        /// Never prompt; decline to continue with partial coverage
        #[arg(long)]
        no_input: bool,
    },

    /// Probe a plan's permissions without running any check
    Probe {
        #[arg(value_name = "PLAN")]
        plan: PathBuf,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// List the projects in scope
    Targets {
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Consolidate requirement reports in a directory into one summary
    Summary {
        /// Directory holding pci_req<N>*.html reports
        #[arg(value_name = "DIR")]
        directory: PathBuf,

        /// Summary destination
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the summary as JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// Leave findings caused by missing access out of the summary
        #[arg(long)]
        strip_access_denied: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("PCI_ASSESS_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    // Drop never runs when a signal ends the process.
    if let Err(err) = ctrlc::set_handler(|| {
        for path in cleanup::remove_open_partials() {
            eprintln!("{} removed {}", "interrupted:".yellow().bold(), path.display());
        }
        std::process::exit(130);
    }) {
        tracing::warn!(error = %err, "could not install interrupt handler");
    }

    match run(Cli::parse()) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<u8> {
    let profile = match &cli.profile {
        Some(path) => AssessmentProfile::load(path)?,
        None => AssessmentProfile::default(),
    };

    match cli.command {
        Commands::Assess {
            plan,
            scope,
            output,
            yes,
            no_input,
        } => {
            let plan = RequirementPlan::load(&plan)?;
            let cloud = CloudCli::from_profile(apply_overrides(profile, &scope)?);
            let destination = output.unwrap_or_else(|| default_report_path(&plan));
            let mut confirm: Box<dyn Confirm> = if yes {
                Box::new(AssumeYes)
            } else if no_input {
                Box::new(AssumeNo)
            } else {
                Box::new(TerminalConfirm)
            };

            let outcome = assess::run(&cloud, &plan, &scope.decl(), &destination, confirm.as_mut())?;
            Ok(match outcome.metrics {
                None => 2,
                Some(metrics) if metrics.label == ComplianceLabel::NonCompliant => 3,
                Some(_) => 0,
            })
        }

        Commands::Probe { plan, scope } => {
            let plan = RequirementPlan::load(&plan)?;
            let cloud = CloudCli::from_profile(apply_overrides(profile, &scope)?);
            let result = assess::probe_permissions(&cloud, &plan, &scope.decl())?;
            Ok(if result.coverage_percent() >= cloud.profile().low_water_mark {
                0
            } else {
                2
            })
        }

        Commands::Targets { scope } => {
            let cloud = CloudCli::from_profile(apply_overrides(profile, &scope)?);
            let resolver = ScopeResolver::new(&cloud);
            let resolved = resolver.resolve(&scope.decl())?;
            let targets = resolver.list_targets(&resolved)?;
            println!("{}", resolver.describe(&resolved).bold());
            for target in targets {
                println!("  {}", target.id);
            }
            Ok(0)
        }

        Commands::Summary {
            directory,
            output,
            json,
            strip_access_denied,
        } => {
            let options = ConsolidateOptions {
                strip_access_denied,
                ..Default::default()
            };
            let summary = consolidate::collect(&directory, &options)?;
            let destination = output.unwrap_or_else(|| directory.join("pci_compliance_summary.html"));
            consolidate::write(&summary, &destination, json.as_deref())?;
            println!(
                "Overall compliance: {} ({})",
                summary.overall.percent_display().bold(),
                summary.overall.label
            );
            println!("Summary saved to: {}", destination.display());
            Ok(match summary.overall.label {
                ComplianceLabel::NonCompliant => 3,
                _ => 0,
            })
        }
    }
}

fn apply_overrides(mut profile: AssessmentProfile, scope: &ScopeArgs) -> Result<AssessmentProfile> {
    if let Some(workers) = scope.workers {
        profile.workers = workers;
    }
    if let Some(timeout) = scope.timeout {
        profile.command_timeout_secs = timeout;
    }
    profile.validate()?;
    Ok(profile)
}

fn default_report_path(plan: &RequirementPlan) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    Path::new("reports").join(format!("pci_req{}_report_{}.html", plan.requirement, stamp))
}
