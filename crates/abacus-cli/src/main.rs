//! Abacus command-line interface.
//!
//! Answers access requests against an attribute-based policy and runs the
//! bulk analyses built on top of it.
//!
//! # Quick Start
//!
//! ```bash
//! # Is alice allowed to read doc1?
//! abacus check policy.abac alice doc1 read
//!
//! # Everything bob may do
//! abacus query policy.abac --subject bob
//!
//! # Decide a file of requests (one `subject,object,action` per line)
//! abacus eval policy.abac requests.txt
//!
//! # Enumerate every permitted request and compare with a reference ACL
//! abacus acl policy.abac --output acl.txt
//! abacus diff reference.txt acl.txt
//! ```

mod commands;
mod style;

use std::path::PathBuf;

use abacus_config::{ConfigLoader, OutputFormat};
use abacus_policy::Strategy;
use anyhow::Result;
use clap::{ArgGroup, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{Context, ScanOptions};

/// Abacus - attribute-based access control decisions and policy analytics.
#[derive(Parser)]
#[command(name = "abacus")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    /// Directory searched for abacus.toml and abacus.local.toml.
    #[arg(long, global = true, default_value = ".")]
    project: PathBuf,

    /// Output format (table, text, json); overrides `output.format`.
    #[arg(long, global = true)]
    format: Option<OutputFormat>,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by the commands that run the bulk scan.
#[derive(Args)]
struct ScanArgs {
    /// Candidate search strategy (brute-force, indexed); overrides `analytics.strategy`.
    #[arg(long)]
    strategy: Option<Strategy>,

    /// Scan on a single thread.
    #[arg(long)]
    sequential: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide a single request and explain the decision.
    Check {
        /// Policy file.
        policy: PathBuf,
        /// Subject (user) identifier.
        subject: String,
        /// Object (resource) identifier.
        object: String,
        /// Action name.
        action: String,
    },

    /// List the permitted requests for a user, resource and/or action.
    #[command(group(
        ArgGroup::new("filter")
            .required(true)
            .multiple(true)
            .args(["subject", "object", "action"])
    ))]
    Query {
        /// Policy file.
        policy: PathBuf,
        /// Only this subject (user).
        #[arg(short, long)]
        subject: Option<String>,
        /// Only this object (resource).
        #[arg(short, long)]
        object: Option<String>,
        /// Only this action.
        #[arg(short, long)]
        action: Option<String>,
    },

    /// Decide a batch of `subject,object,action` request lines.
    Eval {
        /// Policy file.
        policy: PathBuf,
        /// Request file, or `-` for stdin.
        #[arg(default_value = "-")]
        requests: PathBuf,
    },

    /// Enumerate every permitted request (the access control list).
    Acl {
        /// Policy file.
        policy: PathBuf,
        /// Write the ACL to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        scan: ScanArgs,
    },

    /// Rank resources by how many permitted requests target them.
    Resources {
        /// Policy file.
        policy: PathBuf,
        /// Length of each listing; overrides `analytics.top`.
        #[arg(short, long)]
        top: Option<usize>,
        #[command(flatten)]
        scan: ScanArgs,
    },

    /// Show how often the attributes each rule reads were present.
    Coverage {
        /// Policy file.
        policy: PathBuf,
        #[command(flatten)]
        scan: ScanArgs,
    },

    /// Show entity, attribute, rule and permission counts.
    Stats {
        /// Policy file.
        policy: PathBuf,
        #[command(flatten)]
        scan: ScanArgs,
    },

    /// Compare two ACL files.
    Diff {
        /// Reference ACL, or `-` for stdin.
        expected: PathBuf,
        /// ACL to check against the reference.
        actual: PathBuf,
    },

    /// Export a policy as JSON.
    Export {
        /// Policy file.
        policy: PathBuf,
        /// Write JSON to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a policy in canonical text form.
    Fmt {
        /// Policy file.
        policy: PathBuf,
    },

    /// Configuration commands.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration.
    Show,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::new().with_project_dir(&cli.project).load()?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level)),
        )
        .init();

    style::set_no_color(
        cli.no_color || !config.output.color || std::env::var_os("NO_COLOR").is_some(),
    );

    let ctx = Context {
        format: cli.format.unwrap_or(config.output.format),
        config,
    };
    let scan_options = |args: &ScanArgs| ScanOptions {
        strategy: args.strategy.unwrap_or(ctx.config.analytics.strategy),
        parallel: ctx.config.analytics.parallel && !args.sequential,
    };

    match cli.command {
        Commands::Check {
            policy,
            subject,
            object,
            action,
        } => commands::check::run(&ctx, &policy, &subject, &object, &action),
        Commands::Query {
            policy,
            subject,
            object,
            action,
        } => commands::query::run(
            &ctx,
            &policy,
            subject.as_deref(),
            object.as_deref(),
            action.as_deref(),
        ),
        Commands::Eval { policy, requests } => commands::eval::run(&ctx, &policy, &requests),
        Commands::Acl {
            policy,
            output,
            scan,
        } => commands::acl::extract(&ctx, &policy, output.as_deref(), scan_options(&scan)),
        Commands::Resources { policy, top, scan } => {
            commands::report::resources(&ctx, &policy, top, scan_options(&scan))
        }
        Commands::Coverage { policy, scan } => {
            commands::report::coverage(&ctx, &policy, scan_options(&scan))
        }
        Commands::Stats { policy, scan } => {
            commands::report::stats(&ctx, &policy, scan_options(&scan))
        }
        Commands::Diff { expected, actual } => commands::acl::diff(&ctx, &expected, &actual),
        Commands::Export { policy, output } => commands::export::json(&policy, output.as_deref()),
        Commands::Fmt { policy } => commands::export::fmt(&policy),
        Commands::Config(ConfigCommands::Show) => commands::config::show(&ctx),
    }
}
