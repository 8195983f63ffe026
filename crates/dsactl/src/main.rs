//! dsactl entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use dsa_types::StringSet;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dsactl::{commands, DsactlConfig, System, DEFAULT_CONFIG_PATH};

/// Inspect and drive a DSA master
///
/// Every invocation builds the simulated system described by the
/// configuration file from scratch, attaches the master, runs one command
/// and detaches again. Nothing persists between invocations.
#[derive(Parser, Debug)]
#[command(name = "dsactl")]
#[command(author, version, about)]
struct Args {
    /// Topology description
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a control attribute
    Show { attr: String },
    /// Write a control attribute
    ///
    /// The write applies to this invocation's system only; a later run
    /// starts again from the configuration file.
    Store { attr: String, value: String },
    /// Query the merged ethtool view of the master
    Ethtool {
        #[command(subcommand)]
        query: EthtoolQuery,
    },
    /// Hardware timestamping ioctls
    Ioctl {
        #[command(subcommand)]
        request: IoctlRequest,
    },
    /// List loaded tagging protocols
    Taggers,
}

#[derive(Subcommand, Debug)]
enum EthtoolQuery {
    /// Register dump
    Regs,
    /// Statistics with values
    Stats {
        #[arg(value_enum, default_value = "stats")]
        set: SetArg,
    },
    /// String set names
    Strings {
        #[arg(value_enum)]
        set: SetArg,
    },
}

#[derive(Subcommand, Debug)]
enum IoctlRequest {
    /// Read or set the master's timestamping configuration
    Hwtstamp {
        /// Enable (true) or disable (false) timestamping
        #[arg(long)]
        set: Option<bool>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SetArg {
    Stats,
    PhyStats,
    PrivFlags,
    Features,
}

impl From<SetArg> for StringSet {
    fn from(arg: SetArg) -> Self {
        match arg {
            SetArg::Stats => StringSet::Stats,
            SetArg::PhyStats => StringSet::PhyStats,
            SetArg::PrivFlags => StringSet::PrivFlags,
            SetArg::Features => StringSet::Features,
        }
    }
}

/// Initialize tracing/logging.
fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

fn run(args: Args) -> anyhow::Result<String> {
    let config = DsactlConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    config.validate()?;

    let system = System::build(&config).context("building switch tree")?;
    system.attach().context("attaching master")?;
    info!(master = %config.master.name, "Master attached");

    let output = match args.command {
        Command::Show { attr } => commands::show(&system, &attr)?,
        Command::Store { attr, value } => {
            let consumed = commands::store(&system, &attr, &value)?;
            info!(attr = %attr, consumed, "Stored attribute");
            String::new()
        }
        Command::Ethtool { query } => match query {
            EthtoolQuery::Regs => commands::ethtool_regs(&system)?,
            EthtoolQuery::Stats { set } => commands::ethtool_stats(&system, set.into())?,
            EthtoolQuery::Strings { set } => commands::ethtool_strings(&system, set.into())?,
        },
        Command::Ioctl {
            request: IoctlRequest::Hwtstamp { set },
        } => commands::hwtstamp(&system, set)?,
        Command::Taggers => commands::taggers(&system)?,
    };

    system.detach().context("detaching master")?;
    Ok(output)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    match run(args) {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("dsactl: {e:#}");
            ExitCode::FAILURE
        }
    }
}
