use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::filter::StatusFilter;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "clear",
    version,
    about = "Clear: command-line client for the Clear to-do service",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "clearrc", global = true)]
    pub clearrc: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create an account and log in
    Register(CredentialArgs),
    /// Log in and store the session
    Login(CredentialArgs),
    /// Forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Done/undone counts from the server
    Stats,
    /// Change the account password
    Passwd {
        #[arg(long)]
        old: String,
        #[arg(long)]
        new: String,
    },
    /// Show the current page of tasks
    List(ListArgs),
    /// Show the next page
    Next,
    /// Show the previous page
    Prev,
    /// Show one task
    Info { task: String },
    /// Create a task
    Add(AddArgs),
    /// Edit fields of a task
    Modify(ModifyArgs),
    /// Mark a task done
    Done { task: String },
    /// Mark a task not done
    Undone { task: String },
    /// Flip a task's completion
    Toggle { task: String },
    /// Delete a task
    Delete { task: String },
    /// Manage categories
    #[command(subcommand)]
    Category(CategoryCommand),
    /// Manage the color theme
    #[command(subcommand)]
    Theme(ThemeCommand),
    /// Client preferences
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Print the client version
    Version,
}

#[derive(Args, Debug, Clone)]
pub struct CredentialArgs {
    pub username: String,
    /// Read from stdin when omitted
    #[arg(short, long)]
    pub password: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(long)]
    pub page: Option<u64>,
    /// Category id or name; empty for all
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long, value_enum)]
    pub status: Option<StatusArg>,
    /// Start date, YYYY-MM-DD
    #[arg(long)]
    pub from: Option<String>,
    /// End date, YYYY-MM-DD
    #[arg(long)]
    pub to: Option<String>,
    #[arg(long)]
    pub search: Option<String>,
    #[arg(long)]
    pub clear_filters: bool,
}

impl ListArgs {
    pub fn changes_filters(&self) -> bool {
        self.clear_filters
            || self.category.is_some()
            || self.status.is_some()
            || self.from.is_some()
            || self.to.is_some()
            || self.search.is_some()
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusArg {
    Todo,
    Done,
    All,
}

impl StatusArg {
    pub fn filter(self) -> Option<StatusFilter> {
        match self {
            StatusArg::Todo => Some(StatusFilter::InProgress),
            StatusArg::Done => Some(StatusFilter::Completed),
            StatusArg::All => None,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    #[arg(required = true, num_args = 1..)]
    pub title: Vec<String>,
    #[arg(long)]
    pub content: Option<String>,
    /// Category id or name
    #[arg(long)]
    pub category: Option<String>,
    /// Date or datetime, `today`, `tomorrow`, `+3d`, `+4h`
    #[arg(long)]
    pub due: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ModifyArgs {
    pub task: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub content: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub due: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CategoryCommand {
    List {
        /// Bypass the cached list
        #[arg(long)]
        refresh: bool,
    },
    Add { name: String },
    Rename { category: String, name: String },
    Delete { category: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ThemeCommand {
    List,
    Current,
    Set {
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },
    /// Re-apply the palette stored in the session
    Init,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SettingsCommand {
    /// Whether commands that need a login fail with a hint
    LoginHint {
        #[arg(value_enum)]
        state: Switch,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    On,
    Off,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls `rc.key=value` / `rc.key:value` overrides out of the argument list
/// before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> PreprocessedArgs {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        let parsed = s.strip_prefix("rc.").and_then(|rest| {
            rest.split_once('=')
                .or_else(|| rest.split_once(':'))
                .map(|(k, v)| (format!("rc.{k}"), v.to_string()))
        });

        match parsed {
            Some((k, v)) => {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
            }
            None => cleaned.push(arg),
        }
    }

    PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    }
}
