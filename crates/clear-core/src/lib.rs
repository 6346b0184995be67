pub mod api;
pub mod app;
pub mod category;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod notify;
pub mod render;
pub mod session;
pub mod task;
pub mod tasks;
pub mod theme;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info, warn};

pub use app::App;
pub use error::{ClientError, ClientResult};

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let pre = cli::preprocess_args(&raw_args);
    let cli = cli::GlobalCli::parse_from(pre.cleaned_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(verbose = cli.verbose, quiet = cli.quiet, "starting clear CLI");
    debug!(?pre.rc_overrides, "preprocessed rc overrides");

    let mut cfg = config::Config::load(cli.clearrc.as_deref())?;
    cfg.apply_overrides(
        pre.rc_overrides
            .into_iter()
            .chain(cli.rc_overrides.into_iter().map(|kv| (kv.key, kv.value))),
    );

    let data_dir = config::resolve_data_dir(&cfg, cli.data.as_deref())
        .context("failed to resolve data directory")?;
    let renderer = render::Renderer::new(&cfg)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let mut app = App::open(cfg, &data_dir)?;
    app.init_theme();

    let command = cli
        .command
        .unwrap_or_else(|| cli::Command::List(cli::ListArgs::default()));
    let result = runtime.block_on(commands::dispatch(&mut app, &renderer, command));

    renderer.print_toasts(&app.notifier.drain())?;
    if app.auth.is_authenticated()
        && let Err(err) = app.save_cursor()
    {
        warn!(error = %err, "failed to save page cursor");
    }

    info!("done");
    result
}
