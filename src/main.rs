//! projman: a GraphQL API for clients, projects and users.

use clap::Parser;
use std::{env, process, sync::Arc};

use crate::{
    args::{Args, Command},
    config::Config,
    prelude::*,
    store::{EntityStore, MemoryStore, PgStore},
};

mod api;
mod args;
mod cmd;
mod config;
mod db;
mod http;
mod logger;
mod model;
mod prelude;
mod store;
mod util;


#[tokio::main]
async fn main() {
    let Err(e) = run().await else {
        return;
    };

    // The log might go to a file only, so record it there as well.
    error!("{e:?}");

    eprintln!();
    bunt::eprintln!("{$red+bold}✘ projman failed:{/$} {[yellow+intense]}", e);
    let mut causes = e.chain().skip(1).peekable();
    if causes.peek().is_some() {
        bunt::eprintln!("{$red+italic}because:{/$}");
    }
    for (depth, cause) in causes.enumerate() {
        eprintln!("{:indent$}  ‣ {cause}", "", indent = depth * 2);
    }

    process::exit(1);
}

async fn run() -> Result<()> {
    // Backtraces are enabled unless explicitly configured otherwise.
    if env::var_os("RUST_BACKTRACE").is_none() {
        env::set_var("RUST_BACKTRACE", "1");
    }

    let args = Args::parse();
    bunt::set_stdout_color_choice(args.stdout_color());
    bunt::set_stderr_color_choice(args.stderr_color());

    match &args.cmd {
        Command::Serve { in_memory, shared } => {
            let config = load_config_and_init_logger(shared, &args)?;
            serve(config, *in_memory).await
        }
        Command::Db { cmd, shared } => {
            let config = load_config_and_init_logger(shared, &args)?;
            db::cmd::run(cmd, &config).await
        }
        Command::Check { shared } => cmd::check::run(shared, &args).await,
        Command::WriteConfig { target } => config::write_template(target.as_ref()),
        Command::ExportApiSchema { target } => cmd::export_api_schema::run(target.as_deref()),
    }
}

/// Sets up the store (migrating the database first) and runs the HTTP server.
async fn serve(config: Config, in_memory: bool) -> Result<()> {
    info!("Starting projman {}", env!("CARGO_PKG_VERSION"));
    trace!("Configuration: {config:#?}");

    let store: Arc<dyn EntityStore> = if in_memory {
        warn!("Using in-memory store, nothing will survive a restart");
        Arc::new(MemoryStore::new())
    } else {
        let pool = db::create_pool(&config.db).await
            .context("failed to set up database (is PostgreSQL running?)")?;
        let mut conn = pool.get().await?;
        db::migrate(&mut conn).await.context("failed to migrate database")?;
        drop(conn);
        Arc::new(PgStore::new(pool))
    };

    http::serve(config.http, api::root_node(), store).await
        .context("HTTP server failed")
}

/// Loads the configuration from `--config` or the default locations, then
/// sets up logging as configured there.
fn load_config_and_init_logger(shared: &args::Shared, args: &Args) -> Result<Config> {
    let (config, path) = match &shared.config {
        Some(path) => Config::load_from(path)
            .map(|config| (config, path.clone()))
            .context(format!("failed to load config from '{}'", path.display()))?,
        None => Config::from_env_or_default_locations()?,
    };

    logger::init(&config.log, args.stdout_color(), args.cmd_name())?;
    info!("Loaded config from '{}'", path.display());

    Ok(config)
}
