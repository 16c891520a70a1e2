use secrecy::ExposeSecret;
use std::{io, os::unix::process::CommandExt, process};
use tokio_postgres::IsolationLevel;

use crate::{config::Config, prelude::*, util::Never};
use super::{Db, DbConfig, create_pool, query};


#[derive(Debug, clap::Subcommand)]
pub(crate) enum DbCommand {
    /// Applies all pending migrations. This also happens automatically when
    /// the server starts.
    Migrate,

    /// Drops all tables in the `public` schema, deleting all stored users,
    /// clients and projects. Asks for confirmation first.
    Clear,

    /// `db clear` followed by `db migrate`.
    Reset,

    /// Opens a `psql` prompt connected to the configured database. `psql`
    /// has to be installed and in your `PATH`.
    Console,
}

pub(crate) async fn run(cmd: &DbCommand, config: &Config) -> Result<()> {
    if let DbCommand::Console = cmd {
        match open_console(&config.db)? {}
    }

    let pool = create_pool(&config.db).await?;
    let mut db = pool.get().await?;

    match cmd {
        DbCommand::Migrate => super::migrate(&mut db).await,
        DbCommand::Clear => clear(&mut db, &config.db).await,
        DbCommand::Reset => {
            clear(&mut db, &config.db).await?;
            super::migrate(&mut db).await
        }
        DbCommand::Console => Ok(()),
    }
}


/// Drops every table of the `public` schema in one transaction, after showing
/// what would be lost and asking the user to type "yes".
async fn clear(db: &mut Db, config: &DbConfig) -> Result<()> {
    let tx = db.build_transaction()
        .isolation_level(IsolationLevel::Serializable)
        .start()
        .await?;

    let tables = query::all_table_names(&*tx).await?;
    if tables.is_empty() {
        info!("Database '{}' contains no tables, nothing to clear", config.database);
        return Ok(());
    }

    warn!("About to drop all tables of database '{}'", config.database);
    println!();
    match hostname::get().ok().and_then(|name| name.into_string().ok()) {
        Some(name) => println!("Running on:  {name}"),
        None => println!("Running on:  <unknown host>"),
    }
    println!("Database:    {}@{}:{}/{}", config.user, config.host, config.port, config.database);
    println!();
    println!("Tables that will be dropped:");
    for table in &tables {
        let rows: i64 = tx
            .query_one(&*format!("select count(*) from \"{table}\""), &[])
            .await?
            .get(0);
        println!("  • {table}: {rows} rows");
    }
    println!();
    println!("This deletes all data irrevocably. Type 'yes' to continue.");
    crate::cmd::prompt_for_yes()?;

    for table in &tables {
        tx.execute(&*format!("drop table if exists \"{table}\" cascade"), &[])
            .await
            .context(format!("failed to drop table '{table}'"))?;
    }
    tx.commit().await.context("failed to commit transaction")?;
    info!("Dropped {} tables", tables.len());

    Ok(())
}

/// Replaces this process with `psql`. Only returns if that fails.
fn open_console(config: &DbConfig) -> Result<Never> {
    use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

    let uri = format!(
        "postgresql://{}:{}@{}:{}/{}",
        utf8_percent_encode(&config.user, NON_ALPHANUMERIC),
        utf8_percent_encode(config.password.expose_secret(), NON_ALPHANUMERIC),
        config.host,
        config.port,
        utf8_percent_encode(&config.database, NON_ALPHANUMERIC),
    );

    let err = process::Command::new("psql").arg(uri).exec();
    let hint = match err.kind() {
        io::ErrorKind::NotFound => "could not find `psql`, is it installed and in your `PATH`?",
        io::ErrorKind::PermissionDenied => "not allowed to execute `psql`",
        _ => "failed to start `psql`",
    };
    Err(err).context(hint)
}
