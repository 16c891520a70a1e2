//! PostgreSQL connection handling and schema management.

use deadpool_postgres::{Pool, PoolConfig, Runtime};
use secrecy::{ExposeSecret, SecretString};
use tokio_postgres::NoTls;

use crate::prelude::*;


pub(crate) mod cmd;
mod migrations;
mod query;

pub(crate) use self::migrations::{MigrationPlan, migrate};


#[derive(Debug, confique::Config)]
pub(crate) struct DbConfig {
    /// Database user to connect as.
    #[config(default = "projman")]
    pub(crate) user: String,

    /// Password of `user`.
    pub(crate) password: SecretString,

    /// Hostname or IP of the PostgreSQL server.
    #[config(default = "127.0.0.1")]
    pub(crate) host: String,

    #[config(default = 5432)]
    pub(crate) port: u16,

    /// Name of the database. It has to exist already and use UTF8 encoding.
    #[config(default = "projman")]
    pub(crate) database: String,

    /// Upper bound for simultaneously open connections.
    #[config(default = 16)]
    pub(crate) max_connections: usize,
}

/// A pooled connection.
pub(crate) type Db = deadpool_postgres::ClientWrapper;


/// Creates the connection pool and makes sure the database is reachable and
/// uses UTF8.
pub(crate) async fn create_pool(config: &DbConfig) -> Result<Pool> {
    debug!(
        "Connecting to database 'postgresql://{}@{}:{}/{}'",
        config.user, config.host, config.port, config.database,
    );

    let pool = deadpool_postgres::Config {
        user: Some(config.user.clone()),
        password: Some(config.password.expose_secret().to_owned()),
        host: Some(config.host.clone()),
        port: Some(config.port),
        dbname: Some(config.database.clone()),
        application_name: Some(env!("CARGO_PKG_NAME").into()),
        pool: Some(PoolConfig::new(config.max_connections)),
        ..Default::default()
    }.create_pool(Some(Runtime::Tokio1), NoTls)?;

    let conn = pool.get().await.context("failed to connect to database")?;
    let encoding: String = conn.query_one("show server_encoding", &[])
        .await
        .context("failed to query server encoding")?
        .get(0);
    anyhow::ensure!(
        encoding == "UTF8",
        "database uses encoding '{encoding}', but projman requires UTF8",
    );

    info!("Connected to database '{}' (pool size {})", config.database, config.max_connections);
    Ok(pool)
}
