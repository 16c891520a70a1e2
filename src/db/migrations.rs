//! Embedded schema migrations.
//!
//! Migrations live in `migrations/NN-name.sql` and are applied in order. The
//! ID of a migration is its position in [`MIGRATIONS`], starting at 1. Each
//! applied migration is recorded in `__db_migrations` together with its
//! script, so we notice when the database was set up by a different version
//! of projman.

use deadpool_postgres::Transaction;
use std::{num::NonZeroU64, time::Duration};
use tokio_postgres::{IsolationLevel, error::SqlState};

use crate::prelude::*;
use super::{Db, query};


const META_TABLE: &str = "__db_migrations";

struct Migration {
    name: &'static str,
    script: &'static str,
}

macro_rules! migrations {
    ($($file:literal),+ $(,)?) => {
        &[$(
            Migration {
                name: $file,
                script: include_str!(concat!("migrations/", $file, ".sql")),
            }
        ),+]
    };
}

/// All migrations in the order they are applied. Never change or reorder
/// existing entries; only append new ones.
static MIGRATIONS: &[Migration] = migrations![
    "01-users",
    "02-clients",
    "03-projects",
];


/// What needs to happen to bring the database schema up to date.
#[derive(Debug)]
pub(crate) enum MigrationPlan {
    /// Nothing exists yet: create the meta table, then apply all migrations.
    EmptyDb,

    /// All known migrations are applied.
    UpToDate,

    /// The last `new_migrations` migrations still have to be applied.
    Migrate {
        new_migrations: NonZeroU64,
    },
}

impl MigrationPlan {
    /// Inspects the database and compares the applied migrations with the
    /// embedded ones. Fails if the database is in a state we don't know how
    /// to handle. Does not modify anything.
    pub(crate) async fn build(tx: &Transaction<'_>) -> Result<Self> {
        if !query::does_table_exist(&**tx, META_TABLE).await? {
            let tables = query::all_table_names(&**tx).await?;
            anyhow::ensure!(
                tables.is_empty(),
                "table '{META_TABLE}' does not exist, but the database contains other \
                    tables ({}). Refusing to touch a database not set up by projman.",
                tables.join(", "),
            );

            return Ok(Self::EmptyDb);
        }

        let applied = tx
            .query(&*format!("select id, name, script from {META_TABLE} order by id"), &[])
            .await
            .context(format!("failed to read '{META_TABLE}'"))?;

        if applied.len() > MIGRATIONS.len() {
            bail!(
                "{} migrations are applied to the database, but this projman binary only \
                    knows {}. Did you downgrade?",
                applied.len(),
                MIGRATIONS.len(),
            );
        }

        for (i, (row, known)) in applied.iter().zip(MIGRATIONS).enumerate() {
            let id: i64 = row.get(0);
            let name: &str = row.get(1);
            let script: &str = row.get(2);

            anyhow::ensure!(
                id == i as i64 + 1,
                "applied migrations are not numbered consecutively: expected ID {}, found {id}",
                i + 1,
            );

            if script != known.script {
                debug!("Script of migration '{name}' as stored in the database:\n{script}");
                bail!(
                    "applied migration '{name}' does not match migration '{}' of this \
                        projman binary",
                    known.name,
                );
            }
        }

        let pending = (MIGRATIONS.len() - applied.len()) as u64;
        Ok(match NonZeroU64::new(pending) {
            None => Self::UpToDate,
            Some(new_migrations) => Self::Migrate { new_migrations },
        })
    }

    /// Applies this plan inside the given transaction.
    pub(crate) async fn execute(&self, tx: &Transaction<'_>) -> Result<()> {
        let pending = match self {
            Self::UpToDate => {
                info!("Database schema is up to date, no migrations to apply");
                return Ok(());
            }
            Self::EmptyDb => {
                info!("Database is empty, creating '{META_TABLE}'");
                tx.batch_execute(include_str!("db-migrations.sql"))
                    .await
                    .context(format!("failed to create '{META_TABLE}'"))?;
                MIGRATIONS.len()
            }
            Self::Migrate { new_migrations } => new_migrations.get() as usize,
        };

        info!("Applying {pending} migrations...");
        let first = MIGRATIONS.len() - pending;
        for (idx, migration) in MIGRATIONS.iter().enumerate().skip(first) {
            debug!("Applying migration '{}'", migration.name);
            trace!("Migration script:\n{}", migration.script);

            tx.batch_execute(migration.script)
                .await
                .context(format!("migration '{}' failed", migration.name))?;

            let record = format!(
                "insert into {META_TABLE} (id, name, applied_on, script) \
                    values ($1, $2, now() at time zone 'utc', $3)"
            );
            tx.execute(&*record, &[&(idx as i64 + 1), &migration.name, &migration.script])
                .await
                .context(format!("failed to record migration '{}'", migration.name))?;
        }
        info!("Applied {pending} migrations, database schema is up to date");

        Ok(())
    }
}


/// Brings the database schema up to date, applying all missing migrations.
///
/// Runs in a serializable transaction. If several processes start at the same
/// time, only one of them commits; the others retry and then find nothing
/// left to do.
pub(crate) async fn migrate(db: &mut Db) -> Result<()> {
    const RETRY_DELAY: Duration = Duration::from_millis(500);

    loop {
        let tx = db.build_transaction()
            .isolation_level(IsolationLevel::Serializable)
            .start()
            .await?;

        MigrationPlan::build(&tx).await?.execute(&tx).await?;

        match tx.commit().await {
            Err(e) if e.code() == Some(&SqlState::T_R_SERIALIZATION_FAILURE) => {
                warn!(
                    "Committing migrations failed due to a concurrent transaction \
                        (another projman process?), retrying in {RETRY_DELAY:?}",
                );
                tokio::time::sleep(RETRY_DELAY).await;
            }
            res => return res.context("failed to commit migration transaction"),
        }
    }
}
