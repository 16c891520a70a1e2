//! Small catalog queries used by migrations and the `db` subcommands.

use tokio_postgres::GenericClient;

use crate::prelude::*;


/// Names of all tables in the `public` schema, sorted alphabetically.
pub(super) async fn all_table_names(db: &impl GenericClient) -> Result<Vec<String>> {
    let rows = db
        .query(
            "select tablename::text from pg_catalog.pg_tables \
                where schemaname = 'public' order by tablename",
            &[],
        )
        .await
        .context("failed to list tables")?;

    Ok(rows.iter().map(|row| row.get(0)).collect())
}

/// Whether `public.<table>` exists.
pub(super) async fn does_table_exist(db: &impl GenericClient, table: &str) -> Result<bool> {
    let row = db
        .query_one("select to_regclass('public.' || $1) is not null", &[&table])
        .await
        .context(format!("failed to check whether table '{table}' exists"))?;

    Ok(row.get(0))
}
