use async_trait::async_trait;
use deadpool_postgres::{Object, Pool};
use postgres_types::ToSql;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio_postgres::Row;

use crate::{model::Key, prelude::*};
use super::{Collection, Document, EntityStore, Fields, StoreError, StoreResult};


/// Store backed by PostgreSQL. Each collection is a table with a `bigint`
/// identity primary key and a `jsonb` document column, see the migrations.
///
/// Every store call checks out its own connection from the pool; nothing is
/// wrapped in a transaction beyond the single statement.
pub(crate) struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub(crate) fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> StoreResult<Object> {
        let before = Instant::now();
        let conn = self.pool.get().await?;

        let acquire_conn_time = before.elapsed();
        if acquire_conn_time > Duration::from_millis(5) {
            warn!("Acquiring DB connection from pool took {:.2?}", acquire_conn_time);
        }

        Ok(conn)
    }

    /// Runs a query that returns at most one `(id, doc)` row.
    async fn query_doc(
        &self,
        collection: Collection,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> StoreResult<Option<Document>> {
        trace!("Executing SQL query: \"{}\" with {:?}", query, params);
        let conn = self.conn().await?;
        let statement = conn.prepare_cached(query).await?;
        conn.query_opt(&statement, params)
            .await?
            .map(|row| from_row(collection, &row))
            .transpose()
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn find(&self, collection: Collection) -> StoreResult<Vec<Document>> {
        let query = format!("select id, doc from {collection} order by id");
        trace!("Executing SQL query: \"{}\"", query);

        let conn = self.conn().await?;
        let statement = conn.prepare_cached(&query).await?;
        conn.query(&statement, &[])
            .await?
            .iter()
            .map(|row| from_row(collection, row))
            .collect()
    }

    async fn find_by_id(&self, collection: Collection, key: Key) -> StoreResult<Option<Document>> {
        let query = format!("select id, doc from {collection} where id = $1");
        self.query_doc(collection, &query, &[&key]).await
    }

    async fn insert(&self, collection: Collection, fields: Fields) -> StoreResult<Document> {
        let query = format!("insert into {collection} (doc) values ($1) returning id, doc");
        let doc = Value::Object(fields);
        trace!("Executing SQL query: \"{}\" with {:?}", query, doc);

        let conn = self.conn().await?;
        let statement = conn.prepare_cached(&query).await?;
        let row = conn.query_one(&statement, &[&doc]).await?;
        from_row(collection, &row)
    }

    async fn find_by_id_and_update(
        &self,
        collection: Collection,
        key: Key,
        set: Fields,
    ) -> StoreResult<Option<Document>> {
        // `||` on two `jsonb` objects is a shallow merge where the right side
        // wins, i.e. exactly "set these fields".
        let query = format!("update {collection} set doc = doc || $2 where id = $1 returning id, doc");
        self.query_doc(collection, &query, &[&key, &Value::Object(set)]).await
    }

    async fn find_by_id_and_remove(
        &self,
        collection: Collection,
        key: Key,
    ) -> StoreResult<Option<Document>> {
        let query = format!("delete from {collection} where id = $1 returning id, doc");
        self.query_doc(collection, &query, &[&key]).await
    }
}

fn from_row(collection: Collection, row: &Row) -> StoreResult<Document> {
    let key: Key = row.try_get(0)?;
    match row.try_get::<_, Value>(1)? {
        Value::Object(fields) => Ok(Document { key, fields }),
        _ => Err(StoreError::NotAnObject { collection, key }),
    }
}
