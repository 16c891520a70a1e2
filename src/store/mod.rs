//! The entity store: a document store with three collections that the API
//! reads from and writes to.
//!
//! Documents are JSON objects. The store assigns each document a [`Key`] on
//! insert and knows nothing about the shape of the documents beyond that. Two
//! implementations exist: [`PgStore`] keeps every collection as a table of
//! `jsonb` documents in PostgreSQL, [`MemoryStore`] keeps everything in
//! process memory.

use std::fmt;

use async_trait::async_trait;

use crate::model::Key;

mod memory;
mod postgres;

pub(crate) use self::{
    memory::MemoryStore,
    postgres::PgStore,
};


/// The fields of a stored document.
pub(crate) type Fields = serde_json::Map<String, serde_json::Value>;

pub(crate) type StoreResult<T> = Result<T, StoreError>;

/// The collections of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Collection {
    Users,
    Clients,
    Projects,
}

impl Collection {
    pub(crate) const ALL: [Self; 3] = [Self::Users, Self::Clients, Self::Projects];

    /// Name of the collection, which is also the name of its DB table.
    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Clients => "clients",
            Self::Projects => "projects",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A document as stored in one collection.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Document {
    pub(crate) key: Key,
    pub(crate) fields: Fields,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum StoreError {
    #[error("could not obtain a database connection: {0}")]
    Unavailable(#[from] deadpool_postgres::PoolError),

    #[error("database error: {0}")]
    Db(#[from] tokio_postgres::Error),

    #[error("document {key:?} in collection '{collection}' is not a JSON object")]
    NotAnObject {
        collection: Collection,
        key: Key,
    },
}

impl StoreError {
    /// Whether the store could not be reached, as opposed to a failing
    /// operation. A connection that dies after checkout counts as well.
    pub(crate) fn is_unavailable(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Db(e) => e.is_closed(),
            Self::NotAnObject { .. } => false,
        }
    }
}

/// Operations every store implementation offers. Each call is atomic on its
/// own; there are no transactions spanning multiple calls.
#[async_trait]
pub(crate) trait EntityStore: Send + Sync {
    /// Returns all documents of `collection` in insertion order.
    async fn find(&self, collection: Collection) -> StoreResult<Vec<Document>>;

    async fn find_by_id(&self, collection: Collection, key: Key) -> StoreResult<Option<Document>>;

    /// Stores a new document and returns it together with its newly assigned key.
    async fn insert(&self, collection: Collection, fields: Fields) -> StoreResult<Document>;

    /// Sets all fields in `set` on the document with the given key, leaving
    /// all other fields untouched. Returns the updated document or `None` if
    /// there is no document with that key.
    async fn find_by_id_and_update(
        &self,
        collection: Collection,
        key: Key,
        set: Fields,
    ) -> StoreResult<Option<Document>>;

    /// Removes the document with the given key and returns it, or returns
    /// `None` if it did not exist.
    async fn find_by_id_and_remove(
        &self,
        collection: Collection,
        key: Key,
    ) -> StoreResult<Option<Document>>;
}


#[cfg(test)]
mod tests {
    use deadpool_postgres::PoolError;
    use tokio::io::AsyncReadExt;

    use crate::model::Key;
    use super::{Collection, StoreError};

    /// A real `tokio_postgres` error for a connection the server closed: the
    /// fake server reads the startup message and hangs up.
    async fn closed_connection_error() -> tokio_postgres::Error {
        let (client, mut server) = tokio::io::duplex(1024);
        tokio::spawn(async move {
            let len = server.read_i32().await.unwrap();
            let mut startup = vec![0; len as usize - 4];
            server.read_exact(&mut startup).await.unwrap();
        });

        let config = "user=projman".parse::<tokio_postgres::Config>().unwrap();
        match config.connect_raw(client, tokio_postgres::NoTls).await {
            Ok(_) => panic!("connection unexpectedly succeeded"),
            Err(e) => e,
        }
    }

    #[tokio::test]
    async fn unavailable_errors() {
        assert!(StoreError::Unavailable(PoolError::Closed).is_unavailable());

        let closed = closed_connection_error().await;
        assert!(closed.is_closed());
        assert!(StoreError::Db(closed).is_unavailable());

        let shape = StoreError::NotAnObject { collection: Collection::Users, key: Key(1) };
        assert!(!shape.is_unavailable());
    }
}
