use std::{
    collections::{BTreeMap, HashMap},
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;

use crate::{model::Key, prelude::*};
use super::{Collection, Document, EntityStore, Fields, StoreResult};


/// Store that keeps all collections in process memory. All data is lost when
/// the process exits.
///
/// Keys are assigned per collection, starting at 1, just like the identity
/// columns of the PostgreSQL store.
#[derive(Default)]
pub(crate) struct MemoryStore {
    collections: Mutex<HashMap<Collection, MemCollection>>,
}

#[derive(Default)]
struct MemCollection {
    last_key: u64,
    docs: BTreeMap<Key, Fields>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Collection, MemCollection>> {
        // No operation leaves a collection in a half-modified state, so a
        // poisoned lock still guards consistent data.
        self.collections.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn find(&self, collection: Collection) -> StoreResult<Vec<Document>> {
        let collections = self.lock();
        let docs = collections.get(&collection)
            .map(|c| {
                c.docs.iter()
                    .map(|(&key, fields)| Document { key, fields: fields.clone() })
                    .collect()
            })
            .unwrap_or_default();

        Ok(docs)
    }

    async fn find_by_id(&self, collection: Collection, key: Key) -> StoreResult<Option<Document>> {
        let collections = self.lock();
        let doc = collections.get(&collection)
            .and_then(|c| c.docs.get(&key))
            .map(|fields| Document { key, fields: fields.clone() });

        Ok(doc)
    }

    async fn insert(&self, collection: Collection, fields: Fields) -> StoreResult<Document> {
        let mut collections = self.lock();
        let c = collections.entry(collection).or_default();
        c.last_key += 1;
        let key = Key(c.last_key);
        c.docs.insert(key, fields.clone());
        trace!("Inserted {key:?} into in-memory collection '{collection}'");

        Ok(Document { key, fields })
    }

    async fn find_by_id_and_update(
        &self,
        collection: Collection,
        key: Key,
        set: Fields,
    ) -> StoreResult<Option<Document>> {
        let mut collections = self.lock();
        let Some(fields) = collections.get_mut(&collection).and_then(|c| c.docs.get_mut(&key))
        else {
            return Ok(None);
        };

        fields.extend(set);
        Ok(Some(Document { key, fields: fields.clone() }))
    }

    async fn find_by_id_and_remove(
        &self,
        collection: Collection,
        key: Key,
    ) -> StoreResult<Option<Document>> {
        let mut collections = self.lock();
        let removed = collections.get_mut(&collection)
            .and_then(|c| c.docs.remove(&key))
            .map(|fields| Document { key, fields });

        Ok(removed)
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::model::Key;
    use super::{Collection, EntityStore, Fields, MemoryStore};

    fn fields(value: serde_json::Value) -> Fields {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("test fields must be an object"),
        }
    }

    #[tokio::test]
    async fn keys_are_assigned_per_collection() {
        let store = MemoryStore::new();
        let a = store.insert(Collection::Clients, fields(json!({ "name": "a" }))).await.unwrap();
        let b = store.insert(Collection::Clients, fields(json!({ "name": "b" }))).await.unwrap();
        let p = store.insert(Collection::Projects, fields(json!({ "name": "p" }))).await.unwrap();

        assert_eq!(a.key, Key(1));
        assert_eq!(b.key, Key(2));
        assert_eq!(p.key, Key(1));
    }

    #[tokio::test]
    async fn find_returns_insertion_order() {
        let store = MemoryStore::new();
        for name in ["x", "y", "z"] {
            store.insert(Collection::Users, fields(json!({ "name": name }))).await.unwrap();
        }

        let names = store.find(Collection::Users).await.unwrap()
            .into_iter()
            .map(|doc| doc.fields["name"].clone())
            .collect::<Vec<_>>();
        assert_eq!(names, [json!("x"), json!("y"), json!("z")]);
        assert!(store.find(Collection::Clients).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_only_touches_given_fields() {
        let store = MemoryStore::new();
        let doc = store.insert(
            Collection::Projects,
            fields(json!({ "name": "old", "description": "orig" })),
        ).await.unwrap();

        let updated = store.find_by_id_and_update(
            Collection::Projects,
            doc.key,
            fields(json!({ "name": "new" })),
        ).await.unwrap().unwrap();

        assert_eq!(updated.fields, fields(json!({ "name": "new", "description": "orig" })));
        let reloaded = store.find_by_id(Collection::Projects, doc.key).await.unwrap();
        assert_eq!(reloaded, Some(updated));
    }

    #[tokio::test]
    async fn update_and_remove_missing_key() {
        let store = MemoryStore::new();
        let set = fields(json!({ "name": "new" }));
        assert_eq!(store.find_by_id_and_update(Collection::Projects, Key(7), set).await.unwrap(), None);
        assert_eq!(store.find_by_id_and_remove(Collection::Projects, Key(7)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn remove_returns_removed_document() {
        let store = MemoryStore::new();
        let doc = store.insert(Collection::Clients, fields(json!({ "name": "c" }))).await.unwrap();

        let removed = store.find_by_id_and_remove(Collection::Clients, doc.key).await.unwrap();
        assert_eq!(removed, Some(doc.clone()));
        assert_eq!(store.find_by_id(Collection::Clients, doc.key).await.unwrap(), None);

        // Keys are not reused after removal.
        let next = store.insert(Collection::Clients, Fields::new()).await.unwrap();
        assert_eq!(next.key, Key(2));
    }
}
