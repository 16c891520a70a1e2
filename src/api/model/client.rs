use juniper::graphql_object;
use serde::{Deserialize, Serialize};

use crate::{
    api::{Context, err::ApiResult, Id},
    model::Key,
    prelude::*,
    store::{Collection, Document},
};
use super::{decode, encode};


pub(crate) struct Client {
    key: Key,
    doc: ClientDoc,
}

#[derive(Debug, Serialize, Deserialize)]
struct ClientDoc {
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
}

#[graphql_object(Context = Context)]
impl Client {
    fn id(&self) -> Id {
        Id::client(self.key)
    }

    fn name(&self) -> Option<&str> {
        self.doc.name.as_deref()
    }

    fn email(&self) -> Option<&str> {
        self.doc.email.as_deref()
    }

    fn phone(&self) -> Option<&str> {
        self.doc.phone.as_deref()
    }
}

impl Client {
    pub(crate) async fn load_all(context: &Context) -> ApiResult<Vec<Self>> {
        context.store.find(Collection::Clients).await?
            .into_iter()
            .map(Self::from_doc)
            .collect()
    }

    pub(crate) async fn load_by_id(id: Id, context: &Context) -> ApiResult<Option<Self>> {
        match id.key_for(Id::CLIENT_KIND) {
            Some(key) => Self::load_by_key(key, context).await,
            None => Ok(None),
        }
    }

    pub(crate) async fn load_by_key(key: Key, context: &Context) -> ApiResult<Option<Self>> {
        context.store.find_by_id(Collection::Clients, key).await?
            .map(Self::from_doc)
            .transpose()
    }

    pub(crate) async fn add(
        name: String,
        email: String,
        phone: String,
        context: &Context,
    ) -> ApiResult<Self> {
        let doc = ClientDoc {
            name: Some(name),
            email: Some(email),
            phone: Some(phone),
        };
        let stored = context.store.insert(Collection::Clients, encode(&doc)?).await?;
        info!("Added client {:?}", stored.key);

        Self::from_doc(stored)
    }

    /// Removes the client and returns it. Projects referring to it are kept;
    /// their `client` field resolves to `null` from then on.
    pub(crate) async fn delete(id: Id, context: &Context) -> ApiResult<Option<Self>> {
        let Some(key) = id.key_for(Id::CLIENT_KIND) else {
            return Ok(None);
        };

        let removed = context.store.find_by_id_and_remove(Collection::Clients, key).await?;
        match &removed {
            Some(_) => info!("Deleted client {key:?}"),
            None => debug!("Client {key:?} to delete does not exist"),
        }

        removed.map(Self::from_doc).transpose()
    }

    fn from_doc(doc: Document) -> ApiResult<Self> {
        let (key, doc) = decode(doc)?;
        Ok(Self { key, doc })
    }
}
