use juniper::{GraphQLEnum, graphql_object};
use serde::{Deserialize, Serialize};

use crate::{
    api::{Context, err::ApiResult, Id},
    model::Key,
    prelude::*,
    store::{Collection, Document},
};
use super::{decode, encode};


/// A person with access to the project management system.
pub(crate) struct User {
    key: Key,
    doc: UserDoc,
}

#[derive(Debug, Serialize, Deserialize)]
struct UserDoc {
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<UserRole>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, GraphQLEnum)]
pub(crate) enum UserRole {
    #[graphql(name = "Owner")]
    Owner,
    #[graphql(name = "Admin")]
    Admin,
    #[graphql(name = "Member")]
    Member,
}

#[graphql_object(Context = Context)]
impl User {
    fn id(&self) -> Id {
        Id::user(self.key)
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

    /// `null` for users created through the API, as `addUser` assigns no role.
    fn role(&self) -> Option<UserRole> {
        self.doc.role
    }
}

impl User {
    pub(crate) async fn load_all(context: &Context) -> ApiResult<Vec<Self>> {
        context.store.find(Collection::Users).await?
            .into_iter()
            .map(Self::from_doc)
            .collect()
    }

    pub(crate) async fn add(
        name: String,
        email: String,
        phone: String,
        context: &Context,
    ) -> ApiResult<Self> {
        let doc = UserDoc {
            name: Some(name),
            email: Some(email),
            phone: Some(phone),
            role: None,
        };
        let stored = context.store.insert(Collection::Users, encode(&doc)?).await?;
        info!("Added user {:?}", stored.key);

        Self::from_doc(stored)
    }

    fn from_doc(doc: Document) -> ApiResult<Self> {
        let (key, doc) = decode(doc)?;
        Ok(Self { key, doc })
    }
}
