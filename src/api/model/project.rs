use juniper::{GraphQLEnum, Nullable, graphql_object};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    api::{Context, err::ApiResult, Id},
    model::Key,
    prelude::*,
    store::{Collection, Document, Fields},
};
use super::{client::Client, decode, encode};


pub(crate) struct Project {
    key: Key,
    doc: ProjectDoc,
}

/// Stored layout of a project.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    /// Display value of a [`ProjectStatus`], e.g. `"Not Started"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    /// The `ID` of the client as sent by the API user. Not checked.
    #[serde(skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,
}

/// Status of a new project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, GraphQLEnum)]
pub(crate) enum ProjectStatus {
    #[graphql(name = "new")]
    NotStarted,
    #[graphql(name = "progress")]
    InProgress,
    #[graphql(name = "completed")]
    Completed,
}

impl ProjectStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        }
    }
}

/// Status when updating a project. Same values as `ProjectStatus`, but a
/// separate type in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, GraphQLEnum)]
pub(crate) enum ProjectStatusUpdate {
    #[graphql(name = "new")]
    NotStarted,
    #[graphql(name = "progress")]
    InProgress,
    #[graphql(name = "completed")]
    Completed,
}

impl From<ProjectStatusUpdate> for ProjectStatus {
    fn from(src: ProjectStatusUpdate) -> Self {
        match src {
            ProjectStatusUpdate::NotStarted => Self::NotStarted,
            ProjectStatusUpdate::InProgress => Self::InProgress,
            ProjectStatusUpdate::Completed => Self::Completed,
        }
    }
}

/// The fields of a project that `updateProject` can change. An implicit null
/// (argument omitted) leaves the field as is, an explicit null clears it.
#[derive(Debug)]
pub(crate) struct ProjectPatch {
    pub(crate) name: Nullable<String>,
    pub(crate) description: Nullable<String>,
    pub(crate) status: Nullable<ProjectStatusUpdate>,
}

impl ProjectPatch {
    /// The fields to set in the stored document.
    fn into_fields(self) -> Fields {
        fn put(set: &mut Fields, field: &str, value: Nullable<String>) {
            if let Some(value) = value.explicit() {
                set.insert(field.into(), value.map_or(Value::Null, Value::String));
            }
        }

        let mut set = Fields::new();
        put(&mut set, "name", self.name);
        put(&mut set, "description", self.description);
        put(&mut set, "status", self.status.map(|s| ProjectStatus::from(s).as_str().to_owned()));
        set
    }
}

#[graphql_object(Context = Context)]
impl Project {
    fn id(&self) -> Id {
        Id::project(self.key)
    }

    fn name(&self) -> Option<&str> {
        self.doc.name.as_deref()
    }

    fn description(&self) -> Option<&str> {
        self.doc.description.as_deref()
    }

    fn status(&self) -> Option<&str> {
        self.doc.status.as_deref()
    }

    /// The client this project belongs to, or `null` if there is no client
    /// with the stored `clientId`.
    async fn client(&self, context: &Context) -> ApiResult<Option<Client>> {
        let Some(raw) = &self.doc.client_id else {
            return Ok(None);
        };

        match raw.parse::<Id>() {
            Ok(id) => Client::load_by_id(id, context).await,
            Err(e) => {
                debug!("Project {:?} has unusable client ID '{raw}' ({e})", self.key);
                Ok(None)
            }
        }
    }
}

impl Project {
    pub(crate) async fn load_all(context: &Context) -> ApiResult<Vec<Self>> {
        context.store.find(Collection::Projects).await?
            .into_iter()
            .map(Self::from_doc)
            .collect()
    }

    pub(crate) async fn load_by_id(id: Id, context: &Context) -> ApiResult<Option<Self>> {
        let Some(key) = id.key_for(Id::PROJECT_KIND) else {
            return Ok(None);
        };

        context.store.find_by_id(Collection::Projects, key).await?
            .map(Self::from_doc)
            .transpose()
    }

    pub(crate) async fn add(
        name: String,
        description: String,
        status: ProjectStatus,
        client_id: Id,
        context: &Context,
    ) -> ApiResult<Self> {
        let doc = ProjectDoc {
            name: Some(name),
            description: Some(description),
            status: Some(status.as_str().to_owned()),
            client_id: Some(client_id.to_string()),
        };
        let stored = context.store.insert(Collection::Projects, encode(&doc)?).await?;
        info!("Added project {:?} for client {client_id}", stored.key);

        Self::from_doc(stored)
    }

    pub(crate) async fn delete(id: Id, context: &Context) -> ApiResult<Option<Self>> {
        let Some(key) = id.key_for(Id::PROJECT_KIND) else {
            return Ok(None);
        };

        let removed = context.store.find_by_id_and_remove(Collection::Projects, key).await?;
        match &removed {
            Some(_) => info!("Deleted project {key:?}"),
            None => debug!("Project {key:?} to delete does not exist"),
        }

        removed.map(Self::from_doc).transpose()
    }

    /// Writes only the fields present in `patch` and returns the project as
    /// it is afterwards, or `None` if there is no such project.
    pub(crate) async fn update(
        id: Id,
        patch: ProjectPatch,
        context: &Context,
    ) -> ApiResult<Option<Self>> {
        let Some(key) = id.key_for(Id::PROJECT_KIND) else {
            return Ok(None);
        };

        let set = patch.into_fields();
        let fields = set.keys().cloned().collect::<Vec<_>>();

        let updated = context.store
            .find_by_id_and_update(Collection::Projects, key, set)
            .await?;
        match &updated {
            Some(_) => info!("Updated project {key:?} (fields: {})", fields.join(", ")),
            None => debug!("Project {key:?} to update does not exist"),
        }

        updated.map(Self::from_doc).transpose()
    }

    fn from_doc(doc: Document) -> ApiResult<Self> {
        let (key, doc) = decode(doc)?;
        Ok(Self { key, doc })
    }
}


#[cfg(test)]
mod tests {
    use juniper::Nullable;
    use serde_json::json;

    use super::{ProjectPatch, ProjectStatus, ProjectStatusUpdate};

    #[test]
    fn patch_distinguishes_omitted_and_null() {
        let patch = ProjectPatch {
            name: Nullable::ImplicitNull,
            description: Nullable::ExplicitNull,
            status: Nullable::Some(ProjectStatusUpdate::InProgress),
        };
        assert_eq!(
            serde_json::Value::Object(patch.into_fields()),
            json!({ "description": null, "status": "In Progress" }),
        );
    }

    #[test]
    fn status_display_values() {
        assert_eq!(ProjectStatus::NotStarted.as_str(), "Not Started");
        assert_eq!(ProjectStatus::InProgress.as_str(), "In Progress");
        assert_eq!(ProjectStatus::Completed.as_str(), "Completed");
    }

    #[test]
    fn update_status_maps_to_same_value() {
        for (update, status) in [
            (ProjectStatusUpdate::NotStarted, ProjectStatus::NotStarted),
            (ProjectStatusUpdate::InProgress, ProjectStatus::InProgress),
            (ProjectStatusUpdate::Completed, ProjectStatus::Completed),
        ] {
            assert_eq!(ProjectStatus::from(update), status);
        }
    }
}
