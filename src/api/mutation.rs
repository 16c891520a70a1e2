use juniper::{Nullable, graphql_object};

use super::{
    Context,
    Id,
    err::ApiResult,
    model::{
        client::Client,
        project::{Project, ProjectPatch, ProjectStatus, ProjectStatusUpdate},
        user::User,
    },
};


/// The root mutation object.
pub(crate) struct Mutation;

#[graphql_object(Context = Context)]
impl Mutation {
    /// Adds a user without a role.
    async fn add_user(
        name: String,
        email: String,
        phone: String,
        context: &Context,
    ) -> ApiResult<User> {
        User::add(name, email, phone, context).await
    }

    /// Adds a single client.
    async fn add_clients(
        name: String,
        email: String,
        phone: String,
        context: &Context,
    ) -> ApiResult<Client> {
        Client::add(name, email, phone, context).await
    }

    /// Deletes the client and returns it, or returns `null` if it does not
    /// exist. Projects of that client are not touched.
    async fn delete_client(id: Id, context: &Context) -> ApiResult<Option<Client>> {
        Client::delete(id, context).await
    }

    /// Adds a single project. `status` defaults to `new` if omitted or `null`.
    /// `clientId` is stored as is and not checked.
    async fn add_projects(
        name: String,
        description: String,
        status: Option<ProjectStatus>,
        client_id: Id,
        context: &Context,
    ) -> ApiResult<Project> {
        let status = status.unwrap_or(ProjectStatus::NotStarted);
        Project::add(name, description, status, client_id, context).await
    }

    /// Deletes the project and returns it, or returns `null` if it does not
    /// exist.
    async fn delete_project(id: Id, context: &Context) -> ApiResult<Option<Project>> {
        Project::delete(id, context).await
    }

    /// Changes the given fields of a project. Omitted arguments leave the
    /// field unchanged, an explicit `null` clears it. Returns the updated
    /// project, or `null` if it does not exist.
    async fn update_project(
        id: Id,
        name: Nullable<String>,
        description: Nullable<String>,
        status: Nullable<ProjectStatusUpdate>,
        context: &Context,
    ) -> ApiResult<Option<Project>> {
        Project::update(id, ProjectPatch { name, description, status }, context).await
    }
}
