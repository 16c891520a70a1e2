use juniper::graphql_object;

use super::{
    Context,
    Id,
    err::ApiResult,
    model::{
        client::Client,
        project::Project,
        user::User,
    },
};


/// The root query object.
pub(crate) struct Query;

#[graphql_object(name = "RootQueryType", Context = Context)]
impl Query {
    /// Returns all users.
    async fn get_all_users(context: &Context) -> ApiResult<Vec<User>> {
        User::load_all(context).await
    }

    /// Returns all clients.
    async fn clients(context: &Context) -> ApiResult<Vec<Client>> {
        Client::load_all(context).await
    }

    /// Returns all projects.
    async fn projects(context: &Context) -> ApiResult<Vec<Project>> {
        Project::load_all(context).await
    }

    /// Returns the project with the given ID or `null` if the ID does not
    /// refer to a project.
    async fn project(id: Id, context: &Context) -> ApiResult<Option<Project>> {
        Project::load_by_id(id, context).await
    }

    /// Returns the client with the given ID or `null` if the ID does not
    /// refer to a client.
    async fn client(id: Id, context: &Context) -> ApiResult<Option<Client>> {
        Client::load_by_id(id, context).await
    }
}
