use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::{Method, StatusCode};
use juniper::http::{GraphQLBatchRequest, graphiql::graphiql_source};
use std::{sync::Arc, time::Instant};

use crate::{api, prelude::*};
use super::{Context, Request, Response, log, response};


/// This is the main HTTP entry point, called for each incoming request.
pub(super) async fn handle(req: Request, ctx: Arc<Context>) -> Response {
    log::req::log(&req);

    let method = req.method().clone();
    let path = req.uri().path().trim_end_matches('/').to_owned();

    match path.as_str() {
        // The GraphQL endpoint. This is the only path for which POST is
        // allowed.
        "/graphql" if method == Method::POST => handle_api(req, &ctx).await,
        "/graphql" => response::method_not_allowed(),

        // The interactive GraphQL API explorer/IDE.
        "/graphiql" if method == Method::GET || method == Method::HEAD => {
            response::with_body(
                StatusCode::OK,
                "text/html; charset=UTF-8",
                graphiql_source("/graphql", None),
            )
        }
        "/graphiql" => response::method_not_allowed(),

        _ => {
            debug!("Responding with 404 to {:?} '{}'", method, path);
            response::not_found()
        }
    }
}

/// Handles a request to `/graphql`.
async fn handle_api(req: Request, ctx: &Context) -> Response {
    let before = Instant::now();

    let body = match Limited::new(req.into_body(), ctx.config.max_body_size).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            debug!("Rejecting API request with body larger than {} bytes", ctx.config.max_body_size);
            return response::payload_too_large();
        }
        Err(e) => {
            warn!("Failed to read body of API request: {e}");
            return response::bad_request("failed to read request body");
        }
    };

    let api_context = api::Context { store: Arc::clone(&ctx.store) };
    let out = execute_api_request(&body, &ctx.api_root, &api_context).await;

    debug!("Finished /graphql request in {:.2?} (status {})", before.elapsed(), out.status());
    out
}

/// Parses `body` as GraphQL (batch) request and executes it. A request that
/// juniper rejects before execution, e.g. because it does not validate, is
/// answered with 400, everything else with 200.
pub(super) async fn execute_api_request(
    body: &Bytes,
    root: &api::RootNode,
    context: &api::Context,
) -> Response {
    let request = match serde_json::from_slice::<GraphQLBatchRequest>(body) {
        Ok(request) => request,
        Err(e) => {
            debug!("Invalid GraphQL request body: {e}");
            return response::bad_request(format!("invalid GraphQL request: {e}"));
        }
    };

    let response = request.execute(root, context).await;
    let status = if response.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };

    match serde_json::to_vec(&response) {
        Ok(json) => response::with_body(status, "application/json", json),
        Err(e) => {
            error!("Failed to serialize GraphQL response: {e}");
            response::internal_server_error()
        }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use bytes::Bytes;
    use deadpool_postgres::PoolError;
    use http_body_util::BodyExt;
    use hyper::StatusCode;
    use serde_json::{json, Value};

    use crate::{
        api,
        model::Key,
        store::{Collection, Document, EntityStore, Fields, MemoryStore, StoreError, StoreResult},
    };
    use super::{Response, execute_api_request};

    async fn post(body: &str, context: &api::Context) -> (StatusCode, Bytes) {
        let root = api::root_node();
        let response: Response = execute_api_request(&Bytes::from(body.to_owned()), &root, context).await;
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body)
    }

    fn context() -> api::Context {
        api::Context { store: Arc::new(MemoryStore::new()) }
    }

    #[tokio::test]
    async fn single_request() {
        let ctx = context();
        let body = r#"{ "query": "mutation { addClients(name: \"a\", email: \"e\", phone: \"p\") { name } }" }"#;
        let (status, out) = post(body, &ctx).await;
        assert_eq!(status, StatusCode::OK);
        let out: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(out, json!({ "data": { "addClients": { "name": "a" } } }));
    }

    #[tokio::test]
    async fn batch_request_with_variables() {
        let ctx = context();
        let body = json!([
            {
                "query": "mutation Add($n: String!) { addClients(name: $n, email: \"e\", phone: \"p\") { name } }",
                "variables": { "n": "b" },
                "operationName": "Add",
            },
            { "query": "{ projects { name } }" },
        ]).to_string();

        let (status, out) = post(&body, &ctx).await;
        assert_eq!(status, StatusCode::OK);
        let out: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(out, json!([
            { "data": { "addClients": { "name": "b" } } },
            { "data": { "projects": [] } },
        ]));
    }

    #[tokio::test]
    async fn malformed_id_is_bad_request() {
        let ctx = context();
        let (status, out) = post(r#"{ "query": "{ client(id: \"nope\") { id } }" }"#, &ctx).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let out: Value = serde_json::from_slice(&out).unwrap();
        assert!(out.get("data").is_none());
        assert!(!out["errors"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_id_variable_is_bad_request() {
        let ctx = context();
        let body = json!({
            "query": "query Q($id: ID!) { project(id: $id) { id } }",
            "variables": { "id": "xyz" },
        }).to_string();
        let (status, _) = post(&body, &ctx).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    struct UnreachableStore;

    #[async_trait]
    impl EntityStore for UnreachableStore {
        async fn find(&self, _: Collection) -> StoreResult<Vec<Document>> {
            Err(StoreError::Unavailable(PoolError::Closed))
        }

        async fn find_by_id(&self, _: Collection, _: Key) -> StoreResult<Option<Document>> {
            Err(StoreError::Unavailable(PoolError::Closed))
        }

        async fn insert(&self, _: Collection, _: Fields) -> StoreResult<Document> {
            Err(StoreError::Unavailable(PoolError::Closed))
        }

        async fn find_by_id_and_update(
            &self,
            _: Collection,
            _: Key,
            _: Fields,
        ) -> StoreResult<Option<Document>> {
            Err(StoreError::Unavailable(PoolError::Closed))
        }

        async fn find_by_id_and_remove(&self, _: Collection, _: Key) -> StoreResult<Option<Document>> {
            Err(StoreError::Unavailable(PoolError::Closed))
        }
    }

    #[tokio::test]
    async fn unreachable_store_is_reported_in_graphql_errors() {
        let ctx = api::Context { store: Arc::new(UnreachableStore) };
        let (status, out) = post(r#"{ "query": "{ clients { id } }" }"#, &ctx).await;
        assert_eq!(status, StatusCode::OK);

        let out: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(out["data"], Value::Null);
        assert_eq!(out["errors"][0]["extensions"]["kind"], "STORE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn invalid_json_is_bad_request() {
        let ctx = context();
        let (status, _) = post("{ not json", &ctx).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
