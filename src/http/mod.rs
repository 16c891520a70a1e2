//! The HTTP server, handler and routes.
//!
//! This file itself contains fairly little business logic and just sets up the
//! `hyper` server and catches errors. The main logic is in `handlers.rs`.

use bytes::Bytes;
use futures::FutureExt;
use http_body_util::Full;
use hyper::{body::Incoming, service::service_fn};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
};
use std::{
    convert::Infallible,
    future::Future,
    net::{IpAddr, SocketAddr},
    panic::AssertUnwindSafe,
    pin::pin,
    sync::Arc,
};
use tokio::net::TcpListener;

use crate::{api, prelude::*, store::EntityStore};
use self::handlers::handle;


mod handlers;
mod log;
mod response;


/// HTTP server configuration.
#[derive(Debug, Clone, confique::Config)]
pub(crate) struct HttpConfig {
    /// The TCP port the HTTP server should listen on.
    #[config(default = 4000)]
    pub(crate) port: u16,

    /// The bind address to listen on.
    #[config(default = "127.0.0.1")]
    pub(crate) address: IpAddr,

    /// Maximum size of a request body in bytes. Larger requests are answered
    /// with 413.
    #[config(default = 1048576)]
    pub(crate) max_body_size: usize,
}


// Our responses always have a fully buffered body.
type Response<T = Full<Bytes>> = hyper::Response<T>;
type Request<T = Incoming> = hyper::Request<T>;


/// Context that the request handler has access to.
struct Context {
    api_root: Arc<api::RootNode>,
    store: Arc<dyn EntityStore>,
    config: HttpConfig,
}


/// Starts the HTTP server and runs it until the process receives Ctrl+C.
pub(crate) async fn serve(
    config: HttpConfig,
    api_root: api::RootNode,
    store: Arc<dyn EntityStore>,
) -> Result<()> {
    let addr = SocketAddr::new(config.address, config.port);
    let listener = TcpListener::bind(addr).await
        .context(format!("failed to bind to {addr}"))?;
    info!("Listening on http://{}", listener.local_addr()?);

    let ctx = Arc::new(Context {
        api_root: Arc::new(api_root),
        store,
        config,
    });

    let mut shutdown = pin!(tokio::signal::ctrl_c());
    loop {
        let (stream, peer) = tokio::select! {
            res = listener.accept() => match res {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Failed to accept TCP connection: {e}");
                    continue;
                }
            },
            res = &mut shutdown => {
                res.context("failed to listen for shutdown signal")?;
                info!("Received shutdown signal, stopping HTTP server");
                return Ok(());
            }
        };

        // Each connection is served on its own task. HTTP/1 and HTTP/2 are
        // both accepted.
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            let service = service_fn(move |req| {
                handle_internal_errors(handle(req, Arc::clone(&ctx)))
            });
            let builder = auto::Builder::new(TokioExecutor::new());
            if let Err(e) = builder.serve_connection(TokioIo::new(stream), service).await {
                debug!("Error serving connection from {peer}: {e}");
            }
        });
    }
}

/// This just wraps another future and catches all panics that might occur when
/// resolving/polling that given future. This ensures that we always answer with
/// `500` instead of just crashing the task and closing the connection.
async fn handle_internal_errors(
    future: impl Future<Output = Response>,
) -> Result<Response, Infallible> {
    // The `AssertUnwindSafe` is fine as handlers only share the immutable root
    // node and the store, whose state stays consistent on panics.
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(response) => Ok(response),
        Err(panic) => {
            // For most panics (which use `panic!` like `println!`), the payload
            // is either `&str` or `String`.
            let msg = panic.downcast_ref::<String>()
                .map(|s| s.as_str())
                .or(panic.downcast_ref::<&str>().copied());

            match msg {
                Some(msg) => error!("INTERNAL SERVER ERROR: HTTP handler panicked: '{}'", msg),
                None => error!("INTERNAL SERVER ERROR: HTTP handler panicked"),
            }

            Ok(response::internal_server_error())
        }
    }
}


#[cfg(test)]
mod tests {
    use hyper::StatusCode;

    use super::{Response, handle_internal_errors};

    async fn explode() -> Response {
        panic!("oh no")
    }

    #[tokio::test]
    async fn panics_become_500() {
        let response = handle_internal_errors(explode()).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
