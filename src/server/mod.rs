//! HTTP surface
//!
//! - `GET {prefix}/update?plugin_slug={id}` resolves the latest release
//! - `GET|HEAD {prefix}/download-zip?plugin_slug={id}&version={v}` streams a cached
//!   archive; it never materializes
//!
//! Every failure becomes `{"error": "..."}` with the matching status code.
//! A failing connection is logged and dropped; the accept loop keeps running.

pub mod http;

use crate::error::{DepotError, DepotResult};
use crate::resolve::{DOWNLOAD_PATH, UPDATE_PATH};
use crate::service::Depot;
use self::http::Request;
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Time allowed for a client to send its request head
const REQUEST_HEAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Response produced by a route
pub enum Response {
    /// JSON document with a status code
    Json {
        status: u16,
        body: serde_json::Value,
    },
    /// Cached archive to stream
    Archive {
        file: tokio::fs::File,
        len: u64,
        filename: String,
    },
}

impl Response {
    fn error(err: &DepotError) -> Self {
        let status = err.status();
        if status >= 500 {
            warn!("Request failed: {}", err);
        } else {
            debug!("Request rejected: {}", err);
        }
        Self::Json {
            status,
            body: json!({ "error": err.to_string() }),
        }
    }

    fn status(&self) -> u16 {
        match self {
            Self::Json { status, .. } => *status,
            Self::Archive { .. } => 200,
        }
    }
}

/// Route a parsed request to its endpoint
pub async fn route(depot: &Depot, request: &Request) -> Response {
    let prefix = depot.route_prefix();
    let Some(path) = request.path.strip_prefix(prefix) else {
        return not_found_route();
    };

    let endpoint = match path {
        UPDATE_PATH => Endpoint::Update,
        DOWNLOAD_PATH => Endpoint::Download,
        _ => return not_found_route(),
    };

    // Resolution has side effects; only downloads answer HEAD
    let head_allowed = matches!(endpoint, Endpoint::Download);
    if request.method != "GET" && !(head_allowed && request.method == "HEAD") {
        return Response::Json {
            status: 405,
            body: json!({ "error": format!("Method {} not allowed", request.method) }),
        };
    }

    let result = match endpoint {
        Endpoint::Update => update(depot, request).await,
        Endpoint::Download => download(depot, request).await,
    };
    result.unwrap_or_else(|e| Response::error(&e))
}

enum Endpoint {
    Update,
    Download,
}

fn not_found_route() -> Response {
    Response::Json {
        status: 404,
        body: json!({ "error": "No route found" }),
    }
}

/// Resolution endpoint
async fn update(depot: &Depot, request: &Request) -> DepotResult<Response> {
    let slug = request
        .param("plugin_slug")
        .ok_or_else(|| DepotError::InvalidPackage(String::new()))?;

    let info = depot.resolver().resolve_update(slug).await?;
    Ok(Response::Json {
        status: 200,
        body: serde_json::to_value(&info)?,
    })
}

/// Download proxy endpoint; read-only
async fn download(depot: &Depot, request: &Request) -> DepotResult<Response> {
    let slug = request
        .param("plugin_slug")
        .ok_or_else(|| DepotError::InvalidPackage(String::new()))?;
    let package = depot.registry().get(slug)?;
    let version = request
        .param("version")
        .ok_or(DepotError::MissingParameter("version"))?;

    let (file, len) = depot.store().open(&package.slug, version).await?;
    Ok(Response::Archive {
        file,
        len,
        filename: format!("{}.zip", package.slug),
    })
}

/// Write a routed response to the client
pub async fn respond<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: Response,
    head_only: bool,
) -> std::io::Result<()> {
    match response {
        Response::Json { status, body } => http::write_json(writer, status, &body, head_only).await,
        Response::Archive {
            mut file,
            len,
            filename,
        } => {
            let sent = http::write_attachment(writer, &mut file, len, &filename, head_only).await?;
            debug!("Sent {} of {} bytes of {}", sent, len, filename);
            Ok(())
        }
    }
}

/// Serve one connection
async fn handle_connection(depot: Arc<Depot>, stream: TcpStream) {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);

    let head = tokio::time::timeout(REQUEST_HEAD_TIMEOUT, http::read_request(&mut reader)).await;
    let request = match head {
        Ok(Ok(request)) => request,
        Ok(Err(e)) => {
            debug!("Dropping connection: {}", e);
            let body = json!({ "error": "Bad request" });
            if let Err(e) = http::write_json(&mut write, 400, &body, false).await {
                debug!("Failed writing bad request response: {}", e);
            }
            return;
        }
        Err(_) => {
            debug!("Dropping connection: request head timed out");
            return;
        }
    };

    let response = route(&depot, &request).await;
    let status = response.status();
    let head_only = request.method == "HEAD";

    if let Err(e) = respond(&mut write, response, head_only).await {
        warn!("Failed writing response: {}", e);
    }
    info!("{} {} -> {}", request.method, request.path, status);
}

/// Accept connections until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, depot: Arc<Depot>, shutdown: F) -> DepotResult<()>
where
    F: Future<Output = ()>,
{
    let addr = listener
        .local_addr()
        .map_err(|e| DepotError::io("reading listener address", e))?;
    info!("Listening on http://{}{}", addr, depot.route_prefix());

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => spawn_connection(depot.clone(), stream, peer),
                Err(e) => warn!("Accept failed: {}", e),
            },
        }
    }
}

fn spawn_connection(depot: Arc<Depot>, stream: TcpStream, peer: SocketAddr) {
    let span = info_span!("request", id = %Uuid::new_v4(), %peer);
    tokio::spawn(handle_connection(depot, stream).instrument(span));
}

/// Bind the configured address
pub async fn bind(addr: &str) -> DepotResult<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| DepotError::io(format!("binding {}", addr), e))
}
