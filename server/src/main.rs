use axum::{
    Router,
    body::Body,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderValue, Request, header},
    middleware::{self, Next},
    response::Response,
    routing,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    services::{ServeDir, ServeFile},
};

async fn healthz() -> &'static str {
    "ok"
}

/// Shared-record fan-out: every frame received on `/sync` is rebroadcast to
/// every connected participant. The relay carries opaque frames; record
/// semantics live entirely in the clients.
#[derive(Clone)]
struct SyncState {
    tx: broadcast::Sender<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let static_files =
        ServeDir::new("../dist").not_found_service(ServeFile::new("../dist/index.html"));

    let (tx, _) = broadcast::channel(64);
    let sync = SyncState { tx };

    let app = Router::new()
        .route("/healthz", routing::get(healthz))
        .route("/sync", routing::get(sync_upgrade))
        .fallback_service(static_files)
        .layer(
            ServiceBuilder::new()
                .layer(CompressionLayer::new().br(true).gzip(true))
                .layer(middleware::from_fn(cache_control)),
        )
        .with_state(sync);

    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let addr = format!("0.0.0.0:{port}");
    tracing::info!("Relay running on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn sync_upgrade(ws: WebSocketUpgrade, State(state): State<SyncState>) -> Response {
    ws.on_upgrade(move |socket| relay(socket, state))
}

async fn relay(socket: WebSocket, state: SyncState) {
    let (mut outbound, mut inbound) = socket.split();
    let mut rx = state.tx.subscribe();

    // The fan-out includes the original sender; clients treat a re-delivery
    // of their current record as no update, so the echo is harmless and
    // keeps the relay stateless.
    let mut forward = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(frame) => {
                    if outbound.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                // Lagged receivers skip to newer frames: last write wins.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let tx = state.tx.clone();
    let mut receive = tokio::spawn(async move {
        while let Some(Ok(message)) = inbound.next().await {
            if let Message::Text(frame) = message {
                let _ = tx.send(frame.to_string());
            }
        }
    });

    tokio::select! {
        _ = &mut forward => receive.abort(),
        _ = &mut receive => forward.abort(),
    }
}

async fn cache_control(req: Request<Body>, next: Next) -> Response {
    let path = req.uri().path().to_owned(); // <- avoid borrowing req
    let mut res = next.run(req).await;

    // HTML: always revalidate (lets you change index each load)
    if path == "/" || path.ends_with(".html") {
        res.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, must-revalidate"),
        );
        return res;
    }

    // Assets:
    //    - If fingerprinted: cache "forever"
    //    - Otherwise: cache, but always revalidate
    let value = if is_fingerprinted_asset(&path) {
        "public, max-age=31536000, immutable"
    } else {
        "public, max-age=0, must-revalidate"
    };

    res.headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static(value));
    res
}

// Heuristic: treat "foo.<hash>.wasm/js/css" as fingerprinted.
fn is_fingerprinted_asset(path: &str) -> bool {
    let file = path.rsplit('/').next().unwrap_or(path);
    let mut parts = file.split('.');

    // need at least name.hash.ext  => 3 parts minimum
    let first = parts.next();
    let second = parts.next();
    let third = parts.next();

    if first.is_none() || second.is_none() || third.is_none() {
        return false;
    }

    let hash = second.unwrap();
    hash.len() >= 8 && hash.chars().all(|c| c.is_ascii_hexdigit())
}
