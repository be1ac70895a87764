pub mod handlers;

use std::future::IntoFuture;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use handlers::ApiState;

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.policy.max_message_size;

    Router::new()
        .route(
            &state.route_pattern,
            post(handlers::handle_ingest).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/status", get(handlers::handle_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Serve until `shutdown` is cancelled. Requests already accepted get up to
/// `grace` to finish; after that the server stops waiting for them and
/// returns.
pub async fn serve(
    state: ApiState,
    listener: TcpListener,
    shutdown: CancellationToken,
    grace: Duration,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, route = %state.route_pattern, "ingestion listening");

    let server = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .into_future();
    tokio::pin!(server);

    let grace_elapsed = async {
        shutdown.cancelled().await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        res = &mut server => res?,
        _ = grace_elapsed => {
            tracing::warn!(
                grace_ms = grace.as_millis() as u64,
                "in-flight requests did not finish before the shutdown grace period"
            );
        }
    }
    tracing::info!("ingestion stopped");
    Ok(())
}
