use crate::error::RelayError;
use crate::relay::RelayService;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    Json,
    extract::State,
    response::{ Html, IntoResponse },
    http::StatusCode,
};
use serde::{ Deserialize, Serialize };
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

const CHAT_PAGE: &str = include_str!("../../static/index.html");

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

#[derive(Serialize)]
pub struct SendMessageResponse {
    pub response: String,
}

#[derive(Clone)]
struct AppState {
    relay: Arc<RelayService>,
}

pub fn build_router(relay: Arc<RelayService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/send_message", post(send_message_handler))
        .layer(cors)
        .with_state(AppState { relay })
}

pub async fn start_http_server(
    addr: &str,
    relay: Arc<RelayService>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = addr.parse::<SocketAddr>()?;
    info!("Starting HTTP server on: http://{}", addr);

    let app = build_router(relay);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

async fn index_handler() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

async fn send_message_handler(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>
) -> impl IntoResponse {
    match state.relay.handle_turn(&req.message).await {
        Ok(text) => Json(SendMessageResponse { response: text }).into_response(),
        Err(RelayError::InvariantViolation(msg)) => {
            error!("conversation invariant violated: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SendMessageResponse {
                    response: "Internal error. Please try again.".to_string(),
                }),
            ).into_response()
        }
        // Recoverable errors ride in the same JSON shape the page already
        // renders, keeping the client single-path.
        Err(e) => Json(SendMessageResponse { response: e.to_string() }).into_response(),
    }
}
