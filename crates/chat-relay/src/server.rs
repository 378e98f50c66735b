//! Actix Web HTTP server.
//!
//! Exposes:
//! - `POST /api/chat`
//! - `GET /health`

use crate::{config::RelayConfig, streaming, types::ChatRequest, upstream::UpstreamClient};
use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::{Context, Result};
use futures::StreamExt;
use std::convert::Infallible;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub model: String,
    pub client: UpstreamClient,
}

impl AppState {
    pub fn new(config: &RelayConfig) -> Result<Self> {
        Ok(Self {
            model: config.model.clone(),
            client: UpstreamClient::new(config)?,
        })
    }
}

pub async fn serve(config: RelayConfig) -> Result<()> {
    let addr = config.bind_addr();
    info!(
        addr = %addr,
        backend = %config.backend_url,
        model = %config.model,
        "chat-relay listening"
    );

    let state = web::Data::new(AppState::new(&config)?);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .configure(routes)
    })
    .bind(&addr)
    .with_context(|| format!("failed to bind {}", addr))?
    .run()
    .await
    .context("server error")?;

    Ok(())
}

/// Register the relay's routes. Shared by [`serve`] and tests.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/api/chat", web::post().to(handle_chat));
}

async fn health_check() -> &'static str {
    "OK"
}

async fn handle_chat(state: web::Data<AppState>, body: web::Json<ChatRequest>) -> HttpResponse {
    let req = body.into_inner();
    info!(messages = req.messages.len(), model = %state.model, "chat request");

    // Failures are reported in-band as error frames, so the body stream
    // itself never errors. Client disconnect drops this stream, which
    // drops the upstream response.
    let stream = streaming::relay(state.client.clone(), req, state.model.clone())
        .map(|frame| Ok::<_, Infallible>(web::Bytes::from(frame.encode())));

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("cache-control", "no-cache"))
        .streaming(stream)
}
