// ABOUTME: Server binary wiring configuration, providers, and the HTTP listener
// ABOUTME: Fails fast on misconfiguration and shuts down gracefully on ctrl-c
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! Clipchef server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clipchef::config::ServerConfig;
use clipchef::context::ServerResources;
use clipchef::database::Database;
use clipchef::errors::AppError;
use clipchef::llm::{image_provider_from_config, text_provider_from_config};
use clipchef::pipeline::RecipePipeline;
use clipchef::routes;
use clipchef::transcription::WhisperTranscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env().context("configuration error")?;
    let database = Database::connect(&config.database_url)
        .await
        .context("database connection failed")?;

    let transcriber = Arc::new(WhisperTranscriber::new(
        config
            .openai_api_key
            .clone()
            .ok_or_else(|| AppError::config("OPENAI_API_KEY is required for transcription"))?,
    ));
    let llm = text_provider_from_config(&config)?;
    let image = image_provider_from_config(&config)?;
    let pipeline = Arc::new(RecipePipeline::new(&config, transcriber, llm, image));

    let port = config.port;
    let resources = Arc::new(ServerResources::new(config, database, pipeline)?);
    resources.start_background_tasks();

    let app = routes::router(resources);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!(%addr, "clipchef listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
