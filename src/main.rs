mod auth;
mod config;
mod db;
mod entities;
mod error;
mod models;
mod routes;
mod store;
#[cfg(test)]
mod testutil;

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header},
    middleware,
    routing::{get, patch},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{auth::TokenVerifier, config::Config, store::Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub verifier: TokenVerifier,
}

pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ]);

    Router::new()
        .route("/movies", get(routes::list_movies).post(routes::create_movie))
        .route("/movies/{id}", patch(routes::update_movie).delete(routes::delete_movie))
        .route("/actors", get(routes::list_actors).post(routes::create_actor))
        .route("/actors/{id}", patch(routes::update_actor).delete(routes::delete_actor))
        .layer(middleware::from_fn_with_state(state.clone(), auth::authenticate))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,casting_agency=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Config::from_env()?;

    let http = reqwest::Client::builder()
        .user_agent("casting-agency/0.1")
        .timeout(Duration::from_secs(10))
        .build()?;

    let db = db::connect_and_migrate(&config.database_url).await?;
    let store = Store::new(db);
    let verifier = TokenVerifier::new(http, &config.auth0_domain, &config.api_audience);

    let state = Arc::new(AppState { store, verifier });

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app(state)).await?;

    Ok(())
}
