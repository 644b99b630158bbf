// # REST API Server
//
// Router assembly and the serve loop. The router is exposed on its own
// so integration tests can drive it without binding a socket.

use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::Result;

use super::events::{on_instance_event, on_node_event};
use super::monitoring::{cluster_state, scheduler_metrics};
use super::nodes::{create_node, delete_node, get_node, list_nodes, update_node};
use super::services::{
    create_service, delete_service, get_service, list_services, update_service,
};
use super::types::ApiState;

pub struct ApiServer {
    state: Arc<ApiState>,
}

impl ApiServer {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn run(&self, addr: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("API listening on {addr}");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

pub fn build_router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/nodes", post(create_node).get(list_nodes))
        .route(
            "/nodes/{id}",
            get(get_node).patch(update_node).delete(delete_node),
        )
        .route("/services", post(create_service).get(list_services))
        .route(
            "/services/{id}",
            get(get_service).patch(update_service).delete(delete_service),
        )
        .route("/events/nodes", post(on_node_event))
        .route("/events/service-instances", post(on_instance_event))
        .route("/monitoring/state", get(cluster_state))
        .route("/monitoring/metrics", get(scheduler_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .with_state(state)
}
