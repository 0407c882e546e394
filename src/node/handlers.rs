use axum::{Json, Router, extract::Extension, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::cluster::{ClusterNode, NodeStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembersResponse {
    pub members: Vec<String>,
}

pub fn router(node: Arc<ClusterNode>) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/members", get(handle_members))
        .layer(Extension(node))
}

pub async fn handle_status(
    Extension(node): Extension<Arc<ClusterNode>>,
) -> (StatusCode, Json<NodeStatus>) {
    (StatusCode::OK, Json(node.status()))
}

pub async fn handle_members(
    Extension(node): Extension<Arc<ClusterNode>>,
) -> (StatusCode, Json<MembersResponse>) {
    let members = node.peers().iter().map(ToString::to_string).collect();
    (StatusCode::OK, Json(MembersResponse { members }))
}
