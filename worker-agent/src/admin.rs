// Copyright 2024-2025 Golem Cloud
//
// Licensed under the Golem Source License v1.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://license.golem.cloud/LICENSE
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The worker's own local admin surface: liveness, self-report, and
//! per-service introspection/restart. Not exposed to the conductor; meant
//! for an operator poking the host directly or a local monitoring agent.

use crate::error::FailureClass;
use crate::state::AgentState;
use crate::supervisor::DeploymentSupervisor;
use fleet_common::protocol::{
    DeclaredResources, DeploymentAction, DeploymentPayload, ResourceSnapshot, ServiceStatus,
};
use poem::http::StatusCode;
use poem::web::{Data, Json, Path};
use poem::{get, handler, post, IntoResponse, Response, Route};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct AdminContext {
    pub state: Arc<AgentState>,
    pub supervisor: Arc<DeploymentSupervisor>,
}

pub fn routes() -> Route {
    Route::new()
        .at("/health", get(health))
        .at("/status", get(status))
        .at("/services", get(list_services))
        .at("/services/:name", get(get_service))
        .at("/services/:name/restart", post(restart_service))
}

#[derive(Serialize)]
struct HealthResponse {
    healthy: bool,
    connected: bool,
}

#[handler]
async fn health(Data(ctx): Data<&AdminContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: true,
        connected: ctx.state.is_connected(),
    })
}

#[derive(Serialize)]
struct StatusResponse {
    worker_id: Option<Uuid>,
    connected: bool,
    uptime_millis: u64,
    declared: Option<DeclaredResources>,
    live: Option<ResourceSnapshot>,
}

#[handler]
async fn status(Data(ctx): Data<&AdminContext>) -> Json<StatusResponse> {
    Json(StatusResponse {
        worker_id: ctx.state.worker_id().await,
        connected: ctx.state.is_connected(),
        uptime_millis: ctx.state.uptime_millis(),
        declared: ctx.state.declared().await,
        live: ctx.state.live().await,
    })
}

#[derive(Serialize)]
struct ServiceSummary {
    name: String,
    status: ServiceStatus,
    last_error: Option<String>,
    failure_class: Option<FailureClass>,
}

#[handler]
async fn list_services(Data(ctx): Data<&AdminContext>) -> Json<Vec<ServiceSummary>> {
    let records = ctx.supervisor.services().await;
    Json(
        records
            .into_iter()
            .map(|record| ServiceSummary {
                name: record.name,
                status: record.status,
                last_error: record.last_error,
                failure_class: record.failure_class,
            })
            .collect(),
    )
}

#[handler]
async fn get_service(Path(name): Path<String>, Data(ctx): Data<&AdminContext>) -> Response {
    match ctx.supervisor.get(&name).await {
        Some(record) => Json(ServiceSummary {
            name: record.name,
            status: record.status,
            last_error: record.last_error,
            failure_class: record.failure_class,
        })
        .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[handler]
async fn restart_service(Path(name): Path<String>, Data(ctx): Data<&AdminContext>) -> Response {
    let Some(record) = ctx.supervisor.get(&name).await else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let instruction = DeploymentPayload {
        service: name,
        image: record.spec.image,
        env: record.spec.env,
        ports: record.spec.ports,
        volumes: record.spec.volumes,
        resource_limits: record.spec.resource_limits,
        action: DeploymentAction::Restart,
    };

    Json(ctx.supervisor.apply(instruction).await).into_response()
}
