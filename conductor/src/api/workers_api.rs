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

use crate::api::ApiResult;
use crate::auth::OperatorAuth;
use crate::bootstrap::Services;
use crate::error::ConductorError;
use fleet_common::protocol::WorkerRecord;
use poem_openapi::param::Path;
use poem_openapi::payload::Json;
use poem_openapi::{Object, OpenApi};

#[derive(Object, Debug, Clone)]
pub struct WorkersResponse {
    pub workers: Vec<WorkerRecord>,
}

#[derive(Object, Debug, Clone)]
pub struct WorkerResponse {
    pub worker: WorkerRecord,
}

pub struct WorkersApi {
    pub services: Services,
}

#[OpenApi]
impl WorkersApi {
    /// Lists the workers owned by the calling operator.
    #[oai(path = "/workers", method = "get")]
    async fn list(&self, auth: OperatorAuth) -> ApiResult<Json<WorkersResponse>> {
        let workers = self.services.registry.list(&auth.operator_id).await?;
        Ok(Json(WorkersResponse {
            workers: workers.iter().map(|w| w.to_wire()).collect(),
        }))
    }

    #[oai(path = "/workers/:id", method = "get")]
    async fn get(&self, auth: OperatorAuth, id: Path<uuid::Uuid>) -> ApiResult<Json<WorkerResponse>> {
        let worker = self
            .services
            .registry
            .get(id.0)
            .await?
            .filter(|w| w.owner == auth.operator_id)
            .ok_or_else(|| ConductorError::NotFound(format!("worker {}", id.0)))?;

        Ok(Json(WorkerResponse {
            worker: worker.to_wire(),
        }))
    }
}
