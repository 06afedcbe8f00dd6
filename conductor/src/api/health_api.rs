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

use crate::bootstrap::Services;
use poem_openapi::payload::Json;
use poem_openapi::{Object, OpenApi};

#[derive(Object, Debug, Clone)]
pub struct HealthResponse {
    pub healthy: bool,
    pub persistence_reachable: bool,
    pub session_count: usize,
}

pub struct HealthApi {
    pub services: Services,
}

#[OpenApi]
impl HealthApi {
    /// Self-check: confirms the persistence backend answers and reports
    /// the number of currently connected worker sessions.
    #[oai(path = "/health", method = "get")]
    async fn health(&self) -> Json<HealthResponse> {
        let persistence_reachable = self.services.persistence.list_all_workers().await.is_ok();
        let session_count = self.services.sessions.session_count().await;

        Json(HealthResponse {
            healthy: persistence_reachable,
            persistence_reachable,
            session_count,
        })
    }
}
