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

//! The persistence contract the core depends on. Everything above this
//! trait (registry, token store, REST handlers) is backend-agnostic; only
//! [`memory::MemoryPersistence`] is provided here, but a SQL-backed
//! implementation is a drop-in replacement. Adapters are selected once, at
//! startup (see `bootstrap`), never mixed at runtime.

pub mod memory;

use crate::error::ConductorError;
use crate::model::{Operator, OperatorId, RegistrationToken, Worker};
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait Persistence: Send + Sync {
    async fn get_operator(&self, id: &OperatorId) -> Result<Operator, ConductorError>;

    async fn get_operator_by_username(&self, username: &str) -> Result<Operator, ConductorError>;

    /// Upserts an operator by username, used only by startup seeding; the
    /// core never creates operators in response to API traffic.
    async fn seed_operator(&self, operator: Operator) -> Result<(), ConductorError>;

    async fn update_operator(
        &self,
        id: &OperatorId,
        username: Option<String>,
        email: Option<String>,
        secret_hash: Option<String>,
    ) -> Result<Operator, ConductorError>;

    async fn get_token_for(&self, operator: &OperatorId) -> Result<RegistrationToken, ConductorError>;

    async fn rotate_token_for(&self, operator: &OperatorId) -> Result<RegistrationToken, ConductorError>;

    /// Resolves a bearer registration token value to its owning operator.
    /// Fails with `Unauthorized` if the value does not match any active
    /// token (including a value that was rotated away).
    async fn find_token_owner(&self, token_value: &str) -> Result<OperatorId, ConductorError>;

    async fn find_worker_by_host_ip(
        &self,
        hostname: &str,
        ip_address: &str,
    ) -> Result<Option<Worker>, ConductorError>;

    async fn get_worker(&self, id: Uuid) -> Result<Option<Worker>, ConductorError>;

    async fn upsert_worker(&self, worker: Worker) -> Result<Worker, ConductorError>;

    async fn list_workers(&self, owner: &OperatorId) -> Result<Vec<Worker>, ConductorError>;

    async fn list_all_workers(&self) -> Result<Vec<Worker>, ConductorError>;
}
