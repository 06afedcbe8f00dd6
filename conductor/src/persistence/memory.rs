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

//! The reference persistence backend: a process-local table behind a
//! `tokio::sync::RwLock`. Registration tokens are stored as plaintext here
//! (a documented choice, see DESIGN.md) rather than hashed, since a worker
//! must be able to present the same token it received from `GET /token`.

use super::Persistence;
use crate::error::ConductorError;
use crate::model::{Operator, OperatorId, RegistrationToken, Worker};
use async_trait::async_trait;
use fleet_common::time::now_millis;
use rand::distr::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    operators_by_id: HashMap<OperatorId, Operator>,
    operators_by_username: HashMap<String, OperatorId>,
    tokens_by_operator: HashMap<OperatorId, RegistrationToken>,
    workers: HashMap<Uuid, Worker>,
}

pub struct MemoryPersistence {
    tables: RwLock<Tables>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    /// A fresh, unguessable token value: 192 bits of randomness,
    /// alphanumeric so it is transport-safe without further encoding.
    fn generate_token_value() -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect()
    }
}

impl Default for MemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn get_operator(&self, id: &OperatorId) -> Result<Operator, ConductorError> {
        let tables = self.tables.read().await;
        tables
            .operators_by_id
            .get(id)
            .cloned()
            .ok_or_else(|| ConductorError::NotFound(format!("operator {}", id.0)))
    }

    async fn get_operator_by_username(&self, username: &str) -> Result<Operator, ConductorError> {
        let needle = username.to_lowercase();
        let tables = self.tables.read().await;
        let id = tables
            .operators_by_username
            .get(&needle)
            .ok_or_else(|| ConductorError::NotFound(format!("operator {username}")))?;
        Ok(tables.operators_by_id[id].clone())
    }

    async fn seed_operator(&self, operator: Operator) -> Result<(), ConductorError> {
        let mut tables = self.tables.write().await;
        let username = operator.username.to_lowercase();
        tables
            .operators_by_username
            .insert(username, operator.id.clone());
        tables.operators_by_id.insert(operator.id.clone(), operator);
        Ok(())
    }

    async fn update_operator(
        &self,
        id: &OperatorId,
        username: Option<String>,
        email: Option<String>,
        secret_hash: Option<String>,
    ) -> Result<Operator, ConductorError> {
        let mut tables = self.tables.write().await;

        if let Some(new_username) = &username {
            let needle = new_username.to_lowercase();
            if let Some(existing) = tables.operators_by_username.get(&needle) {
                if existing != id {
                    return Err(ConductorError::Conflict(format!(
                        "username {new_username} is already in use"
                    )));
                }
            }
        }

        let operator = tables
            .operators_by_id
            .get_mut(id)
            .ok_or_else(|| ConductorError::NotFound(format!("operator {}", id.0)))?;

        let old_username = operator.username.to_lowercase();
        if let Some(new_username) = username {
            operator.username = new_username;
        }
        if let Some(new_email) = email {
            operator.email = new_email;
        }
        if let Some(new_hash) = secret_hash {
            operator.secret_hash = new_hash;
        }

        let updated = operator.clone();
        let new_username = updated.username.to_lowercase();
        if new_username != old_username {
            tables.operators_by_username.remove(&old_username);
            tables.operators_by_username.insert(new_username, id.clone());
        }

        Ok(updated)
    }

    async fn get_token_for(&self, operator: &OperatorId) -> Result<RegistrationToken, ConductorError> {
        {
            let tables = self.tables.read().await;
            if let Some(token) = tables.tokens_by_operator.get(operator) {
                return Ok(token.clone());
            }
        }
        // First access: mint one now, atomically, under the write lock.
        self.rotate_token_for(operator).await
    }

    async fn rotate_token_for(&self, operator: &OperatorId) -> Result<RegistrationToken, ConductorError> {
        let mut tables = self.tables.write().await;
        if !tables.operators_by_id.contains_key(operator) {
            return Err(ConductorError::NotFound(format!("operator {}", operator.0)));
        }

        let token = RegistrationToken {
            value: Self::generate_token_value(),
            owner: operator.clone(),
            created_at: now_millis(),
        };
        tables.tokens_by_operator.insert(operator.clone(), token.clone());
        Ok(token)
    }

    async fn find_token_owner(&self, token_value: &str) -> Result<OperatorId, ConductorError> {
        let tables = self.tables.read().await;
        tables
            .tokens_by_operator
            .values()
            .find(|t| t.value == token_value)
            .map(|t| t.owner.clone())
            .ok_or_else(|| ConductorError::Unauthorized("invalid registration token".to_string()))
    }

    async fn find_worker_by_host_ip(
        &self,
        hostname: &str,
        ip_address: &str,
    ) -> Result<Option<Worker>, ConductorError> {
        let tables = self.tables.read().await;
        Ok(tables
            .workers
            .values()
            .find(|w| w.hostname == hostname && w.ip_address == ip_address)
            .cloned())
    }

    async fn get_worker(&self, id: Uuid) -> Result<Option<Worker>, ConductorError> {
        let tables = self.tables.read().await;
        Ok(tables.workers.get(&id).cloned())
    }

    async fn upsert_worker(&self, worker: Worker) -> Result<Worker, ConductorError> {
        let mut tables = self.tables.write().await;
        tables.workers.insert(worker.id, worker.clone());
        Ok(worker)
    }

    async fn list_workers(&self, owner: &OperatorId) -> Result<Vec<Worker>, ConductorError> {
        let tables = self.tables.read().await;
        Ok(tables
            .workers
            .values()
            .filter(|w| &w.owner == owner)
            .cloned()
            .collect())
    }

    async fn list_all_workers(&self) -> Result<Vec<Worker>, ConductorError> {
        let tables = self.tables.read().await;
        Ok(tables.workers.values().cloned().collect())
    }
}
