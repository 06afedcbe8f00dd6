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

use fleet_common::protocol::{DeclaredResources, ResourceSnapshot, WorkerRecord, WorkerStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperatorId(pub Uuid);

impl OperatorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OperatorId {
    fn default() -> Self {
        Self::new()
    }
}

/// A human account allowed to administer the fleet. `username` is unique
/// case-insensitively; `secret_hash` is an Argon2id PHC string, never the
/// plaintext password.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operator {
    pub id: OperatorId,
    pub username: String,
    pub email: String,
    pub secret_hash: String,
    pub role: OperatorRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, poem_openapi::Enum)]
#[serde(rename_all = "snake_case")]
#[oai(rename_all = "snake_case")]
pub enum OperatorRole {
    Admin,
    Member,
}

/// The bearer credential that lets a worker self-enroll. Exactly one
/// active token per operator; `rotate` replaces it atomically and the
/// prior value is immediately invalid on the next lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationToken {
    pub value: String,
    pub owner: OperatorId,
    pub created_at: u64,
}

/// A registered node, as tracked by the conductor. `id` is stable across
/// reconnects; `(hostname, ip_address)` is the natural re-identification
/// key used when a worker does not present a prior id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: Uuid,
    pub owner: OperatorId,
    pub hostname: String,
    pub ip_address: String,
    pub status: WorkerStatus,
    pub declared: DeclaredResources,
    pub live: Option<ResourceSnapshot>,
    pub last_seen: u64,
    pub created_at: u64,
}

impl Worker {
    pub fn to_wire(&self) -> WorkerRecord {
        WorkerRecord {
            id: self.id,
            hostname: self.hostname.clone(),
            ip_address: self.ip_address.clone(),
            status: self.status,
            declared: self.declared.clone(),
            live: self.live.clone(),
            last_seen: self.last_seen,
            created_at: self.created_at,
        }
    }
}
