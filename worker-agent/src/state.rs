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

//! The only state shared between the three cooperating tasks (conductor
//! client, resource probe, admin HTTP server). The resources field has a
//! single writer (the probe) and is otherwise read-only.

use fleet_common::protocol::{DeclaredResources, ResourceSnapshot};
use fleet_common::time::now_millis;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

pub struct AgentState {
    worker_id: RwLock<Option<Uuid>>,
    connected: AtomicBool,
    declared: RwLock<Option<DeclaredResources>>,
    live: RwLock<Option<ResourceSnapshot>>,
    started_at: u64,
}

impl AgentState {
    pub fn new() -> Self {
        Self {
            worker_id: RwLock::new(None),
            connected: AtomicBool::new(false),
            declared: RwLock::new(None),
            live: RwLock::new(None),
            started_at: now_millis(),
        }
    }

    pub async fn worker_id(&self) -> Option<Uuid> {
        *self.worker_id.read().await
    }

    pub async fn set_worker_id(&self, id: Uuid) {
        *self.worker_id.write().await = Some(id);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    pub async fn declared(&self) -> Option<DeclaredResources> {
        self.declared.read().await.clone()
    }

    pub async fn set_declared(&self, declared: DeclaredResources) {
        *self.declared.write().await = Some(declared);
    }

    pub async fn live(&self) -> Option<ResourceSnapshot> {
        self.live.read().await.clone()
    }

    pub async fn set_live(&self, snapshot: ResourceSnapshot) {
        *self.live.write().await = Some(snapshot);
    }

    pub fn uptime_millis(&self) -> u64 {
        now_millis().saturating_sub(self.started_at)
    }
}

impl Default for AgentState {
    fn default() -> Self {
        Self::new()
    }
}
