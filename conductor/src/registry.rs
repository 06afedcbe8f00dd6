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

//! Owns the durable record of each worker. All mutations go through a
//! per-worker-id lock so two concurrent `register_or_rebind`/`ping` calls
//! for the same id never interleave; reads go straight to the persistence
//! layer.

use crate::error::ConductorError;
use crate::model::{OperatorId, Worker};
use crate::persistence::Persistence;
use fleet_common::protocol::{DeclaredResources, ResourceSnapshot, WorkerStatus};
use fleet_common::time::{clamp_to_now, now_millis};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use uuid::Uuid;

/// Emitted by the registry whenever worker state meaningfully changes.
/// This is the typed channel the subscription hub consumes, in place of an
/// ad-hoc event emitter.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    Online(Worker),
    Offline(Uuid),
    ResourcesUpdated(Uuid, DeclaredResources),
    LiveUpdate(Uuid, ResourceSnapshot, u64),
}

pub struct WorkerRegistry {
    persistence: Arc<dyn Persistence>,
    locks: RwLock<HashMap<Uuid, Arc<Mutex<()>>>>,
    events: mpsc::UnboundedSender<RegistryEvent>,
}

impl WorkerRegistry {
    pub fn new(
        persistence: Arc<dyn Persistence>,
    ) -> (Self, mpsc::UnboundedReceiver<RegistryEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                persistence,
                locks: RwLock::new(HashMap::new()),
                events: tx,
            },
            rx,
        )
    }

    async fn lock_for(&self, id: Uuid) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().await.get(&id) {
            return lock.clone();
        }
        let mut locks = self.locks.write().await;
        locks.entry(id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    fn emit(&self, event: RegistryEvent) {
        // An unbounded channel here is deliberate: the hub is the only
        // receiver, is always draining, and losing a lifecycle event would
        // violate the FIFO/at-most-once delivery contract. Back-pressure
        // toward slow *subscribers* is handled inside the hub instead.
        let _ = self.events.send(event);
    }

    pub async fn register_or_rebind(
        &self,
        owner: OperatorId,
        hostname: String,
        ip_address: String,
        declared: DeclaredResources,
    ) -> Result<Worker, ConductorError> {
        let existing = self
            .persistence
            .find_worker_by_host_ip(&hostname, &ip_address)
            .await?;

        let (id, is_rebind) = match &existing {
            Some(w) if w.owner == owner => (w.id, true),
            _ => (Uuid::new_v4(), false),
        };

        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let now = now_millis();
        let prior = self.persistence.get_worker(id).await?;

        let worker = Worker {
            id,
            owner,
            hostname,
            ip_address,
            status: WorkerStatus::Online,
            declared: declared.clone(),
            live: prior.as_ref().and_then(|w| w.live.clone()),
            last_seen: now,
            created_at: prior.as_ref().map(|w| w.created_at).unwrap_or(now),
        };

        let worker = self.persistence.upsert_worker(worker).await?;

        let became_online = !matches!(
            prior.as_ref().map(|w| w.status),
            Some(WorkerStatus::Online)
        );
        if became_online {
            self.emit(RegistryEvent::Online(worker.clone()));
        }

        if is_rebind {
            if let Some(prior) = &prior {
                if prior.declared != declared {
                    self.emit(RegistryEvent::ResourcesUpdated(id, declared));
                }
            }
        }

        Ok(worker)
    }

    pub async fn record_ping(
        &self,
        worker_id: Uuid,
        timestamp: u64,
        resources: Option<ResourceSnapshot>,
    ) -> Result<Worker, ConductorError> {
        let lock = self.lock_for(worker_id).await;
        let _guard = lock.lock().await;

        let mut worker = self
            .persistence
            .get_worker(worker_id)
            .await?
            .ok_or_else(|| ConductorError::NotFound(format!("worker {worker_id}")))?;

        let now = now_millis();
        let clamped = clamp_to_now(timestamp, now);

        let was_offline = worker.status == WorkerStatus::Offline;
        worker.last_seen = clamped;
        if was_offline {
            worker.status = WorkerStatus::Online;
        }

        if let Some(update) = &resources {
            let mut live = worker.live.clone().unwrap_or_default();
            live.merge_from(update);
            worker.live = Some(live);
        }

        let live_snapshot = worker.live.clone().unwrap_or_else(|| ResourceSnapshot {
            timestamp: clamped,
            ..Default::default()
        });

        let worker = self.persistence.upsert_worker(worker).await?;

        if was_offline {
            self.emit(RegistryEvent::Online(worker.clone()));
        }
        self.emit(RegistryEvent::LiveUpdate(worker_id, live_snapshot, clamped));

        Ok(worker)
    }

    pub async fn record_resources(
        &self,
        worker_id: Uuid,
        snapshot: ResourceSnapshot,
    ) -> Result<Worker, ConductorError> {
        let lock = self.lock_for(worker_id).await;
        let _guard = lock.lock().await;

        let mut worker = self
            .persistence
            .get_worker(worker_id)
            .await?
            .ok_or_else(|| ConductorError::NotFound(format!("worker {worker_id}")))?;

        let mut live = worker.live.clone().unwrap_or_default();
        live.merge_from(&snapshot);
        worker.live = Some(live.clone());

        let worker = self.persistence.upsert_worker(worker).await?;

        self.emit(RegistryEvent::LiveUpdate(worker_id, live.clone(), live.timestamp));

        Ok(worker)
    }

    pub async fn mark_offline(&self, worker_id: Uuid) -> Result<(), ConductorError> {
        let lock = self.lock_for(worker_id).await;
        let _guard = lock.lock().await;

        let Some(mut worker) = self.persistence.get_worker(worker_id).await? else {
            return Ok(());
        };

        if worker.status == WorkerStatus::Offline {
            return Ok(());
        }

        worker.status = WorkerStatus::Offline;
        self.persistence.upsert_worker(worker).await?;
        self.emit(RegistryEvent::Offline(worker_id));
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Worker>, ConductorError> {
        self.persistence.get_worker(id).await
    }

    pub async fn list(&self, owner: &OperatorId) -> Result<Vec<Worker>, ConductorError> {
        self.persistence.list_workers(owner).await
    }

    pub async fn list_all(&self) -> Result<Vec<Worker>, ConductorError> {
        self.persistence.list_all_workers().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::memory::MemoryPersistence;

    fn declared() -> DeclaredResources {
        DeclaredResources {
            cpu_cores: 4,
            ram_gb: 8.0,
            disk_gb: 100.0,
        }
    }

    #[tokio::test]
    async fn reregistration_returns_the_same_worker_id() {
        let (registry, _rx) = WorkerRegistry::new(Arc::new(MemoryPersistence::new()));
        let owner = OperatorId::new();

        let first = registry
            .register_or_rebind(owner.clone(), "w1".into(), "10.0.0.2".into(), declared())
            .await
            .unwrap();
        let second = registry
            .register_or_rebind(owner, "w1".into(), "10.0.0.2".into(), declared())
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn only_the_first_registration_emits_online() {
        let (registry, mut rx) = WorkerRegistry::new(Arc::new(MemoryPersistence::new()));
        let owner = OperatorId::new();

        registry
            .register_or_rebind(owner.clone(), "w1".into(), "10.0.0.2".into(), declared())
            .await
            .unwrap();
        registry
            .register_or_rebind(owner, "w1".into(), "10.0.0.2".into(), declared())
            .await
            .unwrap();

        let mut online_events = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, RegistryEvent::Online(_)) {
                online_events += 1;
            }
        }
        assert_eq!(online_events, 1);
    }

    #[tokio::test]
    async fn ping_clamps_future_timestamps_to_now() {
        let (registry, _rx) = WorkerRegistry::new(Arc::new(MemoryPersistence::new()));
        let owner = OperatorId::new();
        let worker = registry
            .register_or_rebind(owner, "w1".into(), "10.0.0.2".into(), declared())
            .await
            .unwrap();

        let far_future = now_millis() + 60_000;
        let updated = registry
            .record_ping(worker.id, far_future, None)
            .await
            .unwrap();

        assert!(updated.last_seen < far_future);
    }

    #[tokio::test]
    async fn missing_resource_field_leaves_the_rest_untouched() {
        use fleet_common::protocol::{CpuSnapshot, RamSnapshot};

        let (registry, _rx) = WorkerRegistry::new(Arc::new(MemoryPersistence::new()));
        let owner = OperatorId::new();
        let worker = registry
            .register_or_rebind(owner, "w1".into(), "10.0.0.2".into(), declared())
            .await
            .unwrap();

        registry
            .record_resources(
                worker.id,
                ResourceSnapshot {
                    cpu: Some(CpuSnapshot {
                        usage_percent: 12.0,
                        per_core: vec![],
                    }),
                    ram: Some(RamSnapshot {
                        total_gb: 16.0,
                        used_gb: 2.0,
                        usage_percent: 12.5,
                    }),
                    disk: None,
                    network: None,
                    timestamp: 1,
                },
            )
            .await
            .unwrap();

        let updated = registry
            .record_resources(
                worker.id,
                ResourceSnapshot {
                    cpu: None,
                    ram: Some(RamSnapshot {
                        total_gb: 16.0,
                        used_gb: 4.0,
                        usage_percent: 25.0,
                    }),
                    disk: None,
                    network: None,
                    timestamp: 2,
                },
            )
            .await
            .unwrap();

        let live = updated.live.unwrap();
        assert_eq!(live.cpu.unwrap().usage_percent, 12.0);
        assert_eq!(live.ram.unwrap().used_gb, 4.0);
    }

    #[tokio::test]
    async fn mark_offline_is_idempotent() {
        let (registry, mut rx) = WorkerRegistry::new(Arc::new(MemoryPersistence::new()));
        let owner = OperatorId::new();
        let worker = registry
            .register_or_rebind(owner, "w1".into(), "10.0.0.2".into(), declared())
            .await
            .unwrap();

        registry.mark_offline(worker.id).await.unwrap();
        registry.mark_offline(worker.id).await.unwrap();

        let mut offline_events = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, RegistryEvent::Offline(_)) {
                offline_events += 1;
            }
        }
        assert_eq!(offline_events, 1);
    }
}
