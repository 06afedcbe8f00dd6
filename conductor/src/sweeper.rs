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

//! The only component allowed to promote a worker to `offline`. Pings are
//! the only thing that promote a worker back to `online` (see
//! [`crate::registry::WorkerRegistry::record_ping`]).

use crate::registry::WorkerRegistry;
use fleet_common::protocol::WorkerStatus;
use fleet_common::time::now_millis;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct LivenessSweeper {
    registry: Arc<WorkerRegistry>,
    sweep_interval: Duration,
    liveness_window_millis: u64,
}

impl LivenessSweeper {
    pub fn new(
        registry: Arc<WorkerRegistry>,
        sweep_interval: Duration,
        liveness_window_millis: u64,
    ) -> Self {
        Self {
            registry,
            sweep_interval,
            liveness_window_millis,
        }
    }

    /// Runs forever, one sweep per tick, until the process shuts down.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.sweep_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(error) = self.sweep_once().await {
                warn!("liveness sweep failed: {error}");
            }
        }
    }

    async fn sweep_once(&self) -> Result<(), crate::error::ConductorError> {
        let now = now_millis();
        let workers = self.registry.list_all().await?;

        for worker in workers {
            if worker.status != WorkerStatus::Online {
                continue;
            }
            if now.saturating_sub(worker.last_seen) > self.liveness_window_millis {
                info!(worker_id = %worker.id, "liveness window elapsed, marking offline");
                self.registry.mark_offline(worker.id).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OperatorId;
    use crate::persistence::memory::MemoryPersistence;
    use std::sync::Arc;

    #[tokio::test]
    async fn sweep_marks_stale_online_workers_offline() {
        let (registry, _rx) = WorkerRegistry::new(Arc::new(MemoryPersistence::new()));
        let registry = Arc::new(registry);
        let owner = OperatorId::new();

        let worker = registry
            .register_or_rebind(
                owner,
                "w1".into(),
                "10.0.0.2".into(),
                fleet_common::protocol::DeclaredResources {
                    cpu_cores: 1,
                    ram_gb: 1.0,
                    disk_gb: 1.0,
                },
            )
            .await
            .unwrap();

        // Backdate last_seen well past the liveness window by pinging with
        // a timestamp far in the past isn't possible (clamp only affects
        // the future); instead shrink the window to zero so "just
        // registered" already counts as stale.
        let sweeper = LivenessSweeper::new(registry.clone(), Duration::from_millis(10), 0);
        sweeper.sweep_once().await.unwrap();

        let updated = registry.get(worker.id).await.unwrap().unwrap();
        assert_eq!(updated.status, fleet_common::protocol::WorkerStatus::Offline);
    }
}
