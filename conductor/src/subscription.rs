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

//! Fans registry events out to connected operator sessions. Every session
//! holds an implicit wildcard subscription for the three lifecycle events
//! (`worker:online`, `worker:offline`, `worker:resources:updated`);
//! `worker:live:update`, the high-frequency telemetry event, is only
//! delivered for worker ids the session has explicitly subscribed to.
//! Delivery is at-most-once and non-blocking: a slow subscriber's bounded
//! queue drops the oldest buffered event on overflow rather than stalling
//! the others.

use crate::registry::RegistryEvent;
use fleet_common::protocol::{
    OperatorOutboundEvent, ResourcesUpdatedPayload, WorkerOfflinePayload, WorkerOnlinePayload,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify, RwLock};
use uuid::Uuid;

/// Outbound queue capacity per subscriber.
const QUEUE_CAPACITY: usize = 256;

struct SubscriberQueue {
    buffer: std::sync::Mutex<VecDeque<OperatorOutboundEvent>>,
    notify: Notify,
    dropped: AtomicU64,
}

impl SubscriberQueue {
    fn new() -> Self {
        Self {
            buffer: std::sync::Mutex::new(VecDeque::with_capacity(QUEUE_CAPACITY)),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    fn push(&self, event: OperatorOutboundEvent) {
        let mut buffer = self.buffer.lock().expect("subscriber queue poisoned");
        if buffer.len() >= QUEUE_CAPACITY {
            buffer.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        buffer.push_back(event);
        drop(buffer);
        self.notify.notify_one();
    }

    async fn pop(&self) -> OperatorOutboundEvent {
        loop {
            if let Some(event) = self.buffer.lock().expect("subscriber queue poisoned").pop_front() {
                return event;
            }
            self.notify.notified().await;
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

struct Subscriber {
    queue: SubscriberQueue,
    specific: RwLock<HashSet<Uuid>>,
}

/// A handle a websocket task uses to pull events for one connected
/// operator session and to mutate its own subscription set.
pub struct SubscriberHandle {
    id: Uuid,
    subscriber: Arc<Subscriber>,
    hub: Arc<SubscriptionHub>,
}

impl SubscriberHandle {
    pub async fn subscribe(&self, worker_id: Uuid) {
        self.subscriber.specific.write().await.insert(worker_id);
    }

    pub async fn unsubscribe(&self, worker_id: Uuid) {
        self.subscriber.specific.write().await.remove(&worker_id);
    }

    pub async fn recv(&self) -> OperatorOutboundEvent {
        self.subscriber.queue.pop().await
    }

    pub fn dropped_count(&self) -> u64 {
        self.subscriber.queue.dropped_count()
    }
}

impl Drop for SubscriberHandle {
    fn drop(&mut self) {
        let hub = self.hub.clone();
        let id = self.id;
        tokio::spawn(async move {
            hub.subscribers.write().await.remove(&id);
        });
    }
}

pub struct SubscriptionHub {
    subscribers: RwLock<HashMap<Uuid, Arc<Subscriber>>>,
}

impl SubscriptionHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            subscribers: RwLock::new(HashMap::new()),
        })
    }

    /// Registers a newly connected, authenticated operator session. The
    /// returned handle owns the WILDCARD lifecycle subscription implicitly;
    /// callers add worker-specific live-telemetry interest with `subscribe`.
    pub async fn connect(self: &Arc<Self>, session_id: Uuid) -> SubscriberHandle {
        let subscriber = Arc::new(Subscriber {
            queue: SubscriberQueue::new(),
            specific: RwLock::new(HashSet::new()),
        });
        self.subscribers
            .write()
            .await
            .insert(session_id, subscriber.clone());

        SubscriberHandle {
            id: session_id,
            subscriber,
            hub: self.clone(),
        }
    }

    /// Drains registry events forever, fanning each one out. Meant to be
    /// spawned once at bootstrap as its own task.
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<RegistryEvent>) {
        while let Some(event) = events.recv().await {
            self.dispatch(event).await;
        }
    }

    async fn dispatch(&self, event: RegistryEvent) {
        let subscribers = self.subscribers.read().await;

        match event {
            RegistryEvent::Online(worker) => {
                let wire = OperatorOutboundEvent::Online(WorkerOnlinePayload {
                    worker_id: worker.id,
                    worker: worker.to_wire(),
                });
                for subscriber in subscribers.values() {
                    subscriber.queue.push(wire.clone());
                }
            }
            RegistryEvent::Offline(worker_id) => {
                let wire = OperatorOutboundEvent::Offline(WorkerOfflinePayload { worker_id });
                for subscriber in subscribers.values() {
                    subscriber.queue.push(wire.clone());
                }
            }
            RegistryEvent::ResourcesUpdated(worker_id, resources) => {
                let wire = OperatorOutboundEvent::ResourcesUpdated(ResourcesUpdatedPayload {
                    worker_id,
                    resources,
                });
                for subscriber in subscribers.values() {
                    subscriber.queue.push(wire.clone());
                }
            }
            RegistryEvent::LiveUpdate(worker_id, resources, timestamp) => {
                let wire = OperatorOutboundEvent::LiveUpdate(fleet_common::protocol::LiveUpdatePayload {
                    worker_id,
                    resources,
                    timestamp,
                });
                for subscriber in subscribers.values() {
                    if subscriber.specific.read().await.contains(&worker_id) {
                        subscriber.queue.push(wire.clone());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OperatorId, Worker};
    use fleet_common::protocol::{DeclaredResources, ResourceSnapshot, WorkerStatus};

    fn worker(id: Uuid) -> Worker {
        Worker {
            id,
            owner: OperatorId::new(),
            hostname: "w1".to_string(),
            ip_address: "10.0.0.2".to_string(),
            status: WorkerStatus::Online,
            declared: DeclaredResources {
                cpu_cores: 4,
                ram_gb: 8.0,
                disk_gb: 100.0,
            },
            live: None,
            last_seen: 0,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn subscription_filters_live_updates_to_the_subscribed_worker() {
        let hub = SubscriptionHub::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let hub_task = hub.clone();
        tokio::spawn(hub_task.run(rx));

        let handle = hub.connect(Uuid::new_v4()).await;
        let w1 = Uuid::new_v4();
        let w2 = Uuid::new_v4();
        handle.subscribe(w1).await;

        tx.send(RegistryEvent::LiveUpdate(w2, ResourceSnapshot::default(), 1))
            .unwrap();
        tx.send(RegistryEvent::LiveUpdate(w1, ResourceSnapshot::default(), 2))
            .unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_secs(1), handle.recv())
            .await
            .expect("expected exactly one delivered event");

        match event {
            OperatorOutboundEvent::LiveUpdate(payload) => assert_eq!(payload.worker_id, w1),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn lifecycle_events_reach_every_session_without_explicit_subscription() {
        let hub = SubscriptionHub::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let hub_task = hub.clone();
        tokio::spawn(hub_task.run(rx));

        let handle = hub.connect(Uuid::new_v4()).await;
        let id = Uuid::new_v4();
        tx.send(RegistryEvent::Online(worker(id))).unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_secs(1), handle.recv())
            .await
            .expect("expected an online event");
        assert!(matches!(event, OperatorOutboundEvent::Online(_)));
    }

    #[tokio::test]
    async fn overflow_drops_the_oldest_events_only() {
        let queue = SubscriberQueue::new();
        for i in 0..(QUEUE_CAPACITY + 10) {
            queue.push(OperatorOutboundEvent::Offline(WorkerOfflinePayload {
                worker_id: Uuid::from_u128(i as u128),
            }));
        }
        assert_eq!(queue.dropped_count(), 10);

        let first = queue.pop().await;
        match first {
            OperatorOutboundEvent::Offline(payload) => {
                assert_eq!(payload.worker_id, Uuid::from_u128(10));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
