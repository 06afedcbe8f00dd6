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

//! Tracks live worker sessions and enforces that at most one
//! `AUTHENTICATED` session exists per worker id. A second successful
//! registration for the same worker id displaces the older session by
//! cancelling its [`CancellationToken`] — the ingress task owning that
//! socket observes the cancellation and closes with `Superseded`.

use fleet_common::time::now_millis;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

struct SessionInfo {
    worker_id: Option<Uuid>,
    connected_at: u64,
    last_ping_at: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<Uuid, SessionInfo>>,
    by_worker: RwLock<HashMap<Uuid, Uuid>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new socket has connected; no worker bound yet (`CONNECTED`
    /// state). Returns the session id and a token the caller selects on
    /// alongside socket reads, cancelled if this session is superseded.
    pub async fn connect(&self) -> (Uuid, CancellationToken) {
        let session_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let now = now_millis();
        self.sessions.write().await.insert(
            session_id,
            SessionInfo {
                worker_id: None,
                connected_at: now,
                last_ping_at: now,
                cancel: cancel.clone(),
            },
        );
        (session_id, cancel)
    }

    /// Transitions a session into `AUTHENTICATED` for `worker_id`,
    /// displacing whatever session was previously authenticated for the
    /// same worker id.
    pub async fn authenticate(&self, session_id: Uuid, worker_id: Uuid) {
        {
            let mut sessions = self.sessions.write().await;
            if let Some(info) = sessions.get_mut(&session_id) {
                info.worker_id = Some(worker_id);
            }
        }

        let previous = {
            let mut by_worker = self.by_worker.write().await;
            by_worker.insert(worker_id, session_id)
        };

        if let Some(previous_session_id) = previous {
            if previous_session_id != session_id {
                if let Some(info) = self.sessions.read().await.get(&previous_session_id) {
                    info.cancel.cancel();
                }
            }
        }
    }

    pub async fn record_ping(&self, session_id: Uuid) {
        if let Some(info) = self.sessions.write().await.get_mut(&session_id) {
            info.last_ping_at = now_millis();
        }
    }

    /// Cleans up session bookkeeping on disconnect. Only clears the
    /// worker->session mapping if this session is still the current holder
    /// — a superseded session's cleanup must not evict its successor.
    pub async fn disconnect(&self, session_id: Uuid) {
        let worker_id = self
            .sessions
            .write()
            .await
            .remove(&session_id)
            .and_then(|info| info.worker_id);

        if let Some(worker_id) = worker_id {
            let mut by_worker = self.by_worker.write().await;
            if by_worker.get(&worker_id) == Some(&session_id) {
                by_worker.remove(&worker_id);
            }
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_registration_cancels_the_first_session() {
        let manager = SessionManager::new();
        let worker_id = Uuid::new_v4();

        let (first_id, first_cancel) = manager.connect().await;
        manager.authenticate(first_id, worker_id).await;
        assert!(!first_cancel.is_cancelled());

        let (second_id, _second_cancel) = manager.connect().await;
        manager.authenticate(second_id, worker_id).await;

        assert!(first_cancel.is_cancelled());
    }

    #[tokio::test]
    async fn disconnecting_a_superseded_session_does_not_evict_its_successor() {
        let manager = SessionManager::new();
        let worker_id = Uuid::new_v4();

        let (first_id, _first_cancel) = manager.connect().await;
        manager.authenticate(first_id, worker_id).await;

        let (second_id, _second_cancel) = manager.connect().await;
        manager.authenticate(second_id, worker_id).await;

        manager.disconnect(first_id).await;

        assert_eq!(manager.by_worker.read().await.get(&worker_id), Some(&second_id));
    }
}
