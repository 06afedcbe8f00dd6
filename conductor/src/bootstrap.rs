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

//! Wires the standalone components into one running process. Nothing
//! outside this module constructs a [`Persistence`] or a [`WorkerRegistry`]
//! directly.

use crate::auth::{hash_password, OperatorSessions};
use crate::config::ConductorConfig;
use crate::model::{Operator, OperatorId};
use crate::persistence::memory::MemoryPersistence;
use crate::persistence::Persistence;
use crate::registry::WorkerRegistry;
use crate::session::SessionManager;
use crate::subscription::SubscriptionHub;
use crate::sweeper::LivenessSweeper;
use crate::token::TokenStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub struct Services {
    pub config: Arc<ConductorConfig>,
    pub persistence: Arc<dyn Persistence>,
    pub tokens: Arc<TokenStore>,
    pub registry: Arc<WorkerRegistry>,
    pub sessions: Arc<SessionManager>,
    pub hub: Arc<SubscriptionHub>,
    pub operator_sessions: Arc<OperatorSessions>,
}

impl Services {
    pub async fn bootstrap(config: ConductorConfig) -> Result<Self, crate::error::ConductorError> {
        let persistence: Arc<dyn Persistence> = Arc::new(MemoryPersistence::new());
        seed_operators(&persistence, &config).await?;

        let tokens = Arc::new(TokenStore::new(persistence.clone()));
        let (registry, registry_events) = WorkerRegistry::new(persistence.clone());
        let registry = Arc::new(registry);
        let sessions = Arc::new(SessionManager::new());
        let hub = SubscriptionHub::new();

        tokio::spawn(hub.clone().run(registry_events));

        let sweeper = LivenessSweeper::new(
            registry.clone(),
            Duration::from_secs(config.liveness_sweep_interval_seconds),
            config.liveness_window_millis(),
        );
        tokio::spawn(sweeper.run());

        Ok(Self {
            config: Arc::new(config),
            persistence,
            tokens,
            registry,
            sessions,
            hub,
            operator_sessions: OperatorSessions::new(),
        })
    }
}

/// Upserts configured seed operators that don't already exist. An operator
/// whose username is already present is left untouched — seeding must not
/// clobber a password changed since through `/auth/reset-password`.
async fn seed_operators(
    persistence: &Arc<dyn Persistence>,
    config: &ConductorConfig,
) -> Result<(), crate::error::ConductorError> {
    for (username, seed) in &config.seed_operators {
        if persistence.get_operator_by_username(username).await.is_ok() {
            continue;
        }

        info!(username, "seeding operator from configuration");
        let operator = Operator {
            id: OperatorId::new(),
            username: username.clone(),
            email: seed.email.clone(),
            secret_hash: hash_password(&seed.password)?,
            role: seed.role,
        };
        persistence.seed_operator(operator).await?;
    }
    Ok(())
}
