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

pub mod admin;
pub mod client;
pub mod config;
pub mod error;
pub mod probe;
pub mod runtime;
pub mod state;
pub mod supervisor;

use crate::admin::AdminContext;
use crate::client::ConductorClient;
use crate::config::WorkerAgentConfig;
use crate::probe::ResourceProbe;
use crate::runtime::{BollardRuntime, ContainerRuntime};
use crate::state::AgentState;
use crate::supervisor::DeploymentSupervisor;
use poem::listener::{Acceptor, Listener, TcpListener};
use poem::EndpointExt;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, Instrument};

/// Composition root: wires the three cooperating tasks (conductor client,
/// admin HTTP server, resource probe feeding the client's heartbeat) around
/// the single shared [`AgentState`].
pub struct WorkerAgent {
    config: Arc<WorkerAgentConfig>,
    state: Arc<AgentState>,
    supervisor: Arc<DeploymentSupervisor>,
}

impl WorkerAgent {
    pub fn new(config: WorkerAgentConfig) -> Result<Self, anyhow::Error> {
        let runtime: Arc<dyn ContainerRuntime> = Arc::new(BollardRuntime::connect()?);
        Ok(Self {
            config: Arc::new(config),
            state: Arc::new(AgentState::new()),
            supervisor: Arc::new(DeploymentSupervisor::new(runtime)),
        })
    }

    /// Spawns the conductor client and the admin HTTP server on
    /// `join_set`, returning the admin server's bound port.
    pub async fn run(
        &self,
        join_set: &mut JoinSet<Result<(), anyhow::Error>>,
        shutdown: CancellationToken,
    ) -> Result<u16, anyhow::Error> {
        let client = ConductorClient::new(
            self.config.clone(),
            self.state.clone(),
            self.supervisor.clone(),
        );
        let probe = ResourceProbe::new();
        let client_shutdown = shutdown.clone();
        join_set.spawn(
            async move {
                client.run(probe, client_shutdown).await;
                Ok(())
            }
            .in_current_span(),
        );

        let ctx = AdminContext {
            state: self.state.clone(),
            supervisor: self.supervisor.clone(),
        };
        let app = admin::routes().data(ctx).boxed();

        let listener = TcpListener::bind(format!("0.0.0.0:{}", self.config.port));
        let acceptor = listener.into_acceptor().await?;
        let port = acceptor.local_addr()[0]
            .as_socket_addr()
            .expect("socket address")
            .port();

        info!(port, "worker-agent admin server listening");

        join_set.spawn(
            async move {
                poem::Server::new_with_acceptor(acceptor)
                    .run(app)
                    .await
                    .map_err(|error| error.into())
            }
            .in_current_span(),
        );

        Ok(port)
    }
}
