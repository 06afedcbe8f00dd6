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

use fleet_common::tracing_setup::init_tracing;
use fleet_common::SafeDisplay;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;
use worker_agent::config::make_config_loader;
use worker_agent::WorkerAgent;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = make_config_loader().load()?;
    init_tracing(&config.tracing);

    info!("starting worker-agent\n{}", config.to_safe_string());

    let agent = WorkerAgent::new(config)?;
    let shutdown = CancellationToken::new();

    let mut join_set: JoinSet<Result<(), anyhow::Error>> = JoinSet::new();
    agent.run(&mut join_set, shutdown.clone()).await?;

    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        shutdown_signal.cancel();
    });

    while let Some(result) = join_set.join_next().await {
        result??;
    }

    Ok(())
}
