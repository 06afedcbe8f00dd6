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

use conductor::config::make_config_loader;
use conductor::Conductor;
use fleet_common::tracing_setup::init_tracing;
use fleet_common::SafeDisplay;
use tokio::task::JoinSet;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = make_config_loader().load()?;
    init_tracing(&config.tracing);

    info!("starting conductor\n{}", config.to_safe_string());

    let conductor = Conductor::new(config).await?;

    let mut join_set = JoinSet::new();
    conductor.run(&mut join_set).await?;

    while let Some(result) = join_set.join_next().await {
        result??;
    }

    Ok(())
}
