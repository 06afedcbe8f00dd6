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

use fleet_common::config::ConfigLoader;
use fleet_common::tracing_setup::TracingConfig;
use fleet_common::SafeDisplay;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::PathBuf;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerAgentConfig {
    pub tracing: TracingConfig,
    pub conductor_url: String,
    pub conductor_token: String,
    pub port: u16,
    pub heartbeat_interval_seconds: u64,
    pub resource_check_interval_seconds: u64,
}

impl WorkerAgentConfig {
    pub fn heartbeat_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.heartbeat_interval_seconds)
    }

    pub fn resource_check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.resource_check_interval_seconds)
    }
}

impl Default for WorkerAgentConfig {
    fn default() -> Self {
        Self {
            tracing: TracingConfig::local_dev("worker-agent"),
            conductor_url: "ws://localhost:8080/workers".to_string(),
            conductor_token: String::new(),
            port: 9090,
            heartbeat_interval_seconds: 30,
            resource_check_interval_seconds: 60,
        }
    }
}

impl SafeDisplay for WorkerAgentConfig {
    fn to_safe_string(&self) -> String {
        let mut result = String::new();
        let _ = writeln!(&mut result, "conductor URL: {}", self.conductor_url);
        let _ = writeln!(&mut result, "conductor token: ****");
        let _ = writeln!(&mut result, "admin port: {}", self.port);
        let _ = writeln!(
            &mut result,
            "heartbeat interval: {}s",
            self.heartbeat_interval_seconds
        );
        let _ = writeln!(
            &mut result,
            "resource check interval: {}s",
            self.resource_check_interval_seconds
        );
        result
    }
}

pub fn make_config_loader() -> ConfigLoader<WorkerAgentConfig> {
    ConfigLoader::new(PathBuf::from("config/worker-agent.toml"), "WORKER_AGENT")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_points_at_localhost() {
        let config = WorkerAgentConfig::default();
        assert_eq!(config.conductor_url, "ws://localhost:8080/workers");
    }

    #[test]
    fn config_is_loadable_without_a_file_present() {
        make_config_loader().load().expect("defaults alone must load");
    }

    #[test]
    fn safe_display_redacts_the_conductor_token() {
        let mut config = WorkerAgentConfig::default();
        config.conductor_token = "super-secret".to_string();
        assert!(!config.to_safe_string().contains("super-secret"));
    }
}
