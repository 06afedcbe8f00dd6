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
use std::collections::HashMap;
use std::fmt::Write;
use std::path::PathBuf;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConductorConfig {
    pub tracing: TracingConfig,
    pub http_port: u16,
    pub liveness_window_seconds: u64,
    pub liveness_sweep_interval_seconds: u64,
    pub registration_grace_seconds: u64,
    pub seed_operators: HashMap<String, SeedOperatorConfig>,
    pub cors_origin_regex: String,
}

impl ConductorConfig {
    pub fn liveness_window_millis(&self) -> u64 {
        self.liveness_window_seconds * 1000
    }
}

impl Default for ConductorConfig {
    fn default() -> Self {
        let mut seed_operators = HashMap::new();
        seed_operators.insert(
            "admin".to_string(),
            SeedOperatorConfig {
                email: "admin@example.com".to_string(),
                password: "changeme".to_string(),
                role: crate::model::OperatorRole::Admin,
            },
        );

        Self {
            tracing: TracingConfig::local_dev("conductor"),
            http_port: 8080,
            liveness_window_seconds: 90,
            liveness_sweep_interval_seconds: 10,
            registration_grace_seconds: 30,
            seed_operators,
            cors_origin_regex: "https://.*".to_string(),
        }
    }
}

impl SafeDisplay for ConductorConfig {
    fn to_safe_string(&self) -> String {
        let mut result = String::new();
        let _ = writeln!(&mut result, "HTTP port: {}", self.http_port);
        let _ = writeln!(&mut result, "liveness window: {}s", self.liveness_window_seconds);
        let _ = writeln!(
            &mut result,
            "liveness sweep interval: {}s",
            self.liveness_sweep_interval_seconds
        );
        let _ = writeln!(&mut result, "registration grace: {}s", self.registration_grace_seconds);
        let _ = writeln!(&mut result, "seed operators:");
        for username in self.seed_operators.keys() {
            let _ = writeln!(&mut result, "  {username} (secret: ****)");
        }
        let _ = writeln!(&mut result, "CORS origin regex: {}", self.cors_origin_regex);
        result
    }
}

/// A startup-only seed credential. `seed_operator` in the persistence
/// layer upserts these every boot so operators configured via TOML/env
/// always have a matching account, but it never overwrites a password an
/// operator has since changed through `/auth/reset-password` unless the
/// username is new.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedOperatorConfig {
    pub email: String,
    pub password: String,
    pub role: crate::model::OperatorRole,
}

pub fn make_config_loader() -> ConfigLoader<ConductorConfig> {
    ConfigLoader::new(PathBuf::from("config/conductor.toml"), "CONDUCTOR")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_one_seed_operator() {
        let config = ConductorConfig::default();
        assert_eq!(config.seed_operators.len(), 1);
        assert!(config.seed_operators.contains_key("admin"));
    }

    #[test]
    fn config_is_loadable_without_a_file_present() {
        make_config_loader().load().expect("defaults alone must load");
    }
}
