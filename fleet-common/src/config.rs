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

//! Layered configuration loading shared by the conductor and the worker
//! agent: a TOML file merged with `FLEET_`-prefixed environment variables,
//! figment-backed, unknown keys rejected by each config struct's own
//! `deny_unknown_fields`.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Marker bound for anything loadable through [`ConfigLoader`]: it must be
/// able to provide its own defaults (used as the base layer) and round-trip
/// through figment.
pub trait ConfigLoaderConfig: Default + Serialize + DeserializeOwned {}

impl<T: Default + Serialize + DeserializeOwned> ConfigLoaderConfig for T {}

pub struct ConfigLoader<T> {
    pub config_file_name: PathBuf,
    env_prefix: String,
    _marker: std::marker::PhantomData<T>,
}

impl<T: ConfigLoaderConfig> ConfigLoader<T> {
    pub fn new(config_file_name: impl AsRef<Path>, env_prefix: &str) -> Self {
        Self {
            config_file_name: config_file_name.as_ref().to_path_buf(),
            env_prefix: env_prefix.to_string(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Loads the configuration, starting from `T::default()`, merging in the
    /// config file (if present) and then environment variables (highest
    /// priority). Fails loudly on malformed input rather than silently
    /// falling back to defaults.
    pub fn load(&self) -> figment::Result<T> {
        let mut figment = Figment::new().merge(Serialized::defaults(T::default()));

        if self.config_file_name.exists() {
            figment = figment.merge(Toml::file(&self.config_file_name));
        }

        figment = figment.merge(Env::prefixed(&self.env_prefix).split("__"));

        figment.extract()
    }
}
