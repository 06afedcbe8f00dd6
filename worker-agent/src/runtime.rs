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

//! The capability set the supervisor needs from whatever actually runs
//! containers. Every method returns a [`RuntimeError`] tagged with a
//! [`FailureClass`] so the supervisor never has to understand bollard (or
//! any other backend) error types directly.

use crate::error::{FailureClass, RuntimeError};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::secret::HostConfig;
use bollard::Docker;
use fleet_common::protocol::ContainerSpec;
use futures_util::StreamExt;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerState {
    pub running: bool,
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn list_containers(&self) -> Result<Vec<String>, RuntimeError>;
    async fn inspect(&self, name: &str) -> Result<Option<ContainerState>, RuntimeError>;
    async fn run(&self, name: &str, spec: &ContainerSpec) -> Result<(), RuntimeError>;
    async fn stop(&self, name: &str) -> Result<(), RuntimeError>;
    async fn remove(&self, name: &str) -> Result<(), RuntimeError>;
    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError>;
}

/// Talks to the local Docker daemon over its default socket/pipe.
pub struct BollardRuntime {
    docker: Docker,
}

impl BollardRuntime {
    pub fn connect() -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults().map_err(|error| {
            RuntimeError::new(FailureClass::RuntimeMissing, format!("docker unavailable: {error}"))
        })?;
        Ok(Self { docker })
    }

    fn classify(error: &bollard::errors::Error) -> FailureClass {
        match error {
            bollard::errors::Error::DockerResponseServerError { status_code, .. }
                if *status_code == 404 =>
            {
                FailureClass::Other
            }
            bollard::errors::Error::HyperResponseError(_) | bollard::errors::Error::IOError { .. } => {
                FailureClass::Network
            }
            _ => FailureClass::Other,
        }
    }
}

#[async_trait]
impl ContainerRuntime for BollardRuntime {
    async fn list_containers(&self) -> Result<Vec<String>, RuntimeError> {
        let mut filters = HashMap::new();
        filters.insert("status".to_string(), vec!["running".to_string(), "exited".to_string()]);

        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions {
                all: true,
                filters,
                ..Default::default()
            }))
            .await
            .map_err(|error| RuntimeError::new(Self::classify(&error), error.to_string()))?;

        Ok(containers
            .into_iter()
            .flat_map(|c| c.names.unwrap_or_default())
            .map(|name| name.trim_start_matches('/').to_string())
            .collect())
    }

    async fn inspect(&self, name: &str) -> Result<Option<ContainerState>, RuntimeError> {
        match self.docker.inspect_container(name, None).await {
            Ok(details) => {
                let running = details
                    .state
                    .and_then(|state| state.running)
                    .unwrap_or(false);
                Ok(Some(ContainerState { running }))
            }
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => {
                Ok(None)
            }
            Err(error) => Err(RuntimeError::new(Self::classify(&error), error.to_string())),
        }
    }

    async fn run(&self, name: &str, spec: &ContainerSpec) -> Result<(), RuntimeError> {
        self.pull_image(&spec.image).await?;

        let env: Vec<String> = spec.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let port_bindings = spec
            .ports
            .iter()
            .map(|mapping| {
                (
                    format!("{}/{}", mapping.container_port, mapping.protocol.as_deref().unwrap_or("tcp")),
                    Some(vec![bollard::secret::PortBinding {
                        host_ip: None,
                        host_port: Some(mapping.host_port.to_string()),
                    }]),
                )
            })
            .collect();
        let binds = spec
            .volumes
            .iter()
            .map(|v| {
                format!(
                    "{}:{}:{}",
                    v.host_path,
                    v.container_path,
                    if v.read_only { "ro" } else { "rw" }
                )
            })
            .collect();

        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(env),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                binds: Some(binds),
                nano_cpus: spec
                    .resource_limits
                    .cpu_cores
                    .map(|cores| (cores * 1_000_000_000.0) as i64),
                memory: spec.resource_limits.memory_mb.map(|mb| (mb * 1024 * 1024) as i64),
                ..Default::default()
            }),
            ..Default::default()
        };

        self.docker
            .create_container(
                Some(CreateContainerOptions {
                    name,
                    platform: None,
                }),
                config,
            )
            .await
            .map_err(|error| RuntimeError::new(Self::classify(&error), error.to_string()))?;

        self.docker
            .start_container::<String>(name, None)
            .await
            .map_err(|error| RuntimeError::new(Self::classify(&error), error.to_string()))
    }

    async fn stop(&self, name: &str) -> Result<(), RuntimeError> {
        match self
            .docker
            .stop_container(name, Some(StopContainerOptions { t: 10 }))
            .await
        {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Ok(()),
            Err(error) => Err(RuntimeError::new(Self::classify(&error), error.to_string())),
        }
    }

    async fn remove(&self, name: &str) -> Result<(), RuntimeError> {
        match self
            .docker
            .remove_container(name, Some(RemoveContainerOptions { force: true, ..Default::default() }))
            .await
        {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Ok(()),
            Err(error) => Err(RuntimeError::new(Self::classify(&error), error.to_string())),
        }
    }

    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        let mut stream = self.docker.create_image(
            Some(CreateImageOptions {
                from_image: image,
                ..Default::default()
            }),
            None,
            None,
        );

        while let Some(chunk) = stream.next().await {
            if let Err(error) = chunk {
                return Err(RuntimeError::new(FailureClass::ImagePull, error.to_string()));
            }
        }
        Ok(())
    }
}
