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

//! Applies deployment instructions pushed over the conductor stream.
//! `start` on an already-running service and `stop` on a service the
//! runtime has never heard of are both no-ops; `restart` is `stop` then
//! `start`, reusing the previously applied spec.

use crate::error::FailureClass;
use crate::runtime::ContainerRuntime;
use fleet_common::protocol::{ContainerSpec, DeploymentAction, DeploymentPayload, ServiceStatus, ServiceStatusPayload};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ServiceRecord {
    pub name: String,
    pub spec: ContainerSpec,
    pub status: ServiceStatus,
    pub last_error: Option<String>,
    pub failure_class: Option<FailureClass>,
}

pub struct DeploymentSupervisor {
    runtime: Arc<dyn ContainerRuntime>,
    services: RwLock<HashMap<String, ServiceRecord>>,
}

impl DeploymentSupervisor {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            services: RwLock::new(HashMap::new()),
        }
    }

    pub async fn apply(&self, instruction: DeploymentPayload) -> ServiceStatusPayload {
        let name = instruction.service.clone();
        let spec = instruction.spec();

        let result = match instruction.action {
            DeploymentAction::Start => self.start(&name, spec).await,
            DeploymentAction::Stop => self.stop(&name).await,
            DeploymentAction::Restart => self.restart(&name).await,
            DeploymentAction::Update => self.update(&name, spec).await,
        };

        let (status, error, class) = match result {
            Ok(status) => (status, None, None),
            Err((status, message, class)) => (status, Some(message), Some(class)),
        };

        self.record(&name, status, error.clone(), class).await;

        ServiceStatusPayload {
            service: name,
            status,
            error,
        }
    }

    async fn start(
        &self,
        name: &str,
        spec: ContainerSpec,
    ) -> Result<ServiceStatus, (ServiceStatus, String, FailureClass)> {
        if let Some(state) = self.inspect(name).await? {
            if state.running {
                info!(service = name, "start is a no-op, already running");
                return Ok(ServiceStatus::Running);
            }
        }

        self.runtime
            .run(name, &spec)
            .await
            .map_err(|error| (ServiceStatus::Failed, error.message, error.class))?;

        self.remember_spec(name, spec).await;
        Ok(ServiceStatus::Running)
    }

    async fn stop(&self, name: &str) -> Result<ServiceStatus, (ServiceStatus, String, FailureClass)> {
        if self.inspect(name).await?.is_none() {
            info!(service = name, "stop is a no-op, no such container");
            return Ok(ServiceStatus::Stopped);
        }

        self.runtime
            .stop(name)
            .await
            .map_err(|error| (ServiceStatus::Failed, error.message, error.class))?;
        Ok(ServiceStatus::Stopped)
    }

    async fn restart(&self, name: &str) -> Result<ServiceStatus, (ServiceStatus, String, FailureClass)> {
        self.stop(name).await?;

        let spec = {
            let services = self.services.read().await;
            services.get(name).map(|record| record.spec.clone())
        };

        let Some(spec) = spec else {
            return Err((
                ServiceStatus::Failed,
                format!("no prior spec recorded for {name}, cannot restart"),
                FailureClass::Other,
            ));
        };

        self.runtime
            .remove(name)
            .await
            .map_err(|error| (ServiceStatus::Failed, error.message, error.class))?;

        self.start(name, spec).await
    }

    async fn update(
        &self,
        name: &str,
        spec: ContainerSpec,
    ) -> Result<ServiceStatus, (ServiceStatus, String, FailureClass)> {
        if self.inspect(name).await?.is_some() {
            self.runtime
                .stop(name)
                .await
                .map_err(|error| (ServiceStatus::Failed, error.message, error.class))?;
            self.runtime
                .remove(name)
                .await
                .map_err(|error| (ServiceStatus::Failed, error.message, error.class))?;
        }

        self.start(name, spec).await
    }

    async fn inspect(
        &self,
        name: &str,
    ) -> Result<Option<crate::runtime::ContainerState>, (ServiceStatus, String, FailureClass)> {
        self.runtime
            .inspect(name)
            .await
            .map_err(|error| (ServiceStatus::Failed, error.message, error.class))
    }

    async fn remember_spec(&self, name: &str, spec: ContainerSpec) {
        let mut services = self.services.write().await;
        services
            .entry(name.to_string())
            .or_insert_with(|| ServiceRecord {
                name: name.to_string(),
                spec: spec.clone(),
                status: ServiceStatus::Running,
                last_error: None,
                failure_class: None,
            })
            .spec = spec;
    }

    async fn record(
        &self,
        name: &str,
        status: ServiceStatus,
        last_error: Option<String>,
        failure_class: Option<FailureClass>,
    ) {
        let mut services = self.services.write().await;
        let record = services.entry(name.to_string()).or_insert_with(|| ServiceRecord {
            name: name.to_string(),
            spec: ContainerSpec {
                image: String::new(),
                env: HashMap::new(),
                ports: Vec::new(),
                volumes: Vec::new(),
                resource_limits: Default::default(),
            },
            status,
            last_error: None,
            failure_class: None,
        });
        record.status = status;
        record.last_error = last_error;
        record.failure_class = failure_class;

        if status == ServiceStatus::Failed {
            warn!(service = name, status = ?status, "deployment instruction failed");
        }
    }

    pub async fn services(&self) -> Vec<ServiceRecord> {
        self.services.read().await.values().cloned().collect()
    }

    pub async fn get(&self, name: &str) -> Option<ServiceRecord> {
        self.services.read().await.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;
    use crate::runtime::ContainerState;
    use async_trait::async_trait;
    use fleet_common::protocol::{DeploymentResourceLimits, PortMapping, VolumeMount};
    use tokio::sync::Mutex as TokioMutex;

    #[derive(Default)]
    struct FakeRuntime {
        running: TokioMutex<HashMap<String, bool>>,
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn list_containers(&self) -> Result<Vec<String>, RuntimeError> {
            Ok(self.running.lock().await.keys().cloned().collect())
        }

        async fn inspect(&self, name: &str) -> Result<Option<ContainerState>, RuntimeError> {
            Ok(self
                .running
                .lock()
                .await
                .get(name)
                .map(|&running| ContainerState { running }))
        }

        async fn run(&self, name: &str, _spec: &ContainerSpec) -> Result<(), RuntimeError> {
            self.running.lock().await.insert(name.to_string(), true);
            Ok(())
        }

        async fn stop(&self, name: &str) -> Result<(), RuntimeError> {
            if let Some(entry) = self.running.lock().await.get_mut(name) {
                *entry = false;
            }
            Ok(())
        }

        async fn remove(&self, name: &str) -> Result<(), RuntimeError> {
            self.running.lock().await.remove(name);
            Ok(())
        }

        async fn pull_image(&self, _image: &str) -> Result<(), RuntimeError> {
            Ok(())
        }
    }

    fn instruction(service: &str, action: DeploymentAction) -> DeploymentPayload {
        DeploymentPayload {
            service: service.to_string(),
            image: "nginx:latest".to_string(),
            env: HashMap::new(),
            ports: vec![PortMapping {
                host_port: 8080,
                container_port: 80,
                protocol: None,
            }],
            volumes: vec![VolumeMount {
                host_path: "/data".to_string(),
                container_path: "/data".to_string(),
                read_only: false,
            }],
            resource_limits: DeploymentResourceLimits::default(),
            action,
        }
    }

    #[tokio::test]
    async fn starting_an_already_running_service_is_a_no_op() {
        let supervisor = DeploymentSupervisor::new(Arc::new(FakeRuntime::default()));

        let first = supervisor.apply(instruction("web", DeploymentAction::Start)).await;
        assert_eq!(first.status, ServiceStatus::Running);

        let second = supervisor.apply(instruction("web", DeploymentAction::Start)).await;
        assert_eq!(second.status, ServiceStatus::Running);
        assert!(second.error.is_none());
    }

    #[tokio::test]
    async fn stopping_a_missing_service_is_a_no_op() {
        let supervisor = DeploymentSupervisor::new(Arc::new(FakeRuntime::default()));
        let result = supervisor.apply(instruction("ghost", DeploymentAction::Stop)).await;
        assert_eq!(result.status, ServiceStatus::Stopped);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn restart_reuses_the_previously_applied_spec() {
        let supervisor = DeploymentSupervisor::new(Arc::new(FakeRuntime::default()));
        supervisor.apply(instruction("web", DeploymentAction::Start)).await;

        let restarted = supervisor.apply(instruction("web", DeploymentAction::Restart)).await;
        assert_eq!(restarted.status, ServiceStatus::Running);

        let record = supervisor.get("web").await.unwrap();
        assert_eq!(record.spec.image, "nginx:latest");
    }
}
