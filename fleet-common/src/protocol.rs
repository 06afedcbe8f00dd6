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

//! Wire types shared by the conductor and the worker agent. Both the
//! `/workers` and `/operators` streaming namespaces carry newline-framed
//! JSON with the shape `{event, payload}`; the four enums below map 1:1
//! onto the event tables in the external interface design.

use poem_openapi::{Enum, Object};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// The authoritative status of a worker as tracked by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Enum)]
#[serde(rename_all = "snake_case")]
#[oai(rename_all = "snake_case")]
pub enum WorkerStatus {
    Pending,
    Online,
    Degraded,
    Offline,
}

/// Resources a worker declares about itself at registration time; changes
/// only on re-registration or an explicit update, never on a ping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[oai(rename_all = "camelCase")]
pub struct DeclaredResources {
    pub cpu_cores: u32,
    pub ram_gb: f64,
    pub disk_gb: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[oai(rename_all = "camelCase")]
pub struct CpuSnapshot {
    pub usage_percent: f32,
    #[serde(default)]
    #[oai(default)]
    pub per_core: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[oai(rename_all = "camelCase")]
pub struct RamSnapshot {
    pub total_gb: f64,
    pub used_gb: f64,
    pub usage_percent: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[oai(rename_all = "camelCase")]
pub struct DiskSnapshot {
    pub total_gb: f64,
    pub used_gb: f64,
    pub usage_percent: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[oai(rename_all = "camelCase")]
pub struct NetworkSnapshot {
    pub rx_bytes_per_sec: f64,
    pub tx_bytes_per_sec: f64,
}

/// A single live telemetry sample. Every top-level field is optional: the
/// probe omits a field rather than zero-filling it when sampling fails,
/// and the registry only overwrites the fields that are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[oai(rename_all = "camelCase")]
pub struct ResourceSnapshot {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cpu: Option<CpuSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ram: Option<RamSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub disk: Option<DiskSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub network: Option<NetworkSnapshot>,
    pub timestamp: u64,
}

impl ResourceSnapshot {
    /// Overlays `update`'s present fields onto `self`, leaving absent
    /// fields untouched. Used by `recordPing`/`recordResources`.
    pub fn merge_from(&mut self, update: &ResourceSnapshot) {
        if update.cpu.is_some() {
            self.cpu = update.cpu;
        }
        if update.ram.is_some() {
            self.ram = update.ram;
        }
        if update.disk.is_some() {
            self.disk = update.disk;
        }
        if update.network.is_some() {
            self.network = update.network;
        }
        self.timestamp = update.timestamp;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentAction {
    Start,
    Stop,
    Restart,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Running,
    Stopped,
    Failed,
    Pulling,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PortMapping {
    pub host_port: u16,
    pub container_port: u16,
    #[serde(default)]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VolumeMount {
    pub host_path: String,
    pub container_path: String,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeploymentResourceLimits {
    #[serde(default)]
    pub cpu_cores: Option<f64>,
    #[serde(default)]
    pub memory_mb: Option<u64>,
}

/// A container spec carried inside a deployment instruction; also what the
/// supervisor remembers so `restart` can reuse it without a fresh push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ContainerSpec {
    pub image: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub ports: Vec<PortMapping>,
    #[serde(default)]
    pub volumes: Vec<VolumeMount>,
    #[serde(default)]
    pub resource_limits: DeploymentResourceLimits,
}

// ---------------------------------------------------------------------
// Worker -> Conductor, on `/workers`
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterPayload {
    pub token: String,
    pub hostname: String,
    pub ip_address: String,
    pub resources: DeclaredResources,
    #[serde(default)]
    pub worker_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PingPayload {
    pub timestamp: u64,
    #[serde(default)]
    pub resources: Option<ResourceSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResourcesPayload {
    pub resources: ResourceSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServiceStatusPayload {
    pub service: String,
    pub status: ServiceStatus,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum WorkerInboundEvent {
    #[serde(rename = "worker:register")]
    Register(RegisterPayload),
    #[serde(rename = "worker:ping")]
    Ping(PingPayload),
    #[serde(rename = "worker:resources")]
    Resources(ResourcesPayload),
    #[serde(rename = "worker:service:status")]
    ServiceStatus(ServiceStatusPayload),
}

// ---------------------------------------------------------------------
// Conductor -> Worker, on `/workers`
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredPayload {
    pub worker_id: Uuid,
    pub hostname: String,
    pub ip_address: String,
    pub status: WorkerStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeploymentPayload {
    pub service: String,
    pub image: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub ports: Vec<PortMapping>,
    #[serde(default)]
    pub volumes: Vec<VolumeMount>,
    #[serde(default)]
    pub resource_limits: DeploymentResourceLimits,
    pub action: DeploymentAction,
}

impl DeploymentPayload {
    pub fn spec(&self) -> ContainerSpec {
        ContainerSpec {
            image: self.image.clone(),
            env: self.env.clone(),
            ports: self.ports.clone(),
            volumes: self.volumes.clone(),
            resource_limits: self.resource_limits.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum WorkerOutboundEvent {
    #[serde(rename = "worker:registered")]
    Registered(RegisteredPayload),
    #[serde(rename = "error")]
    Error(ErrorPayload),
    #[serde(rename = "deployment")]
    Deployment(DeploymentPayload),
}

// ---------------------------------------------------------------------
// Operator -> Conductor, on `/operators`
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SubscribePayload {
    pub worker_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum OperatorInboundEvent {
    #[serde(rename = "worker:subscribe")]
    Subscribe(SubscribePayload),
    #[serde(rename = "worker:unsubscribe")]
    Unsubscribe(SubscribePayload),
}

// ---------------------------------------------------------------------
// Conductor -> Operator, on `/operators`
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct WorkerRecord {
    pub id: Uuid,
    pub hostname: String,
    pub ip_address: String,
    pub status: WorkerStatus,
    pub declared: DeclaredResources,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live: Option<ResourceSnapshot>,
    pub last_seen: u64,
    pub created_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerOnlinePayload {
    pub worker_id: Uuid,
    pub worker: WorkerRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerOfflinePayload {
    pub worker_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesUpdatedPayload {
    pub worker_id: Uuid,
    pub resources: DeclaredResources,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveUpdatePayload {
    pub worker_id: Uuid,
    pub resources: ResourceSnapshot,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum OperatorOutboundEvent {
    #[serde(rename = "worker:online")]
    Online(WorkerOnlinePayload),
    #[serde(rename = "worker:offline")]
    Offline(WorkerOfflinePayload),
    #[serde(rename = "worker:resources:updated")]
    ResourcesUpdated(ResourcesUpdatedPayload),
    #[serde(rename = "worker:live:update")]
    LiveUpdate(LiveUpdatePayload),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_event_round_trips_through_the_envelope_shape() {
        let event = WorkerInboundEvent::Register(RegisterPayload {
            token: "T1".to_string(),
            hostname: "w1".to_string(),
            ip_address: "10.0.0.2".to_string(),
            resources: DeclaredResources {
                cpu_cores: 4,
                ram_gb: 8.0,
                disk_gb: 100.0,
            },
            worker_id: None,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "worker:register");
        assert_eq!(json["payload"]["hostname"], "w1");

        let back: WorkerInboundEvent = serde_json::from_value(json).unwrap();
        match back {
            WorkerInboundEvent::Register(p) => assert_eq!(p.ip_address, "10.0.0.2"),
            _ => panic!("expected Register"),
        }
    }

    #[test]
    fn resource_snapshot_merge_leaves_absent_fields_untouched() {
        let mut current = ResourceSnapshot {
            cpu: Some(CpuSnapshot {
                usage_percent: 10.0,
                per_core: vec![10.0],
            }),
            ram: Some(RamSnapshot {
                total_gb: 16.0,
                used_gb: 4.0,
                usage_percent: 25.0,
            }),
            disk: None,
            network: None,
            timestamp: 1,
        };

        let update = ResourceSnapshot {
            cpu: None,
            ram: Some(RamSnapshot {
                total_gb: 16.0,
                used_gb: 8.0,
                usage_percent: 50.0,
            }),
            disk: None,
            network: None,
            timestamp: 2,
        };

        current.merge_from(&update);

        assert_eq!(current.cpu.unwrap().usage_percent, 10.0);
        assert_eq!(current.ram.unwrap().used_gb, 8.0);
        assert_eq!(current.timestamp, 2);
    }
}
