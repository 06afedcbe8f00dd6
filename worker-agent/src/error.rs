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

use fleet_common::{ErrorKind, SafeDisplay};

/// Mirrors the conductor's error taxonomy so the local admin API can reuse
/// the same `{code, message}` shape on the wire.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("transient error: {0}")]
    Transient(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::Validation(_) => ErrorKind::Validation,
            AgentError::Unauthorized(_) => ErrorKind::Unauthorized,
            AgentError::NotFound(_) => ErrorKind::NotFound,
            AgentError::Conflict(_) => ErrorKind::Conflict,
            AgentError::Transient(_) => ErrorKind::Transient,
            AgentError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl SafeDisplay for AgentError {
    fn to_safe_string(&self) -> String {
        match self {
            AgentError::Internal(_) => "internal agent error".to_string(),
            AgentError::Transient(_) => "temporarily unavailable, please retry".to_string(),
            other => other.to_string(),
        }
    }
}

/// The categories a runtime-adapter failure is sorted into before being
/// recorded on a [`crate::supervisor::ServiceRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    ImagePull,
    Network,
    Resource,
    RuntimeMissing,
    Other,
}

/// A runtime-adapter call failed. Every [`crate::runtime::ContainerRuntime`]
/// method returns this rather than a bollard error directly, so the
/// supervisor never needs to know which backend is in use.
#[derive(Debug, thiserror::Error)]
#[error("runtime error ({class:?}): {message}")]
pub struct RuntimeError {
    pub class: FailureClass,
    pub message: String,
}

impl RuntimeError {
    pub fn new(class: FailureClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }
}
