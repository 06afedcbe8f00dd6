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

use fleet_common::protocol::ErrorPayload;
use fleet_common::{ErrorKind, SafeDisplay};

/// The conductor's single error type. Every component returns this rather
/// than a component-specific enum; callers match on `.kind()` to decide
/// how to surface a failure (HTTP status, wire error code, log level).
#[derive(Debug, thiserror::Error)]
pub enum ConductorError {
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
    #[error("session superseded: {0}")]
    Superseded(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ConductorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConductorError::Validation(_) => ErrorKind::Validation,
            ConductorError::Unauthorized(_) => ErrorKind::Unauthorized,
            ConductorError::NotFound(_) => ErrorKind::NotFound,
            ConductorError::Conflict(_) => ErrorKind::Conflict,
            ConductorError::Transient(_) => ErrorKind::Transient,
            ConductorError::Superseded(_) => ErrorKind::Superseded,
            ConductorError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn to_error_payload(&self) -> ErrorPayload {
        ErrorPayload {
            message: self.to_safe_string(),
            code: self.kind().as_code().to_string(),
        }
    }
}

impl SafeDisplay for ConductorError {
    fn to_safe_string(&self) -> String {
        // Validation/NotFound/Conflict/Unauthorized/Superseded messages are
        // already caller-facing; Internal and Transient are logged in full
        // but surfaced generically so storage/internal detail never leaks.
        match self {
            ConductorError::Internal(_) => "internal server error".to_string(),
            ConductorError::Transient(_) => "temporarily unavailable, please retry".to_string(),
            other => other.to_string(),
        }
    }
}
