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

mod auth_api;
mod health_api;
mod token_api;
mod workers_api;

use crate::bootstrap::Services;
use crate::error::ConductorError;
use fleet_common::SafeDisplay;
use poem_openapi::payload::Json;
use poem_openapi::{ApiResponse, Object, OpenApiService};

#[derive(Object, Debug, Clone)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(ApiResponse, Debug, Clone)]
pub enum ApiError {
    #[oai(status = 400)]
    BadRequest(Json<ErrorBody>),
    #[oai(status = 401)]
    Unauthorized(Json<ErrorBody>),
    #[oai(status = 404)]
    NotFound(Json<ErrorBody>),
    #[oai(status = 409)]
    Conflict(Json<ErrorBody>),
    #[oai(status = 500)]
    InternalError(Json<ErrorBody>),
    #[oai(status = 503)]
    Unavailable(Json<ErrorBody>),
}

type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<ConductorError> for ApiError {
    fn from(value: ConductorError) -> Self {
        let body = ErrorBody {
            code: value.kind().as_code().to_string(),
            message: value.to_safe_string(),
        };
        match value {
            ConductorError::Validation(_) => ApiError::BadRequest(Json(body)),
            ConductorError::Unauthorized(_) => ApiError::Unauthorized(Json(body)),
            ConductorError::NotFound(_) => ApiError::NotFound(Json(body)),
            ConductorError::Conflict(_) => ApiError::Conflict(Json(body)),
            ConductorError::Transient(_) => ApiError::Unavailable(Json(body)),
            ConductorError::Superseded(_) => ApiError::Conflict(Json(body)),
            ConductorError::Internal(_) => ApiError::InternalError(Json(body)),
        }
    }
}

pub type Apis = (
    auth_api::AuthApi,
    token_api::TokenApi,
    workers_api::WorkersApi,
    health_api::HealthApi,
);

pub fn make_open_api_service(services: Services) -> OpenApiService<Apis, ()> {
    OpenApiService::new(
        (
            auth_api::AuthApi {
                services: services.clone(),
            },
            token_api::TokenApi {
                services: services.clone(),
            },
            workers_api::WorkersApi {
                services: services.clone(),
            },
            health_api::HealthApi { services },
        ),
        "Fleet Conductor API",
        env!("CARGO_PKG_VERSION"),
    )
}
