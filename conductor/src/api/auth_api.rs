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

use crate::api::{ApiError, ApiResult};
use crate::auth::{hash_password, verify_password, OperatorAuth};
use crate::bootstrap::Services;
use crate::error::ConductorError;
use crate::model::{Operator, OperatorRole};
use poem_openapi::payload::Json;
use poem_openapi::{Object, OpenApi};

#[derive(Object, Debug, Clone)]
pub struct OperatorProfile {
    pub id: uuid::Uuid,
    pub username: String,
    pub email: String,
    pub role: OperatorRole,
}

impl From<Operator> for OperatorProfile {
    fn from(operator: Operator) -> Self {
        Self {
            id: operator.id.0,
            username: operator.username,
            email: operator.email,
            role: operator.role,
        }
    }
}

#[derive(Object, Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Object, Debug, Clone)]
pub struct LoginResponse {
    pub token: String,
    pub operator: OperatorProfile,
}

#[derive(Object, Debug, Clone)]
pub struct ResetPasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Object, Debug, Clone, Default)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
}

pub struct AuthApi {
    pub services: Services,
}

#[OpenApi(prefix_path = "/auth")]
impl AuthApi {
    /// Verifies the supplied credentials and mints a bearer session token.
    #[oai(path = "/login", method = "post")]
    async fn login(&self, body: Json<LoginRequest>) -> ApiResult<Json<LoginResponse>> {
        let operator = self
            .services
            .persistence
            .get_operator_by_username(&body.0.username)
            .await
            .map_err(|_| ConductorError::Unauthorized("invalid username or password".to_string()))?;

        let matches = verify_password(&body.0.password, &operator.secret_hash)?;
        if !matches {
            return Err(ApiError::from(ConductorError::Unauthorized(
                "invalid username or password".to_string(),
            )));
        }

        let token = self.services.operator_sessions.mint(operator.id.clone()).await;
        Ok(Json(LoginResponse {
            token,
            operator: operator.into(),
        }))
    }

    /// Returns the profile of the currently authenticated operator.
    #[oai(path = "/me", method = "get")]
    async fn me(&self, auth: OperatorAuth) -> ApiResult<Json<OperatorProfile>> {
        let operator = self.services.persistence.get_operator(&auth.operator_id).await?;
        Ok(Json(operator.into()))
    }

    /// The server is stateless with respect to bearer tokens beyond its
    /// in-memory session map, but we still forget this one so a leaked
    /// token can't be replayed after the client has discarded it.
    #[oai(path = "/logout", method = "post")]
    async fn logout(&self, auth: OperatorAuth) -> ApiResult<Json<serde_json::Value>> {
        self.services.operator_sessions.revoke(&auth.token).await;
        Ok(Json(serde_json::json!({"ok": true})))
    }

    #[oai(path = "/reset-password", method = "post")]
    async fn reset_password(
        &self,
        auth: OperatorAuth,
        body: Json<ResetPasswordRequest>,
    ) -> ApiResult<Json<OperatorProfile>> {
        let operator = self.services.persistence.get_operator(&auth.operator_id).await?;

        if !verify_password(&body.0.current_password, &operator.secret_hash)? {
            return Err(ApiError::from(ConductorError::Unauthorized(
                "current password is incorrect".to_string(),
            )));
        }

        let new_hash = hash_password(&body.0.new_password)?;
        let updated = self
            .services
            .persistence
            .update_operator(&auth.operator_id, None, None, Some(new_hash))
            .await?;

        Ok(Json(updated.into()))
    }

    #[oai(path = "/profile", method = "put")]
    async fn update_profile(
        &self,
        auth: OperatorAuth,
        body: Json<UpdateProfileRequest>,
    ) -> ApiResult<Json<OperatorProfile>> {
        let updated = self
            .services
            .persistence
            .update_operator(&auth.operator_id, body.0.username, body.0.email, None)
            .await?;
        Ok(Json(updated.into()))
    }
}
