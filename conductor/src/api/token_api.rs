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

use crate::api::ApiResult;
use crate::auth::OperatorAuth;
use crate::bootstrap::Services;
use crate::model::RegistrationToken;
use poem_openapi::payload::Json;
use poem_openapi::{Object, OpenApi};

#[derive(Object, Debug, Clone)]
pub struct TokenResponse {
    pub value: String,
    pub created_at: u64,
}

impl From<RegistrationToken> for TokenResponse {
    fn from(token: RegistrationToken) -> Self {
        Self {
            value: token.value,
            created_at: token.created_at,
        }
    }
}

pub struct TokenApi {
    pub services: Services,
}

#[OpenApi]
impl TokenApi {
    /// Returns the caller's active worker registration token.
    #[oai(path = "/token", method = "get")]
    async fn get_active(&self, auth: OperatorAuth) -> ApiResult<Json<TokenResponse>> {
        let token = self.services.tokens.get_active(&auth.operator_id).await?;
        Ok(Json(token.into()))
    }

    /// Rotates the caller's registration token. Workers still presenting
    /// the prior value are rejected with `Unauthorized` on their next
    /// registration attempt.
    #[oai(path = "/token/regenerate", method = "post")]
    async fn regenerate(&self, auth: OperatorAuth) -> ApiResult<Json<TokenResponse>> {
        let token = self.services.tokens.rotate(&auth.operator_id).await?;
        Ok(Json(token.into()))
    }
}
