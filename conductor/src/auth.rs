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

//! Operator authentication: password hashing for the credential store and
//! bearer session tokens minted by `/auth/login`. The REST surface is
//! stateless from the client's point of view, but the conductor keeps a
//! small in-memory map from bearer value to operator id so it isn't
//! re-hashing a password on every authenticated request.

use crate::error::ConductorError;
use crate::model::OperatorId;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::distr::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

const SESSION_TOKEN_LEN: usize = 32;

pub fn hash_password(password: &str) -> Result<String, ConductorError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|error| ConductorError::Internal(format!("failed to hash password: {error}")))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, ConductorError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|error| ConductorError::Internal(format!("corrupt password hash: {error}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Maps bearer session tokens to the operator that owns them. Cleared on
/// process restart; losing it only forces operators to log in again, it
/// never affects worker-facing state.
#[derive(Default)]
pub struct OperatorSessions {
    by_token: RwLock<HashMap<String, OperatorId>>,
}

impl OperatorSessions {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn mint(&self, operator: OperatorId) -> String {
        let token: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(SESSION_TOKEN_LEN)
            .map(char::from)
            .collect();
        self.by_token.write().await.insert(token.clone(), operator);
        token
    }

    pub async fn resolve(&self, token: &str) -> Option<OperatorId> {
        self.by_token.read().await.get(token).cloned()
    }

    /// `/auth/logout` is a no-op on the wire (the client just drops the
    /// token) but we still forget it server-side so a leaked old bearer
    /// can't be replayed.
    pub async fn revoke(&self, token: &str) {
        self.by_token.write().await.remove(token);
    }
}

/// Extracts and resolves the bearer token on an operator-facing REST
/// request. `Unauthorized` for a missing or unknown token.
#[derive(Debug, Clone)]
pub struct OperatorAuth {
    pub operator_id: OperatorId,
    pub token: String,
}

#[async_trait::async_trait]
impl<'a> poem::FromRequest<'a> for OperatorAuth {
    async fn from_request(req: &'a poem::Request, _body: &mut poem::RequestBody) -> poem::Result<Self> {
        use poem::web::headers::{authorization::Bearer, Authorization, HeaderMapExt};

        let token = req
            .headers()
            .typed_get::<Authorization<Bearer>>()
            .map(|header| header.token().to_string())
            .ok_or(AuthExtractError::MissingToken)?;

        let sessions = req
            .data::<Arc<OperatorSessions>>()
            .expect("OperatorSessions to be present in request data");

        let operator_id = sessions
            .resolve(&token)
            .await
            .ok_or(AuthExtractError::InvalidToken)?;

        Ok(OperatorAuth { operator_id, token })
    }
}

#[derive(Debug)]
enum AuthExtractError {
    MissingToken,
    InvalidToken,
}

impl std::fmt::Display for AuthExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("unauthorized")
    }
}

impl std::error::Error for AuthExtractError {}

impl poem::error::ResponseError for AuthExtractError {
    fn status(&self) -> poem::http::StatusCode {
        poem::http::StatusCode::UNAUTHORIZED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_rejects_a_mismatched_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[tokio::test]
    async fn revoked_token_no_longer_resolves() {
        let sessions = OperatorSessions::new();
        let operator = OperatorId::new();
        let token = sessions.mint(operator.clone()).await;

        assert_eq!(sessions.resolve(&token).await, Some(operator));
        sessions.revoke(&token).await;
        assert_eq!(sessions.resolve(&token).await, None);
    }
}
