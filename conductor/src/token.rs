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

use crate::error::ConductorError;
use crate::model::{OperatorId, RegistrationToken};
use crate::persistence::Persistence;
use std::sync::Arc;

/// Exactly one active registration token exists per operator at a time. A
/// thin pass-through over the persistence layer, kept as its own component
/// so callers depend on `get_active`/`rotate` rather than storage detail.
pub struct TokenStore {
    persistence: Arc<dyn Persistence>,
}

impl TokenStore {
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self { persistence }
    }

    pub async fn get_active(&self, operator: &OperatorId) -> Result<RegistrationToken, ConductorError> {
        self.persistence.get_token_for(operator).await
    }

    pub async fn rotate(&self, operator: &OperatorId) -> Result<RegistrationToken, ConductorError> {
        self.persistence.rotate_token_for(operator).await
    }

    /// Validates a bearer value presented by a connecting worker, returning
    /// the operator that owns it. `Unauthorized` for unknown or rotated-away
    /// values.
    pub async fn validate(&self, token_value: &str) -> Result<OperatorId, ConductorError> {
        self.persistence.find_token_owner(token_value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Operator, OperatorRole};
    use crate::persistence::memory::MemoryPersistence;

    async fn seeded_store() -> (TokenStore, OperatorId) {
        let persistence = Arc::new(MemoryPersistence::new());
        let operator = Operator {
            id: OperatorId::new(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            secret_hash: "unused".to_string(),
            role: OperatorRole::Admin,
        };
        persistence.seed_operator(operator.clone()).await.unwrap();
        (TokenStore::new(persistence), operator.id)
    }

    #[tokio::test]
    async fn rotation_invalidates_the_old_token() {
        let (store, operator_id) = seeded_store().await;

        let t1 = store.get_active(&operator_id).await.unwrap();
        let t2 = store.rotate(&operator_id).await.unwrap();

        assert_ne!(t1.value, t2.value);
        assert!(store.validate(&t1.value).await.is_err());
        assert_eq!(store.validate(&t2.value).await.unwrap(), operator_id);
    }

    #[tokio::test]
    async fn unknown_operator_is_not_found() {
        let persistence = Arc::new(MemoryPersistence::new());
        let store = TokenStore::new(persistence);
        let result = store.get_active(&OperatorId::new()).await;
        assert!(matches!(result, Err(ConductorError::NotFound(_))));
    }
}
