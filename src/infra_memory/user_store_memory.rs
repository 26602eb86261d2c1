use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Credentials keyed by email, with a secondary id index.
pub struct MemoryUserStore {
    by_email: DashMap<String, Credential>,
    email_by_id: DashMap<UserId, String>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        MemoryUserStore {
            by_email: DashMap::new(),
            email_by_id: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_email.len()
    }
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, AuthError> {
        Ok(self.by_email.get(email).map(|c| c.value().clone()))
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<Credential>, AuthError> {
        let Some(email) = self.email_by_id.get(id).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        self.find_by_email(&email).await
    }

    async fn create(&self, credential: Credential) -> Result<(), AuthError> {
        match self.by_email.entry(credential.email.clone()) {
            Entry::Occupied(_) => Err(AuthError::EmailTaken),
            Entry::Vacant(slot) => {
                self.email_by_id
                    .insert(credential.id.clone(), credential.email.clone());
                slot.insert(credential);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(id: &str, email: &str) -> Credential {
        Credential {
            id: UserId::from(id),
            email: email.to_string(),
            password_hash: "$argon2id$fake".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let store = MemoryUserStore::new();
        store
            .create(credential("u1", "a@example.com"))
            .await
            .expect("Failed to create");

        let by_email = store.find_by_email("a@example.com").await.unwrap().unwrap();
        let by_id = store.find_by_id(&UserId::from("u1")).await.unwrap().unwrap();
        assert_eq!(by_email.id, by_id.id);
        assert!(store.find_by_email("b@example.com").await.unwrap().is_none());
        assert!(store.find_by_id(&UserId::from("u2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let store = MemoryUserStore::new();
        store.create(credential("u1", "a@example.com")).await.unwrap();

        let result = store.create(credential("u2", "a@example.com")).await;
        assert!(matches!(result, Err(AuthError::EmailTaken)));
        assert_eq!(store.len(), 1);
    }
}
