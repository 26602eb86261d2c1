use crate::application_port::*;
use crate::domain_model::*;

#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, AuthError>;

    async fn find_by_id(&self, id: &UserId) -> Result<Option<Credential>, AuthError>;

    /// Insert a new credential. Fails with `EmailTaken` if the email is already in use.
    async fn create(&self, credential: Credential) -> Result<(), AuthError>;
}
