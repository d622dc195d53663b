use async_trait::async_trait;

use crate::domain::principal::models::EmailAddress;
use crate::domain::principal::models::Principal;
use crate::domain::principal::models::PrincipalId;
use crate::domain::principal::models::Role;
use crate::domain::session::errors::RepositoryError;

/// Persistence operations the session core needs from the user store.
#[async_trait]
pub trait PrincipalRepository: Send + Sync + 'static {
    /// Persist new principal to storage.
    ///
    /// # Arguments
    /// * `principal` - Principal entity to create
    ///
    /// # Returns
    /// Created principal entity
    ///
    /// # Errors
    /// * `Conflict` - Email is already registered
    /// * `Database` - Database operation failed
    async fn create(&self, principal: Principal) -> Result<Principal, RepositoryError>;

    /// Retrieve principal by identifier.
    ///
    /// # Returns
    /// Optional principal entity (None if not found)
    ///
    /// # Errors
    /// * `Database` - Database operation failed
    async fn find_by_id(&self, id: &PrincipalId) -> Result<Option<Principal>, RepositoryError>;

    /// Retrieve principal by normalized email address.
    ///
    /// # Returns
    /// Optional principal entity (None if not found)
    ///
    /// # Errors
    /// * `Database` - Database operation failed
    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<Principal>, RepositoryError>;

    /// Whether at least one principal holds `role`.
    ///
    /// # Errors
    /// * `Database` - Database operation failed
    async fn exists_with_role(&self, role: Role) -> Result<bool, RepositoryError>;

    /// Replace the stored password hash.
    ///
    /// # Errors
    /// * `NotFound` - Principal does not exist
    /// * `Database` - Database operation failed
    async fn update_password_hash(
        &self,
        id: &PrincipalId,
        password_hash: &str,
    ) -> Result<(), RepositoryError>;

    /// Set the verified flag.
    ///
    /// # Errors
    /// * `NotFound` - Principal does not exist
    /// * `Database` - Database operation failed
    async fn mark_verified(&self, id: &PrincipalId) -> Result<(), RepositoryError>;
}
