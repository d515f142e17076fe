pub mod memory;

use crate::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use memory::MemoryUserDirectory;

/// Local identity record, keyed by the provider identity id. Created on first
/// successful login and never mutated or deleted by the login core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub avatar_url: String,
}

impl User {
    pub fn new(id: String, full_name: String, email: String, avatar_url: String) -> Self {
        Self {
            id,
            full_name,
            email,
            avatar_url,
        }
    }
}

/// Persistence boundary for local identity records.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Insert a new user. A record with the same id already present is a
    /// distinct condition, reported as [`AppError::DuplicateUser`].
    async fn add(&self, user: User) -> Result<(), AppError>;

    /// Fetch a user by provider identity id, [`AppError::UserNotFound`] if
    /// absent.
    async fn get_by_id(&self, id: &str) -> Result<User, AppError>;
}
