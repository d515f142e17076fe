use super::{User, UserDirectory};
use crate::error::AppError;
use async_trait::async_trait;
use std::{collections::HashMap, sync::Mutex};

/// In-process user directory backed by a mutex-guarded map.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: Mutex<HashMap<String, User>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.lock().expect("user lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn add(&self, user: User) -> Result<(), AppError> {
        let mut users = self.users.lock().expect("user lock poisoned");
        if users.contains_key(&user.id) {
            return Err(AppError::DuplicateUser(user.id));
        }
        users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<User, AppError> {
        self.users
            .lock()
            .expect("user lock poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::UserNotFound(id.to_string()))
    }
}
