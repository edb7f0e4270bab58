//! User directory helpers.

use async_trait::async_trait;
use sso_auth::directory::{DirectoryError, InMemoryUserDirectory, UserDirectory, UserRecord};

/// An active user record for the given email.
pub fn test_user(email: &str) -> UserRecord {
    UserRecord {
        user_id: format!("local-{}", email.split('@').next().unwrap_or("user")),
        email: email.to_string(),
        role: "member".to_string(),
        department: Some("Engineering".to_string()),
        position: Some("Engineer".to_string()),
        employee_code: Some("E-1000".to_string()),
        is_active: true,
    }
}

/// An inactive user record for the given email.
pub fn inactive_user(email: &str) -> UserRecord {
    UserRecord {
        is_active: false,
        ..test_user(email)
    }
}

/// Directory holding exactly the given users.
pub fn directory_with(users: Vec<UserRecord>) -> InMemoryUserDirectory {
    InMemoryUserDirectory::new(users)
}

/// Directory whose backend is always down.
#[derive(Debug, Default)]
pub struct FailingDirectory;

#[async_trait]
impl UserDirectory for FailingDirectory {
    async fn lookup_active_user_by_email(
        &self,
        _email: &str,
    ) -> Result<Option<UserRecord>, DirectoryError> {
        Err(DirectoryError::Backend("connection reset".to_string()))
    }
}
