//! User directory consulted by the authentication gate.
//!
//! The portal's persistent user store lives outside this crate; the gate
//! talks to it through [`UserDirectory`]. [`InMemoryUserDirectory`] backs the
//! binary (loaded from a JSON file) and tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Errors from the directory backend.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("User directory backend error: {0}")]
    Backend(String),

    #[error("Failed to load user directory: {0}")]
    Load(String),
}

/// A local portal account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,

    pub email: String,

    pub role: String,

    #[serde(default)]
    pub department: Option<String>,

    #[serde(default)]
    pub position: Option<String>,

    #[serde(default)]
    pub employee_code: Option<String>,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Custom Debug implementation that redacts the email and employee code.
impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("user_id", &self.user_id)
            .field("email", &"[REDACTED]")
            .field("role", &self.role)
            .field("department", &self.department)
            .field("position", &self.position)
            .field(
                "employee_code",
                &self.employee_code.as_ref().map(|_| "[REDACTED]"),
            )
            .field("is_active", &self.is_active)
            .finish()
    }
}

/// Read-only lookup of local accounts by email.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up an active user by email.
    ///
    /// Returns `Ok(None)` when no account exists or the account is inactive.
    /// Email case handling is the implementation's concern.
    async fn lookup_active_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserRecord>, DirectoryError>;
}

/// Directory held in memory, keyed by lower-cased email.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: HashMap<String, UserRecord>,
}

impl InMemoryUserDirectory {
    /// Build a directory from records. A later record replaces an earlier
    /// one with the same email.
    pub fn new(records: impl IntoIterator<Item = UserRecord>) -> Self {
        let users = records
            .into_iter()
            .map(|record| (normalize_email(&record.email), record))
            .collect();
        Self { users }
    }

    /// Load records from a JSON array file.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryError::Load` if the file cannot be read or parsed.
    pub fn from_json_file(path: &Path) -> Result<Self, DirectoryError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DirectoryError::Load(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&contents)
    }

    /// Parse records from a JSON array.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryError::Load` if the JSON is not an array of records.
    pub fn from_json_str(json: &str) -> Result<Self, DirectoryError> {
        let records: Vec<UserRecord> =
            serde_json::from_str(json).map_err(|e| DirectoryError::Load(e.to_string()))?;
        Ok(Self::new(records))
    }

    /// Number of accounts, active or not.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn lookup_active_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self
            .users
            .get(&normalize_email(email))
            .filter(|record| record.is_active)
            .cloned())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
