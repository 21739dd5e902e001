use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::password::hash_password;
use crate::error::AppError;

const MIN_PASSWORD_LEN: usize = 8;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.%+-]+@[A-Za-z0-9_.-]+\.[A-Za-z]{2,}$").expect("email regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
        }
    }
}

/// What clients get to see of a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
struct UsersFile {
    users: Vec<User>,
}

pub struct UserStore {
    file_path: PathBuf,
    users: Vec<User>,
}

impl UserStore {
    pub fn load_or_create(path: &Path) -> anyhow::Result<Self> {
        let users = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let file: UsersFile = serde_json::from_str(&content)?;
            file.users
        } else {
            Vec::new()
        };

        Ok(UserStore {
            file_path: path.to_path_buf(),
            users,
        })
    }

    fn save(&self, users: &[User]) -> anyhow::Result<()> {
        let file = UsersFile {
            users: users.to_vec(),
        };
        let content = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.file_path, content)?;
        Ok(())
    }

    /// Writes the store with `user` added, and only then keeps it in memory.
    fn persist_new(&mut self, user: User) -> anyhow::Result<()> {
        let mut users = self.users.clone();
        users.push(user);
        self.save(&users)?;
        self.users = users;
        Ok(())
    }

    pub fn find_by_email(&self, email: &str) -> Option<&User> {
        self.users.iter().find(|u| u.email == email)
    }

    /// Creates the admin account unless one already exists.
    /// Returns whether a new admin was created.
    pub fn ensure_admin(&mut self, email: &str, password: &str) -> anyhow::Result<bool> {
        if self.users.iter().any(User::is_admin) {
            return Ok(false);
        }
        self.persist_new(User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: Some("Admin NetPub".to_string()),
            password_hash: hash_password(password)?,
            role: Role::Admin,
            created_at: Utc::now(),
        })?;
        Ok(true)
    }

    /// Checks a registration request before any hashing is spent on it.
    pub fn validate_registration(&self, email: &str, password: &str) -> Result<(), AppError> {
        if !EMAIL_RE.is_match(email) {
            return Err(AppError::BadRequest("Invalid email address".into()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::BadRequest(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.find_by_email(email).is_some() {
            return Err(AppError::Conflict("Registration failed".into()));
        }
        Ok(())
    }

    /// Adds a user whose password is already hashed. The email is checked
    /// for duplicates again since the store may have changed meanwhile.
    pub fn insert(
        &mut self,
        email: &str,
        password_hash: String,
        name: Option<String>,
        role: Role,
    ) -> Result<User, AppError> {
        if self.find_by_email(email).is_some() {
            return Err(AppError::Conflict("Registration failed".into()));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.filter(|n| !n.trim().is_empty()),
            password_hash,
            role,
            created_at: Utc::now(),
        };
        self.persist_new(user.clone())?;
        Ok(user)
    }

    pub fn list(&self) -> &[User] {
        &self.users
    }
}
