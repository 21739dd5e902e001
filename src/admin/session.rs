use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::users::store::{Role, User};

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Session {
    fn for_user(user: &User, now: DateTime<Utc>) -> Self {
        Session {
            token: generate_session_token(),
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            created_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub struct SessionStore {
    ttl: TimeDelta,
    sessions: HashMap<String, Session>,
}

impl SessionStore {
    pub fn new(ttl: TimeDelta) -> Self {
        SessionStore {
            ttl,
            sessions: HashMap::new(),
        }
    }

    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        now - session.created_at > self.ttl
    }

    pub fn create(&mut self, user: &User) -> Session {
        let session = Session::for_user(user, Utc::now());
        self.sessions.insert(session.token.clone(), session.clone());
        session
    }

    /// Returns the session behind `token` if it is still live.
    pub fn get(&self, token: &str) -> Option<Session> {
        self.sessions
            .get(token)
            .filter(|s| !self.is_expired(s, Utc::now()))
            .cloned()
    }

    pub fn remove(&mut self, token: &str) {
        self.sessions.remove(token);
    }

    pub fn cleanup_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        let ttl = self.ttl;
        self.sessions.retain(|_, s| now - s.created_at <= ttl);
        before - self.sessions.len()
    }
}

fn generate_session_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..32).map(|_| rng.r#gen()).collect();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
