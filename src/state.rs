use tokio::sync::{Mutex, RwLock};

use crate::admin::session::SessionStore;
use crate::auth::gate::IpGates;
use crate::auth::throttle::LoginThrottle;
use crate::config::AuthConfig;
use crate::users::store::UserStore;

pub struct AppState {
    pub users: RwLock<UserStore>,
    pub login_throttle: Mutex<LoginThrottle>,
    pub login_gates: IpGates,
    pub sessions: Mutex<SessionStore>,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(users: UserStore, auth: AuthConfig) -> Self {
        AppState {
            users: RwLock::new(users),
            login_throttle: Mutex::new(LoginThrottle::new()),
            login_gates: IpGates::new(),
            sessions: Mutex::new(SessionStore::new(auth.session_ttl)),
            auth,
        }
    }
}
