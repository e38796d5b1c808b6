//! Authentication module for geotemp

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod users;

pub use jwt::{Claims, Clock, IssuedToken, JwtManager, SystemClock, TokenError};
pub use middleware::{
    clear_session_cookie, require_auth, session_cookie, AuthError, AuthMethod, AuthState,
    AuthUser, SESSION_COOKIE,
};
pub use password::{generate_impossible_hash, hash_password, verify_password};
pub use users::{
    CredentialError, CredentialStore, InMemoryUserStore, PgUserStore, User, UserStore,
    UserStoreError,
};
