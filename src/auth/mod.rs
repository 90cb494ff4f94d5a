mod apikey;
mod middleware;
mod password;
mod session;

pub use apikey::{generate_key, hash_key, is_api_key, validate_key_format};
pub use middleware::{AuthError, RequireAdmin, RequireUser};
pub use password::{MIN_PASSWORD_LENGTH, PasswordService, generate_password};
pub use session::{
    SESSION_COOKIE, build_session, clear_session_cookie, new_session_id, session_cookie,
    spawn_session_sweeper,
};
