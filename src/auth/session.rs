use std::sync::Arc;
use std::time::Duration;

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::Utc;
use rand::Rng;

use crate::store::Store;
use crate::types::Session;

pub const SESSION_COOKIE: &str = "zk_session";

const SESSION_ID_BYTES: usize = 32;
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Generates an unguessable session identifier
#[must_use]
pub fn new_session_id() -> String {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::thread_rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[must_use]
pub fn build_session(user_id: &str, ttl: chrono::Duration) -> Session {
    let now = Utc::now();
    Session {
        id: new_session_id(),
        user_id: user_id.to_string(),
        created_at: now,
        expires_at: now + ttl,
    }
}

/// Cookie carrying the session id. Expiry is enforced server side, so the
/// cookie itself carries no max-age.
#[must_use]
pub fn session_cookie(session_id: &str) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id.to_string()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

#[must_use]
pub fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

/// Spawns the background task that deletes expired sessions once a minute.
pub fn spawn_session_sweeper(store: Arc<dyn Store>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.purge_expired_sessions() {
                Ok(0) => {}
                Ok(purged) => tracing::debug!("purged {purged} expired sessions"),
                Err(e) => tracing::warn!("session sweep failed: {e}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_unique() {
        let first = new_session_id();
        let second = new_session_id();
        assert_ne!(first, second);
        // 32 bytes of url-safe base64 without padding
        assert_eq!(first.len(), 43);
    }

    #[test]
    fn test_build_session_expiry() {
        let session = build_session("user-1", chrono::Duration::days(7));
        assert_eq!(session.user_id, "user-1");
        assert!(session.expires_at > session.created_at);
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = session_cookie("abc");
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));

        let cleared = clear_session_cookie();
        assert_eq!(cleared.value(), "");
    }
}
