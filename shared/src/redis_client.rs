//! # Redis Client
//!
//! Thin async Redis client used for two things: generic caching, and
//! holding OAuth1a request-token state between the redirect to the
//! provider's auth URL and its callback (§4.3 "OAuth1a handshake").
//!
//! ## Why Redis for the OAuth1 handshake?
//!
//! The request-token secret returned in step 1 of the handshake is needed
//! again to sign the access-token exchange in step 3, but it must not be
//! persisted as real credentials — the handshake might never complete.
//! A short-TTL Redis entry keyed by a server-side session key is the
//! natural place for that in-flight state, the way the teacher's service
//! used Redis for transient, TTL-bound auth state rather than the database.
//!
//! ## Connection Management
//!
//! A `ConnectionManager` is used so the client reconnects automatically on
//! failure; this is the same pattern used for long-running services that
//! don't want to tear down and rebuild a connection per request.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use shared::redis_client::RedisClient;
//! use shared::config::AppConfig;
//! use std::time::Duration;
//!
//! let config = AppConfig::from_env()?;
//! let redis = RedisClient::new(&config.redis).await?;
//!
//! redis.set("key", &"value", Some(Duration::from_secs(3600))).await?;
//! let value: Option<String> = redis.get("key").await?;
//! ```

use crate::config::RedisConfig;
use crate::errors::ApiError;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// Async Redis client with automatic reconnection.
///
/// Safe to clone and share across tasks — cloning only clones the
/// connection manager handle.
#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
}

impl RedisClient {
    /// Connects to Redis.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::RedisError` if the URL is invalid or the server
    /// is unreachable.
    pub async fn new(config: &RedisConfig) -> Result<Self, ApiError> {
        info!(url = %config.url, "Connecting to Redis");

        let client = redis::Client::open(config.url.as_str()).map_err(ApiError::RedisError)?;
        let conn = ConnectionManager::new(client).await.map_err(ApiError::RedisError)?;

        info!("Redis connection established");
        Ok(Self { conn })
    }

    // =========================================================================
    // Basic Operations
    // =========================================================================

    /// Stores a JSON-serialized value with an optional TTL.
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), ApiError> {
        let serialized =
            serde_json::to_string(value).map_err(|e| ApiError::InternalError { message: e.to_string() })?;

        let mut conn = self.conn.clone();
        match ttl {
            Some(duration) => {
                conn.set_ex::<_, _, ()>(key, &serialized, duration.as_secs())
                    .await
                    .map_err(ApiError::RedisError)?;
            }
            None => {
                conn.set::<_, _, ()>(key, &serialized).await.map_err(ApiError::RedisError)?;
            }
        }
        Ok(())
    }

    /// Retrieves and deserializes a value. `Ok(None)` if the key is absent.
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<Option<T>, ApiError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await.map_err(ApiError::RedisError)?;
        match value {
            Some(s) => {
                let deserialized =
                    serde_json::from_str(&s).map_err(|e| ApiError::InternalError { message: e.to_string() })?;
                Ok(Some(deserialized))
            }
            None => Ok(None),
        }
    }

    /// Deletes a key. Returns whether it existed.
    pub async fn delete(&self, key: &str) -> Result<bool, ApiError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = conn.del(key).await.map_err(ApiError::RedisError)?;
        Ok(deleted > 0)
    }

    pub async fn exists(&self, key: &str) -> Result<bool, ApiError> {
        let mut conn = self.conn.clone();
        conn.exists(key).await.map_err(ApiError::RedisError)
    }

    /// Health check — verifies Redis is responding.
    pub async fn ping(&self) -> Result<(), ApiError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await.map_err(ApiError::RedisError)?;
        Ok(())
    }

    // =========================================================================
    // OAuth1a handshake state (§4.3)
    // =========================================================================

    /// Stashes the request-token secret under a server-generated session key
    /// between the redirect to the provider and the callback.
    ///
    /// `ttl` should be short (minutes, not hours): a user who never
    /// completes the provider's consent screen should not leave state
    /// behind indefinitely.
    pub async fn store_oauth1_handshake(
        &self,
        session_key: &str,
        state: &Oauth1HandshakeState,
        ttl: Duration,
    ) -> Result<(), ApiError> {
        self.set(&oauth1_handshake_key(session_key), state, Some(ttl)).await
    }

    /// Retrieves and consumes the handshake state for one callback. The
    /// entry is deleted whether or not it was found, so a callback can
    /// never be replayed against the same session key.
    pub async fn take_oauth1_handshake(
        &self,
        session_key: &str,
    ) -> Result<Option<Oauth1HandshakeState>, ApiError> {
        let key = oauth1_handshake_key(session_key);
        let state = self.get(&key).await?;
        self.delete(&key).await?;
        Ok(state)
    }
}

fn oauth1_handshake_key(session_key: &str) -> String {
    format!("oauth1:handshake:{session_key}")
}

/// In-flight OAuth1a state: the request token and its secret, plus which
/// `AuthorizedAccount` the eventual access token should be written to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Oauth1HandshakeState {
    pub account_id: uuid::Uuid,
    pub request_token: String,
    pub request_token_secret: String,
}

impl std::fmt::Debug for RedisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClient").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth1_handshake_key_is_namespaced() {
        assert_eq!(oauth1_handshake_key("abc"), "oauth1:handshake:abc");
    }
}
