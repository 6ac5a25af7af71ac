//! Refresh-token sessions and pending OAuth states, kept in Redis

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::models::UserResult;

pub fn session_key(user_id: Uuid) -> String {
    format!("session:{}", user_id)
}

pub fn oauth_state_key(state: &str) -> String {
    format!("oauth_state:{}", state)
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Replace the user's session with `refresh_token`
    async fn store_session(&self, user_id: Uuid, refresh_token: &str, ttl_seconds: u64)
        -> UserResult<()>;

    async fn get_session(&self, user_id: Uuid) -> UserResult<Option<String>>;

    async fn delete_session(&self, user_id: Uuid) -> UserResult<()>;

    async fn store_oauth_state(&self, state: &str, ttl_seconds: u64) -> UserResult<()>;

    /// Remove a pending state. `true` only for the first caller that finds it.
    async fn take_oauth_state(&self, state: &str) -> UserResult<bool>;
}

pub struct RedisSessionStore {
    connection: ConnectionManager,
}

impl RedisSessionStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn store_session(
        &self,
        user_id: Uuid,
        refresh_token: &str,
        ttl_seconds: u64,
    ) -> UserResult<()> {
        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(session_key(user_id), refresh_token, ttl_seconds)
            .await?;
        Ok(())
    }

    async fn get_session(&self, user_id: Uuid) -> UserResult<Option<String>> {
        let mut conn = self.connection.clone();
        let stored: Option<String> = conn.get(session_key(user_id)).await?;
        Ok(stored)
    }

    async fn delete_session(&self, user_id: Uuid) -> UserResult<()> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(session_key(user_id)).await?;
        Ok(())
    }

    async fn store_oauth_state(&self, state: &str, ttl_seconds: u64) -> UserResult<()> {
        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(oauth_state_key(state), "1", ttl_seconds)
            .await?;
        Ok(())
    }

    async fn take_oauth_state(&self, state: &str) -> UserResult<bool> {
        let mut conn = self.connection.clone();
        let removed: i32 = conn.del(oauth_state_key(state)).await?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
pub mod memory {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use tokio::sync::RwLock;

    /// Session store for router tests. TTLs are ignored.
    #[derive(Default)]
    pub struct MemorySessionStore {
        sessions: RwLock<HashMap<Uuid, String>>,
        states: RwLock<HashSet<String>>,
    }

    #[async_trait]
    impl SessionStore for MemorySessionStore {
        async fn store_session(
            &self,
            user_id: Uuid,
            refresh_token: &str,
            _ttl_seconds: u64,
        ) -> UserResult<()> {
            self.sessions
                .write()
                .await
                .insert(user_id, refresh_token.to_string());
            Ok(())
        }

        async fn get_session(&self, user_id: Uuid) -> UserResult<Option<String>> {
            Ok(self.sessions.read().await.get(&user_id).cloned())
        }

        async fn delete_session(&self, user_id: Uuid) -> UserResult<()> {
            self.sessions.write().await.remove(&user_id);
            Ok(())
        }

        async fn store_oauth_state(&self, state: &str, _ttl_seconds: u64) -> UserResult<()> {
            self.states.write().await.insert(state.to_string());
            Ok(())
        }

        async fn take_oauth_state(&self, state: &str) -> UserResult<bool> {
            Ok(self.states.write().await.remove(state))
        }
    }
}
