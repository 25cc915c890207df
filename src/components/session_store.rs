use super::google_calendar::models::GoogleTokens;
use crate::error::{auth_error, store_error, DashResult};
use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Redis keys used by the session store
pub mod keys {
    pub const USER_PREFIX: &str = "calendash:user:";
    pub const USER_EMAIL_PREFIX: &str = "calendash:user_email:";
    pub const CONNECTED_ACCOUNT_PREFIX: &str = "calendash:connected_account:";
    pub const GOOGLE_TOKEN_PREFIX: &str = "calendash:google_token:";
    pub const OAUTH_STATE_PREFIX: &str = "calendash:oauth_state:";
    /// OAuth state nonces live for ten minutes
    pub const OAUTH_STATE_EXPIRY_SECONDS: u64 = 10 * 60;
}

/// Registered dashboard user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub password_hash: String,
}

/// Persistence for users, connections and OAuth material
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Look a user up by id
    async fn get_user(&self, user_id: &str) -> DashResult<Option<UserRecord>>;

    /// Look a user up by (case-insensitive) email
    async fn get_user_by_email(&self, email: &str) -> DashResult<Option<UserRecord>>;

    /// Create a user; fails if the email is taken
    async fn create_user(&self, user: &UserRecord) -> DashResult<()>;

    /// Connected account id stored for the user, if any
    async fn get_connected_account(&self, user_id: &str) -> DashResult<Option<String>>;

    /// Store or replace the user's connected account id
    async fn set_connected_account(&self, user_id: &str, account_id: &str) -> DashResult<()>;

    /// Forget the user's connected account id
    async fn remove_connected_account(&self, user_id: &str) -> DashResult<()>;

    /// Google OAuth tokens for the user
    async fn get_google_tokens(&self, user_id: &str) -> DashResult<Option<GoogleTokens>>;

    /// Store Google OAuth tokens for the user
    async fn save_google_tokens(&self, user_id: &str, tokens: &GoogleTokens) -> DashResult<()>;

    /// Remember which user started an OAuth flow
    async fn save_oauth_state(&self, state: &str, user_id: &str) -> DashResult<()>;

    /// Consume an OAuth state nonce, returning the user that created it
    async fn take_oauth_state(&self, state: &str) -> DashResult<Option<String>>;
}

fn email_key(email: &str) -> String {
    format!("{}{}", keys::USER_EMAIL_PREFIX, email.trim().to_lowercase())
}

/// Redis-backed session store
pub struct RedisStore {
    client: RedisClient,
}

impl RedisStore {
    /// Create a new Redis client and check that the server answers
    pub async fn connect(redis_url: &str) -> DashResult<Self> {
        info!("Connecting to Redis at {}", redis_url);

        let client = RedisClient::open(redis_url)
            .map_err(|e| store_error(&format!("Failed to create Redis client: {}", e)))?;
        let store = Self { client };

        let mut conn = store.get_connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| store_error(&format!("Redis PING failed: {}", e)))?;

        Ok(store)
    }

    async fn get_connection(&self) -> DashResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| store_error(&format!("Failed to connect to Redis: {}", e)))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> DashResult<Option<T>> {
        let mut conn = self.get_connection().await?;
        let data: Option<String> = conn.get(key).await?;
        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn get_user(&self, user_id: &str) -> DashResult<Option<UserRecord>> {
        self.get_json(&format!("{}{}", keys::USER_PREFIX, user_id)).await
    }

    async fn get_user_by_email(&self, email: &str) -> DashResult<Option<UserRecord>> {
        let mut conn = self.get_connection().await?;
        let user_id: Option<String> = conn.get(email_key(email)).await?;
        match user_id {
            Some(id) => self.get_user(&id).await,
            None => Ok(None),
        }
    }

    async fn create_user(&self, user: &UserRecord) -> DashResult<()> {
        let mut conn = self.get_connection().await?;
        let user_key = format!("{}{}", keys::USER_PREFIX, user.id);

        // The record goes in before the email claim, so a claimed email
        // always resolves to a user
        let json = serde_json::to_string(user)?;
        conn.set::<_, _, ()>(&user_key, json).await?;

        let claimed = conn.set_nx::<_, _, bool>(email_key(&user.email), &user.id).await;
        match claimed {
            Ok(true) => {
                info!("Created user {}", user.id);
                Ok(())
            }
            Ok(false) => {
                conn.del::<_, ()>(&user_key).await?;
                Err(auth_error("Email is already registered"))
            }
            Err(e) => {
                if let Err(cleanup) = conn.del::<_, ()>(&user_key).await {
                    warn!("Failed to remove unclaimed user {}: {}", user.id, cleanup);
                }
                Err(e.into())
            }
        }
    }

    async fn get_connected_account(&self, user_id: &str) -> DashResult<Option<String>> {
        let mut conn = self.get_connection().await?;
        Ok(conn
            .get(format!("{}{}", keys::CONNECTED_ACCOUNT_PREFIX, user_id))
            .await?)
    }

    async fn set_connected_account(&self, user_id: &str, account_id: &str) -> DashResult<()> {
        let mut conn = self.get_connection().await?;
        conn.set::<_, _, ()>(
            format!("{}{}", keys::CONNECTED_ACCOUNT_PREFIX, user_id),
            account_id,
        )
        .await?;
        Ok(())
    }

    async fn remove_connected_account(&self, user_id: &str) -> DashResult<()> {
        let mut conn = self.get_connection().await?;
        conn.del::<_, ()>(format!("{}{}", keys::CONNECTED_ACCOUNT_PREFIX, user_id))
            .await?;
        Ok(())
    }

    async fn get_google_tokens(&self, user_id: &str) -> DashResult<Option<GoogleTokens>> {
        self.get_json(&format!("{}{}", keys::GOOGLE_TOKEN_PREFIX, user_id))
            .await
    }

    async fn save_google_tokens(&self, user_id: &str, tokens: &GoogleTokens) -> DashResult<()> {
        let mut conn = self.get_connection().await?;
        let json = serde_json::to_string(tokens)?;
        conn.set::<_, _, ()>(format!("{}{}", keys::GOOGLE_TOKEN_PREFIX, user_id), json)
            .await?;
        Ok(())
    }

    async fn save_oauth_state(&self, state: &str, user_id: &str) -> DashResult<()> {
        let mut conn = self.get_connection().await?;
        conn.set_ex::<_, _, ()>(
            format!("{}{}", keys::OAUTH_STATE_PREFIX, state),
            user_id,
            keys::OAUTH_STATE_EXPIRY_SECONDS,
        )
        .await?;
        Ok(())
    }

    async fn take_oauth_state(&self, state: &str) -> DashResult<Option<String>> {
        let mut conn = self.get_connection().await?;
        Ok(conn
            .get_del(format!("{}{}", keys::OAUTH_STATE_PREFIX, state))
            .await?)
    }
}

/// In-memory implementation of the store (fallback and tests)
#[derive(Debug, Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<String, UserRecord>>,
    connected_accounts: RwLock<HashMap<String, String>>,
    google_tokens: RwLock<HashMap<String, GoogleTokens>>,
    oauth_states: RwLock<HashMap<String, String>>,
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn get_user(&self, user_id: &str) -> DashResult<Option<UserRecord>> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> DashResult<Option<UserRecord>> {
        let email = email.trim().to_lowercase();
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.email.to_lowercase() == email)
            .cloned())
    }

    async fn create_user(&self, user: &UserRecord) -> DashResult<()> {
        let mut users = self.users.write().await;
        let email = user.email.trim().to_lowercase();
        if users.values().any(|u| u.email.to_lowercase() == email) {
            return Err(auth_error("Email is already registered"));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get_connected_account(&self, user_id: &str) -> DashResult<Option<String>> {
        Ok(self.connected_accounts.read().await.get(user_id).cloned())
    }

    async fn set_connected_account(&self, user_id: &str, account_id: &str) -> DashResult<()> {
        self.connected_accounts
            .write()
            .await
            .insert(user_id.to_string(), account_id.to_string());
        Ok(())
    }

    async fn remove_connected_account(&self, user_id: &str) -> DashResult<()> {
        self.connected_accounts.write().await.remove(user_id);
        Ok(())
    }

    async fn get_google_tokens(&self, user_id: &str) -> DashResult<Option<GoogleTokens>> {
        Ok(self.google_tokens.read().await.get(user_id).cloned())
    }

    async fn save_google_tokens(&self, user_id: &str, tokens: &GoogleTokens) -> DashResult<()> {
        self.google_tokens
            .write()
            .await
            .insert(user_id.to_string(), tokens.clone());
        Ok(())
    }

    async fn save_oauth_state(&self, state: &str, user_id: &str) -> DashResult<()> {
        self.oauth_states
            .write()
            .await
            .insert(state.to_string(), user_id.to_string());
        Ok(())
    }

    async fn take_oauth_state(&self, state: &str) -> DashResult<Option<String>> {
        Ok(self.oauth_states.write().await.remove(state))
    }
}
