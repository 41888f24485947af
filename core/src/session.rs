//! Session persistence on top of a [`KeyValueStore`].
//!
//! Reads are defensive: a missing, unparseable or non-object user record
//! loads as "no user" instead of failing.

use serde_json::Value;
use tracing::warn;

use crate::error::StorageError;
use crate::storage::KeyValueStore;
use crate::types::Session;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

#[derive(Debug)]
pub struct SessionStore<S> {
    storage: S,
}

impl<S: KeyValueStore> SessionStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn load(&self) -> Session {
        let user = self.storage.get(USER_KEY).and_then(|raw| {
            match serde_json::from_str::<Value>(&raw) {
                Ok(user @ Value::Object(_)) => Some(user),
                Ok(Value::Null) => None,
                Ok(other) => {
                    warn!(kind = json_kind(&other), "stored user record is not an object, treating as logged out");
                    None
                }
                Err(e) => {
                    warn!(error = %e, "stored user record is not valid JSON, treating as logged out");
                    None
                }
            }
        });
        Session {
            user,
            token: self.storage.get(TOKEN_KEY),
        }
    }

    /// Two independent writes; an absent field removes its key.
    ///
    /// The user is written first: the bearer credential derives from it, so a
    /// failure on the token write cannot leave a new token paired with the
    /// previous user.
    pub fn save(&mut self, session: &Session) -> Result<(), StorageError> {
        match &session.user {
            Some(user) => {
                let raw = serde_json::to_string(user).map_err(|e| StorageError::Encode(e.to_string()))?;
                self.storage.set(USER_KEY, &raw)?;
            }
            None => self.storage.remove(USER_KEY)?,
        }
        match &session.token {
            Some(token) => self.storage.set(TOKEN_KEY, token)?,
            None => self.storage.remove(TOKEN_KEY)?,
        }
        Ok(())
    }

    /// Removes every persisted entry, not only the session keys.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.storage.clear()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_inner(self) -> S {
        self.storage
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
