//! User data store: the slow source of truth behind the cache.
//!
//! [`DataStore`] is the seam the service fetches through on a cache miss.
//! [`MockStore`] is an in-memory implementation that sleeps before every
//! lookup to stand in for database or network latency.

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A user record.
///
/// `User::default()` (`{"id":0,"name":""}`) is what unknown or invalid ids
/// resolve to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
}

impl User {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A synchronous, possibly slow source of users.
///
/// Lookups may block the calling thread; callers run them off the async
/// reactor.
pub trait DataStore: Send + Sync {
    /// Returns the user with `id`, or `User::default()` if there is none.
    fn get_user(&self, id: i64) -> User;
}

/// An in-memory [`DataStore`] with a fixed artificial latency per lookup.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use readthrough::store::{DataStore, MockStore, User};
///
/// let store = MockStore::new(Duration::ZERO).with_user(User::new(3, "Ada"));
/// assert_eq!(store.get_user(3).name, "Ada");
/// assert_eq!(store.get_user(4), User::default());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    users: HashMap<i64, User>,
    latency: Duration,
}

impl MockStore {
    /// Creates an empty store that sleeps for `latency` on every lookup.
    pub fn new(latency: Duration) -> Self {
        Self {
            users: HashMap::new(),
            latency,
        }
    }

    /// Creates a store holding the two demo users, John and Jane Doe.
    pub fn seeded(latency: Duration) -> Self {
        Self::new(latency)
            .with_user(User::new(1, "John Doe"))
            .with_user(User::new(2, "Jane Doe"))
    }

    /// Adds `user`, replacing any user with the same id.
    #[must_use]
    pub fn with_user(mut self, user: User) -> Self {
        self.users.insert(user.id, user);
        self
    }

    /// Returns the artificial latency applied to each lookup.
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Returns the number of stored users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns `true` if the store holds no users.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl DataStore for MockStore {
    fn get_user(&self, id: i64) -> User {
        debug!(id, latency = ?self.latency, "store lookup");
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        self.users.get(&id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn seeded_users() {
        let store = MockStore::seeded(Duration::ZERO);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get_user(1), User::new(1, "John Doe"));
        assert_eq!(store.get_user(2), User::new(2, "Jane Doe"));
    }

    #[test]
    fn unknown_id_is_default_user() {
        let store = MockStore::seeded(Duration::ZERO);
        assert_eq!(store.get_user(99), User::default());
    }

    #[test]
    fn lookup_waits_for_latency() {
        let store = MockStore::seeded(Duration::from_millis(30));
        let started = Instant::now();
        store.get_user(1);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn user_json_shape() {
        let json = serde_json::to_string(&User::new(1, "John Doe")).unwrap();
        assert_eq!(json, r#"{"id":1,"name":"John Doe"}"#);
        let zero = serde_json::to_string(&User::default()).unwrap();
        assert_eq!(zero, r#"{"id":0,"name":""}"#);
    }
}
