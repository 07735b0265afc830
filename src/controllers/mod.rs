//! Per-feature view logic. Controllers read and write through the
//! [`AppContext`](crate::app::AppContext) backends and return derived state.

pub mod appointments;
pub mod files;
pub mod login;
pub mod messaging;
pub mod metrics;
pub mod notifications;
pub mod patients;
pub mod registration;
pub mod reports;

use crate::models::User;
use crate::storage::{collections, fetch, RemoteStore};
use log::error;

/// Fetches a user record, treating lookup failures as absent.
pub async fn lookup_user(store: &dyn RemoteStore, id: &str) -> Option<User> {
    match fetch::<User>(store, collections::USERS, id).await {
        Ok(user) => user,
        Err(e) => {
            error!("[Users] Failed to fetch user {}: {}", id, e);
            None
        }
    }
}

/// Case-insensitive substring match; an empty term matches everything.
pub fn matches_search(text: &str, term: &str) -> bool {
    let term = term.trim();
    term.is_empty() || text.to_lowercase().contains(&term.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_search() {
        assert!(matches_search("Gregory House", "house"));
        assert!(matches_search("Gregory House", "  "));
        assert!(!matches_search("Gregory House", "wilson"));
    }
}
