//! Utility functions for the coordinator service

use crate::error::{CoordinatorError, CoordinatorResult};

/// Validate an inbound lobby identifier
///
/// Deviates from a plain non-empty check: whitespace-only ids are rejected
/// as well and never reach the store.
pub fn validate_lobby_id(lobby_id: &str) -> CoordinatorResult<()> {
    if lobby_id.trim().is_empty() {
        return Err(CoordinatorError::InvalidLobbyRequest {
            reason: "lobby_id is required".to_string(),
        });
    }
    Ok(())
}

/// Match a key against a glob pattern supporting `*` and `?`
pub fn glob_matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();

    let (mut p, mut k) = (0, 0);
    let mut star: Option<usize> = None;
    let mut star_k = 0;

    while k < key.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == key[k]) {
            p += 1;
            k += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            star_k = k;
            p += 1;
        } else if let Some(star_p) = star {
            // Backtrack: let the last star swallow one more character
            p = star_p + 1;
            star_k += 1;
            k = star_k;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

/// Split a comma separated server list, dropping blanks
pub fn split_server_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_lobby_id() {
        assert!(validate_lobby_id("lobby-1").is_ok());
        assert!(validate_lobby_id("").unwrap_err().is_client_error());
        assert!(validate_lobby_id("   ").unwrap_err().is_client_error());
    }

    #[test]
    fn test_glob_matches() {
        assert!(glob_matches("*", ""));
        assert!(glob_matches("*", "anything"));
        assert!(glob_matches("lobby:*", "lobby:42"));
        assert!(!glob_matches("lobby:*", "server:42"));
        assert!(glob_matches("l?bby", "lobby"));
        assert!(!glob_matches("l?bby", "lbby"));
        assert!(glob_matches("*:*:x", "a:b:c:x"));
        assert!(!glob_matches("abc", "abcd"));
    }

    #[test]
    fn test_split_server_list() {
        assert_eq!(
            split_server_list("a:1, b:2,,c:3 "),
            vec!["a:1".to_string(), "b:2".to_string(), "c:3".to_string()]
        );
        assert!(split_server_list(" , ").is_empty());
    }
}
