use std::sync::RwLock;

use crate::error::AdminError;

/// Process-wide list of blocked usernames, kept in the order they were added.
#[derive(Debug, Default)]
pub struct BlockList {
    users: RwLock<Vec<String>>,
}

impl BlockList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, username: &str) -> Result<(), AdminError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AdminError::EmptyUsername);
        }
        let mut users = self.users.write().unwrap();
        if users.iter().any(|u| u == username) {
            return Err(AdminError::AlreadyBlocked);
        }
        users.push(username.to_string());
        Ok(())
    }

    pub fn remove(&self, username: &str) -> Result<(), AdminError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AdminError::EmptyUsername);
        }
        let mut users = self.users.write().unwrap();
        let pos = users
            .iter()
            .position(|u| u == username)
            .ok_or(AdminError::NotBlocked)?;
        users.remove(pos);
        Ok(())
    }

    pub fn contains(&self, username: &str) -> bool {
        self.users.read().unwrap().iter().any(|u| u == username)
    }

    pub fn list(&self) -> Vec<String> {
        self.users.read().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.users.read().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_contains() {
        let list = BlockList::new();
        list.add("alice").unwrap();
        assert!(list.contains("alice"));
        assert!(!list.contains("bob"));
    }

    #[test]
    fn test_add_twice_fails() {
        let list = BlockList::new();
        list.add("alice").unwrap();
        assert_eq!(list.add("alice"), Err(AdminError::AlreadyBlocked));
        assert_eq!(list.count(), 1);
    }

    #[test]
    fn test_remove() {
        let list = BlockList::new();
        list.add("alice").unwrap();
        list.remove("alice").unwrap();
        assert!(!list.contains("alice"));
        assert_eq!(list.remove("alice"), Err(AdminError::NotBlocked));
    }

    #[test]
    fn test_usernames_are_trimmed() {
        let list = BlockList::new();
        list.add("  alice ").unwrap();
        assert!(list.contains("alice"));
        assert_eq!(list.add(""), Err(AdminError::EmptyUsername));
        assert_eq!(list.add("   "), Err(AdminError::EmptyUsername));
    }

    #[test]
    fn test_list_keeps_insertion_order() {
        let list = BlockList::new();
        list.add("carol").unwrap();
        list.add("alice").unwrap();
        list.add("bob").unwrap();
        list.remove("alice").unwrap();
        assert_eq!(list.list(), vec!["carol", "bob"]);
    }
}
