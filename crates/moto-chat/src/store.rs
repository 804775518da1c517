//! Append-only conversation log.

use std::sync::{Mutex, PoisonError};

use moto_core::types::ChatTurn;

/// Greeting seeded into every new store.
pub const GREETING: &str = "Hello! I am your Motorbike Specialist. Ask me about any bike's price, specs, or engine details in Bangladesh.";

/// Ordered log of chat turns for one mounted chat room.
///
/// Never empty: construction seeds the assistant greeting. Turns are only
/// ever appended; `all` returns an owned snapshot.
#[derive(Debug)]
pub struct MessageStore {
    turns: Mutex<Vec<ChatTurn>>,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore {
    pub fn new() -> Self {
        Self::with_greeting(GREETING)
    }

    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        Self {
            turns: Mutex::new(vec![ChatTurn::assistant(greeting)]),
        }
    }

    pub fn append(&self, turn: ChatTurn) {
        self.lock().push(turn);
    }

    /// Snapshot of every turn in insertion order.
    pub fn all(&self) -> Vec<ChatTurn> {
        self.lock().clone()
    }

    /// Turns appended at or after `index`.
    pub fn since(&self, index: usize) -> Vec<ChatTurn> {
        self.lock().get(index..).map(<[ChatTurn]>::to_vec).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Never true: the store is seeded with the greeting.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn last(&self) -> Option<ChatTurn> {
        self.lock().last().cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ChatTurn>> {
        // A panic mid-push cannot leave the Vec half-written.
        self.turns.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use moto_core::types::Speaker;

    #[test]
    fn test_new_store_seeds_greeting() {
        let store = MessageStore::new();
        let turns = store.all();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].speaker(), Speaker::Assistant);
        assert!(turns[0]
            .text()
            .starts_with("Hello! I am your Motorbike Specialist"));
        assert!(!store.is_empty());
    }

    #[test]
    fn test_append_preserves_order() {
        let store = MessageStore::new();
        store.append(ChatTurn::user("first"));
        store.append(ChatTurn::assistant("second"));
        store.append(ChatTurn::user("third"));

        let texts: Vec<String> = store.all().iter().map(|t| t.text().to_string()).collect();
        assert_eq!(texts[1..], ["first", "second", "third"]);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_snapshot_is_stable_without_appends() {
        let store = MessageStore::new();
        store.append(ChatTurn::user("Honda CB Hornet 160R"));
        assert_eq!(store.all(), store.all());
    }

    #[test]
    fn test_snapshot_is_detached_from_later_appends() {
        let store = MessageStore::new();
        let before = store.all();
        store.append(ChatTurn::user("later"));
        assert_eq!(before.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_since() {
        let store = MessageStore::new();
        store.append(ChatTurn::user("a"));
        store.append(ChatTurn::assistant("b"));

        assert_eq!(store.since(0).len(), 3);
        assert_eq!(store.since(2), vec![ChatTurn::assistant("b")]);
        assert!(store.since(3).is_empty());
        assert!(store.since(99).is_empty());
    }

    #[test]
    fn test_last() {
        let store = MessageStore::with_greeting("hi");
        assert_eq!(store.last(), Some(ChatTurn::assistant("hi")));
        store.append(ChatTurn::user("yo"));
        assert_eq!(store.last(), Some(ChatTurn::user("yo")));
    }
}
