//! Emote occurrence counting and change notifications
//!
//! An [`EmoteCounter`] tracks one emote token. It matches whole-word
//! occurrences only: a token flanked by whitespace or the edges of the
//! line. `Kappa` therefore never matches inside `Kappa123` or `xKappa`.
//!
//! Tokens are escaped before being embedded in the boundary pattern, so a
//! token containing regex metacharacters is matched literally. This is the
//! hardened reading of the matcher contract; see DESIGN.md.

use crate::{Error, Result};
use regex::Regex;

/// What changed on a counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmoteEventKind {
    /// The occurrence count changed
    Count,
    /// The query count changed
    Query,
}

/// Snapshot of a counter's state, delivered to subscribers on change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmoteEvent {
    /// Which counter changed
    pub kind: EmoteEventKind,
    /// The emote token
    pub token: String,
    /// Occurrence count at the time of the event
    pub count: u64,
    /// Query count at the time of the event
    pub queries: u64,
}

/// Subscriber callback
///
/// Dispatch is synchronous on the processor task, so callbacks must not
/// block.
pub type EmoteCallback = Box<dyn Fn(&EmoteEvent) + Send>;

/// Counter for one tracked emote token
pub struct EmoteCounter {
    /// The string a chat user types for this emote
    token: String,
    /// Compiled word-boundary pattern for the token
    pattern: Regex,
    /// Running count of occurrences seen in chat
    count: u64,
    /// Running count of `!emotecount` queries for this token
    queries: u64,
    /// Subscribers notified on every change
    subscribers: Vec<(usize, EmoteCallback)>,
    next_subscriber_id: usize,
}

impl std::fmt::Debug for EmoteCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmoteCounter")
            .field("token", &self.token)
            .field("count", &self.count)
            .field("queries", &self.queries)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl EmoteCounter {
    /// Create a counter for an emote token
    ///
    /// Fails if the token is empty or the boundary pattern does not
    /// compile.
    ///
    /// Boundaries are `\s`, which here means Unicode whitespace: a token
    /// flanked by e.g. a no-break space counts as a whole-word match.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::Emote("emote token must not be empty".to_string()));
        }

        let pattern = Regex::new(&format!(r"(?:^|\s)({})(?:\s|$)", regex::escape(&token)))
            .map_err(|e| Error::Emote(format!("invalid pattern for emote {:?}: {}", token, e)))?;

        Ok(Self {
            token,
            pattern,
            count: 0,
            queries: 0,
            subscribers: Vec::new(),
            next_subscriber_id: 0,
        })
    }

    /// The emote token this counter tracks
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Running count of occurrences
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Running count of chat queries for this emote
    pub fn queries(&self) -> u64 {
        self.queries
    }

    /// Search `text` for whole-word occurrences of the token
    ///
    /// Every occurrence found in the line is added to the running count,
    /// and a single `Count` event fires if at least one was found. Returns
    /// whether any occurrence matched.
    ///
    /// Adjacent occurrences that share a single separating space are all
    /// counted: the scan resumes at the end of the matched token, not at
    /// the end of the trailing boundary.
    pub fn search(&mut self, text: &str) -> bool {
        let mut found = 0u64;
        let mut at = 0usize;
        while let Some(captures) = self.pattern.captures_at(text, at) {
            let matched = match captures.get(1) {
                Some(m) => m,
                None => break,
            };
            found += 1;
            at = matched.end();
        }

        if found == 0 {
            return false;
        }
        self.count += found;
        self.publish(EmoteEventKind::Count);
        true
    }

    /// Record one chat query for this emote and notify subscribers
    pub fn increment_queries(&mut self) {
        self.queries += 1;
        self.publish(EmoteEventKind::Query);
    }

    /// Reset both counts to zero
    ///
    /// Used at reconfiguration boundaries only; fires no event.
    pub fn clear(&mut self) {
        self.count = 0;
        self.queries = 0;
    }

    /// Register a change subscriber; returns an id for `unsubscribe`
    pub fn subscribe(&mut self, callback: impl Fn(&EmoteEvent) + Send + 'static) -> usize {
        let id = self.next_subscriber_id;
        self.next_subscriber_id += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Remove a previously registered subscriber
    pub fn unsubscribe(&mut self, id: usize) {
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
    }

    /// Deliver an event to all subscribers, synchronously
    fn publish(&self, kind: EmoteEventKind) {
        let event = EmoteEvent {
            kind,
            token: self.token.clone(),
            count: self.count,
            queries: self.queries,
        };
        for (_, callback) in &self.subscribers {
            callback(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_empty_token_rejected() {
        assert!(EmoteCounter::new("").is_err());
        assert!(EmoteCounter::new("   ").is_err());
    }

    #[test]
    fn test_search_whole_word_only() {
        let mut counter = EmoteCounter::new("Kappa").unwrap();
        assert!(counter.search("Kappa"));
        assert!(counter.search("hello Kappa world"));
        assert!(counter.search("ends with Kappa"));
        assert_eq!(counter.count(), 3);

        assert!(!counter.search("Kappa123"));
        assert!(!counter.search("xKappa"));
        assert!(!counter.search("xKappax"));
        assert!(!counter.search("totally unrelated"));
        assert_eq!(counter.count(), 3);
    }

    #[test]
    fn test_unicode_whitespace_is_a_boundary() {
        let mut counter = EmoteCounter::new("Kappa").unwrap();
        assert!(counter.search("hello\u{00a0}Kappa\u{00a0}world"));
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn test_search_counts_every_occurrence_in_line() {
        let mut counter = EmoteCounter::new("Kappa").unwrap();
        assert!(counter.search("Kappa Kappa Kappa"));
        assert_eq!(counter.count(), 3);
    }

    #[test]
    fn test_search_adjacent_occurrences_share_separator() {
        let mut counter = EmoteCounter::new("Kappa").unwrap();
        assert!(counter.search("Kappa Kappa"));
        assert_eq!(counter.count(), 2);
    }

    #[test]
    fn test_redelivered_line_counts_again() {
        let mut counter = EmoteCounter::new("Kappa").unwrap();
        counter.search("Kappa is great");
        counter.search("Kappa is great");
        assert_eq!(counter.count(), 2);
    }

    #[test]
    fn test_metacharacter_token_matched_literally() {
        let mut counter = EmoteCounter::new("<3").unwrap();
        assert!(counter.search("sending <3 to chat"));
        assert!(!counter.search("sending x3 to chat"));
        assert_eq!(counter.count(), 1);

        let mut counter = EmoteCounter::new(":)").unwrap();
        assert!(counter.search(":) hello"));
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn test_queries_and_clear() {
        let mut counter = EmoteCounter::new("PogChamp").unwrap();
        counter.search("PogChamp");
        counter.increment_queries();
        counter.increment_queries();
        assert_eq!(counter.count(), 1);
        assert_eq!(counter.queries(), 2);

        counter.clear();
        assert_eq!(counter.count(), 0);
        assert_eq!(counter.queries(), 0);
    }

    #[test]
    fn test_count_event_fires_once_per_matching_line() {
        let mut counter = EmoteCounter::new("Kappa").unwrap();
        let events = Arc::new(AtomicUsize::new(0));
        let seen = events.clone();
        counter.subscribe(move |event| {
            assert_eq!(event.kind, EmoteEventKind::Count);
            assert_eq!(event.token, "Kappa");
            seen.fetch_add(1, Ordering::SeqCst);
        });

        counter.search("Kappa Kappa");
        assert_eq!(events.load(Ordering::SeqCst), 1);
        counter.search("no match here");
        assert_eq!(events.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_query_event_carries_counts() {
        let mut counter = EmoteCounter::new("Kappa").unwrap();
        counter.search("Kappa");
        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = events.clone();
        counter.subscribe(move |event| {
            sink.lock().unwrap().push(event.clone());
        });

        counter.increment_queries();
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EmoteEventKind::Query);
        assert_eq!(events[0].count, 1);
        assert_eq!(events[0].queries, 1);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut counter = EmoteCounter::new("Kappa").unwrap();
        let events = Arc::new(AtomicUsize::new(0));
        let seen = events.clone();
        let id = counter.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        counter.search("Kappa");
        counter.unsubscribe(id);
        counter.search("Kappa");
        assert_eq!(events.load(Ordering::SeqCst), 1);
    }
}
