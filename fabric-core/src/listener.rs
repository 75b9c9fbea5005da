//! Pattern-based listener subscription and dispatch.
//!
//! A pattern is an anchored regular expression over event names. Patterns
//! with no regex metacharacters are recognized and matched with a plain
//! prefix comparison; everything else is compiled once at subscription time
//! and matched with the regex engine. This is the same fast-path/slow-path
//! split this crate already uses for topic matching, generalized from
//! byte-prefix equality to anchored-regex equality.

use regex::Regex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{CoreError, Result};
use crate::event::Event;

/// A registered listener callback.
pub type ListenerFn = Arc<dyn Fn(&Event) + Send + Sync>;

/// Opaque handle returned by [`ListenerTable::subscribe`], needed to remove
/// that exact registration later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerHandle(u64);

enum Matcher {
    /// No regex metacharacters; matched by prefix comparison.
    Literal(Arc<str>),
    /// Compiled anchored regex.
    Regex(Regex),
}

impl Matcher {
    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Literal(prefix) => name.starts_with(prefix.as_ref()),
            Self::Regex(re) => re.is_match(name),
        }
    }
}

fn is_literal(pattern: &str) -> bool {
    regex::escape(pattern) == pattern
}

fn compile_anchored(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    let anchored = if pattern.starts_with('^') {
        pattern.to_string()
    } else {
        format!("^(?:{pattern})")
    };
    Regex::new(&anchored)
}

struct PatternEntry {
    pattern: Arc<str>,
    matcher: Matcher,
    listeners: Vec<(u64, ListenerFn)>,
}

/// Mapping from event-name pattern to an ordered list of listeners.
///
/// Registration order is preserved and is the delivery order, both within
/// one pattern's listener list and across patterns.
pub struct ListenerTable {
    entries: Mutex<Vec<PatternEntry>>,
    next_id: AtomicU64,
}

impl ListenerTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `listener` against `pattern`, creating the pattern entry if
    /// it doesn't already exist. Duplicate registrations for the same
    /// pattern are permitted and dispatched multiple times.
    pub fn subscribe(&self, pattern: &str, listener: ListenerFn) -> Result<ListenerHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.iter_mut().find(|e| e.pattern.as_ref() == pattern) {
            entry.listeners.push((id, listener));
            return Ok(ListenerHandle(id));
        }

        let matcher = if is_literal(pattern) {
            Matcher::Literal(Arc::from(pattern))
        } else {
            let re = compile_anchored(pattern).map_err(|e| CoreError::InvalidPattern {
                pattern: pattern.to_string(),
                cause: e.to_string(),
            })?;
            Matcher::Regex(re)
        };

        entries.push(PatternEntry {
            pattern: Arc::from(pattern),
            matcher,
            listeners: vec![(id, listener)],
        });
        debug!(pattern, "registered listener pattern");
        Ok(ListenerHandle(id))
    }

    /// Remove the listener identified by `handle` from `pattern`. If that
    /// was the last listener for the pattern, the pattern entry itself is
    /// removed.
    pub fn unsubscribe(&self, pattern: &str, handle: ListenerHandle) {
        let mut entries = self.entries.lock();
        if let Some(idx) = entries.iter().position(|e| e.pattern.as_ref() == pattern) {
            entries[idx].listeners.retain(|(id, _)| *id != handle.0);
            if entries[idx].listeners.is_empty() {
                entries.remove(idx);
            }
        }
    }

    /// Invoke every listener whose pattern matches `event.name()`, in
    /// registration order. A listener that panics is caught and logged;
    /// it does not stop delivery to the remaining listeners or poison the
    /// table.
    pub fn notify_listeners(&self, event: &Event) {
        // Clone the matching listener handles out from under the lock so a
        // listener calling subscribe/unsubscribe from within notify doesn't
        // deadlock on this same mutex.
        let matching: Vec<ListenerFn> = {
            let entries = self.entries.lock();
            entries
                .iter()
                .filter(|e| e.matcher.matches(event.name()))
                .flat_map(|e| e.listeners.iter().map(|(_, f)| f.clone()))
                .collect()
        };

        for listener in matching {
            let result = catch_unwind(AssertUnwindSafe(|| listener(event)));
            if result.is_err() {
                warn!(event = event.name(), "listener panicked; continuing dispatch");
            }
        }
    }
}

impl Default for ListenerTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventContent;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn literal_pattern_matches_by_prefix() {
        let table = ListenerTable::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        table
            .subscribe("fabric/core.connection.", Arc::new(move |_: &Event| {
                c.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        table.notify_listeners(&Event::new("fabric/core.connection.new", EventContent::Empty));
        table.notify_listeners(&Event::new("fabric/core.other", EventContent::Empty));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn regex_pattern_is_anchored_at_start() {
        let table = ListenerTable::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        table
            .subscribe(r"fabric/core\.connection\..*", Arc::new(move |_: &Event| {
                c.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        table.notify_listeners(&Event::new("fabric/core.connection.new", EventContent::Empty));
        table.notify_listeners(&Event::new("fabric/core.connection.lost", EventContent::Empty));
        table.notify_listeners(&Event::new("fabric/core.other", EventContent::Empty));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_listener_does_not_block_the_next_one() {
        let table = ListenerTable::new();
        let count = Arc::new(AtomicUsize::new(0));
        table
            .subscribe("x", Arc::new(|_: &Event| panic!("boom")))
            .unwrap();
        let c = count.clone();
        table
            .subscribe("x", Arc::new(move |_: &Event| {
                c.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        table.notify_listeners(&Event::new("x", EventContent::Empty));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_removes_only_that_registration() {
        let table = ListenerTable::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c1 = count.clone();
        let h1 = table
            .subscribe("x", Arc::new(move |_: &Event| {
                c1.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        let c2 = count.clone();
        table
            .subscribe("x", Arc::new(move |_: &Event| {
                c2.fetch_add(10, Ordering::SeqCst);
            }))
            .unwrap();

        table.unsubscribe("x", h1);
        table.notify_listeners(&Event::new("x", EventContent::Empty));
        assert_eq!(count.load(Ordering::SeqCst), 10);
    }
}
