//! The visible bookmark list of one session
//!
//! `BookmarkList` is a plain data structure with no I/O. All merge rules live
//! here so they can be tested without a store or a bus:
//!
//! - identity is the bookmark id, never `(title, url)`
//! - an insert for a present id is a no-op; inserts go to the head
//! - a removal tombstones the id for the lifetime of the list, so a late
//!   listing or a reordered add cannot bring it back
//! - a load window collects what was inserted while a store listing was in
//!   flight; finishing the load rebuilds the list from the listing plus that
//!   window and sorts it newest first, once
//!
//! ```text
//!   begin_load() ──► insert_head()/remove() … ──► finish_load(ticket, listing)
//!        │                  │                              │
//!   generation += 1    window records ids       listing ∪ window − tombstones
//!                                               sorted by created_at desc
//! ```

use std::collections::HashSet;

use crate::types::{Bookmark, BookmarkId};

/// Handle for one in-flight store listing
///
/// Only the ticket of the most recent [`BookmarkList::begin_load`] is
/// accepted by [`BookmarkList::finish_load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

/// Result of merging a store listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The listing was merged; the list now holds `count` entries
    Applied { count: usize },
    /// A newer load started after this one; the listing was discarded
    Stale,
}

/// Ordered, id-unique list of bookmarks
#[derive(Debug, Default, Clone)]
pub struct BookmarkList {
    /// Newest first
    entries: Vec<Bookmark>,
    /// Ids removed during this session
    tombstones: HashSet<BookmarkId>,
    /// Ids inserted while a load is in flight
    window: Option<HashSet<BookmarkId>>,
    generation: u64,
}

impl BookmarkList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &BookmarkId) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: &BookmarkId) -> Option<&Bookmark> {
        self.entries.iter().find(|b| &b.id == id)
    }

    /// Whether `id` was removed during this session
    pub fn is_tombstoned(&self, id: &BookmarkId) -> bool {
        self.tombstones.contains(id)
    }

    /// Whether a load is in flight
    pub fn is_loading(&self) -> bool {
        self.window.is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bookmark> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<Bookmark> {
        self.entries.clone()
    }

    /// Insert at the head unless the id is present or tombstoned.
    ///
    /// Returns whether the list changed.
    pub fn insert_head(&mut self, bookmark: Bookmark) -> bool {
        if self.tombstones.contains(&bookmark.id) || self.contains(&bookmark.id) {
            return false;
        }
        if let Some(window) = self.window.as_mut() {
            window.insert(bookmark.id);
        }
        self.entries.insert(0, bookmark);
        true
    }

    /// Remove the entry and tombstone its id, present or not.
    ///
    /// Returns the removed entry, if there was one.
    pub fn remove(&mut self, id: &BookmarkId) -> Option<Bookmark> {
        self.tombstones.insert(*id);
        if let Some(window) = self.window.as_mut() {
            window.remove(id);
        }
        self.position(id).map(|idx| self.entries.remove(idx))
    }

    /// Open a load window. A previous window, if any, is superseded.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        self.window = Some(HashSet::new());
        LoadTicket(self.generation)
    }

    /// Merge a store listing opened by `ticket`.
    ///
    /// The new list is the listing plus every entry inserted while the window
    /// was open, minus tombstones, without duplicate ids, sorted newest first.
    /// Entries that were visible before the window opened but are missing
    /// from the listing are dropped: the store no longer has them.
    pub fn finish_load(&mut self, ticket: LoadTicket, listing: Vec<Bookmark>) -> LoadOutcome {
        if ticket.0 != self.generation || self.window.is_none() {
            return LoadOutcome::Stale;
        }
        let window = self.window.take().unwrap_or_default();

        let mut seen = HashSet::with_capacity(listing.len() + window.len());
        let mut merged = Vec::with_capacity(listing.len() + window.len());

        let arrived_in_window = self
            .entries
            .drain(..)
            .filter(|b| window.contains(&b.id));

        for bookmark in listing.into_iter().chain(arrived_in_window) {
            if self.tombstones.contains(&bookmark.id) || !seen.insert(bookmark.id) {
                continue;
            }
            merged.push(bookmark);
        }

        merged.sort_by(|a, b| b.recency_key().cmp(&a.recency_key()));
        self.entries = merged;

        LoadOutcome::Applied {
            count: self.entries.len(),
        }
    }

    /// Close the load window without merging (the listing failed)
    pub fn abort_load(&mut self, ticket: LoadTicket) {
        if ticket.0 == self.generation {
            self.window = None;
        }
    }

    fn position(&self, id: &BookmarkId) -> Option<usize> {
        self.entries.iter().position(|b| &b.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OwnerId;

    fn bookmark(title: &str, created_at: i64) -> Bookmark {
        Bookmark {
            id: BookmarkId::new(),
            url: format!("https://{}.example", title.to_lowercase()),
            title: title.to_string(),
            created_at,
            owner_id: OwnerId::parse("alice").unwrap(),
        }
    }

    fn titles(list: &BookmarkList) -> Vec<&str> {
        list.iter().map(|b| b.title.as_str()).collect()
    }

    #[test]
    fn test_insert_head_orders_most_recent_first() {
        let mut list = BookmarkList::new();
        assert!(list.insert_head(bookmark("A", 1)));
        assert!(list.insert_head(bookmark("B", 2)));
        assert_eq!(titles(&list), vec!["B", "A"]);
    }

    #[test]
    fn test_insert_head_ignores_created_at() {
        let mut list = BookmarkList::new();
        list.insert_head(bookmark("New", 100));
        list.insert_head(bookmark("Old", 1));
        assert_eq!(titles(&list), vec!["Old", "New"]);
    }

    #[test]
    fn test_insert_same_id_is_idempotent() {
        let mut list = BookmarkList::new();
        let b = bookmark("A", 1);
        assert!(list.insert_head(b.clone()));
        assert!(!list.insert_head(b.clone()));
        assert!(!list.insert_head(b));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_same_content_different_ids_are_distinct() {
        let mut list = BookmarkList::new();
        let a = bookmark("A", 1);
        let twin = Bookmark {
            id: BookmarkId::new(),
            ..a.clone()
        };
        list.insert_head(a);
        list.insert_head(twin);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_remove_missing_id_is_a_noop_that_tombstones() {
        let mut list = BookmarkList::new();
        let b = bookmark("A", 1);

        assert!(list.remove(&b.id).is_none());
        assert!(list.remove(&b.id).is_none());
        assert!(list.is_tombstoned(&b.id));

        // A late add for the deleted id is dropped
        assert!(!list.insert_head(b));
        assert!(list.is_empty());
    }

    #[test]
    fn test_remove_present_id() {
        let mut list = BookmarkList::new();
        let a = bookmark("A", 1);
        let b = bookmark("B", 2);
        list.insert_head(a.clone());
        list.insert_head(b.clone());

        assert_eq!(list.remove(&a.id), Some(a.clone()));
        assert!(!list.contains(&a.id));
        assert_eq!(titles(&list), vec!["B"]);
    }

    #[test]
    fn test_load_sorts_listing_newest_first() {
        let mut list = BookmarkList::new();
        let ticket = list.begin_load();
        let outcome = list.finish_load(
            ticket,
            vec![bookmark("Mid", 2), bookmark("Old", 1), bookmark("New", 3)],
        );
        assert_eq!(outcome, LoadOutcome::Applied { count: 3 });
        assert_eq!(titles(&list), vec!["New", "Mid", "Old"]);
        assert!(!list.is_loading());
    }

    #[test]
    fn test_load_dedups_against_window_adds() {
        let mut list = BookmarkList::new();
        let x = bookmark("X", 5);

        let ticket = list.begin_load();
        list.insert_head(x.clone());
        list.finish_load(ticket, vec![x.clone(), bookmark("Y", 1)]);

        assert_eq!(list.len(), 2);
        assert_eq!(list.iter().filter(|b| b.id == x.id).count(), 1);
    }

    #[test]
    fn test_load_keeps_window_adds_missing_from_listing() {
        let mut list = BookmarkList::new();
        let ticket = list.begin_load();
        list.insert_head(bookmark("Fresh", 10));
        list.finish_load(ticket, vec![bookmark("Stored", 1)]);

        assert_eq!(titles(&list), vec!["Fresh", "Stored"]);
    }

    #[test]
    fn test_load_drops_tombstoned_ids() {
        let mut list = BookmarkList::new();
        let gone = bookmark("Gone", 2);

        let ticket = list.begin_load();
        list.remove(&gone.id);
        list.finish_load(ticket, vec![gone.clone(), bookmark("Kept", 1)]);

        assert_eq!(titles(&list), vec!["Kept"]);
        assert!(!list.contains(&gone.id));
    }

    #[test]
    fn test_reload_drops_entries_the_store_no_longer_has() {
        let mut list = BookmarkList::new();
        let a = bookmark("A", 1);
        let b = bookmark("B", 2);

        let ticket = list.begin_load();
        list.finish_load(ticket, vec![a.clone(), b.clone()]);

        // b was deleted elsewhere and the broadcast was missed
        let ticket = list.begin_load();
        list.finish_load(ticket, vec![a.clone()]);

        assert_eq!(titles(&list), vec!["A"]);
    }

    #[test]
    fn test_stale_load_is_discarded() {
        let mut list = BookmarkList::new();
        let first = list.begin_load();
        let second = list.begin_load();

        assert_eq!(
            list.finish_load(first, vec![bookmark("Old listing", 1)]),
            LoadOutcome::Stale
        );
        assert!(list.is_empty());
        assert!(list.is_loading());

        assert_eq!(
            list.finish_load(second, vec![bookmark("New listing", 2)]),
            LoadOutcome::Applied { count: 1 }
        );
    }

    #[test]
    fn test_abort_load_closes_window() {
        let mut list = BookmarkList::new();
        let ticket = list.begin_load();
        list.insert_head(bookmark("A", 1));
        list.abort_load(ticket);

        assert!(!list.is_loading());
        assert_eq!(list.len(), 1);
        assert_eq!(list.finish_load(ticket, vec![]), LoadOutcome::Stale);
    }

    #[test]
    fn test_equal_timestamps_fall_back_to_id_order() {
        let mut list = BookmarkList::new();
        let first = bookmark("First", 7);
        let second = Bookmark {
            id: BookmarkId::from_ulid(first.id.0.increment().unwrap()),
            title: "Second".into(),
            ..first.clone()
        };

        let ticket = list.begin_load();
        list.finish_load(ticket, vec![first, second]);
        assert_eq!(titles(&list), vec!["Second", "First"]);
    }
}
