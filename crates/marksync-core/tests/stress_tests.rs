//! Stress tests for high-volume operations
//!
//! These tests verify the engine handles many bookmarks, many tabs,
//! and concurrent writers.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use marksync_core::{BookmarkId, BookmarkList, BookmarkSync, LocalBus, MemoryStore, OwnerId};

fn alice() -> OwnerId {
    OwnerId::parse("alice").unwrap()
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within timeout");
}

// ============================================================================
// Single Tab Stress Tests
// ============================================================================

/// Test adding 500 bookmarks through one engine
#[tokio::test]
async fn test_500_bookmarks_in_one_tab() {
    let store = Arc::new(MemoryStore::new());
    let tab = BookmarkSync::new(store.clone(), Arc::new(LocalBus::default()));
    tab.initialize(alice()).await.unwrap();

    let start = Instant::now();
    for i in 0..500 {
        tab.add_bookmark(&format!("Bookmark {}", i), &format!("https://{}.example", i))
            .await
            .unwrap();
    }
    let duration = start.elapsed();

    assert_eq!(tab.len(), 500);
    assert_eq!(store.len(), 500);
    assert_eq!(tab.bookmarks()[0].title, "Bookmark 499");

    let ids: HashSet<_> = tab.bookmarks().iter().map(|b| b.id).collect();
    assert_eq!(ids.len(), 500);

    println!("Added 500 bookmarks in {:?}", duration);
}

/// Test a large list merge with many in-flight broadcasts
#[test]
fn test_large_load_merge() {
    let owner = alice();
    let make = |i: i64| marksync_core::Bookmark {
        id: BookmarkId::new(),
        url: format!("https://{}.example", i),
        title: format!("Bookmark {}", i),
        created_at: i,
        owner_id: owner.clone(),
    };
    let listing: Vec<_> = (0..5_000).map(make).collect();

    let mut list = BookmarkList::new();
    let ticket = list.begin_load();
    for b in listing.iter().step_by(2) {
        list.insert_head(b.clone());
    }
    for b in listing.iter().step_by(5) {
        list.remove(&b.id);
    }

    let start = Instant::now();
    list.finish_load(ticket, listing);
    println!("Merged 5000-entry listing in {:?}", start.elapsed());

    assert_eq!(list.len(), 4_000);
    assert_eq!(list.iter().next().map(|b| b.created_at), Some(4_999));
}

// ============================================================================
// Multi Tab Stress Tests
// ============================================================================

/// Several tabs adding concurrently converge on the same list
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tabs_converge() {
    const TABS: usize = 5;
    const ADDS_PER_TAB: usize = 20;

    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(LocalBus::default());

    let mut tabs = Vec::new();
    for _ in 0..TABS {
        let tab = Arc::new(BookmarkSync::new(store.clone(), bus.clone()));
        tab.initialize(alice()).await.unwrap();
        tabs.push(tab);
    }

    let mut writers = Vec::new();
    for (t, tab) in tabs.iter().enumerate() {
        let tab = tab.clone();
        writers.push(tokio::spawn(async move {
            for i in 0..ADDS_PER_TAB {
                tab.add_bookmark(&format!("Tab {} #{}", t, i), &format!("https://{}/{}", t, i))
                    .await
                    .unwrap();
            }
        }));
    }
    for result in futures::future::join_all(writers).await {
        result.unwrap();
    }

    let total = TABS * ADDS_PER_TAB;
    for tab in &tabs {
        eventually(|| tab.len() == total).await;
    }

    let reference: HashSet<_> = tabs[0].bookmarks().iter().map(|b| b.id).collect();
    assert_eq!(reference.len(), total);
    for tab in &tabs[1..] {
        let ids: HashSet<_> = tab.bookmarks().iter().map(|b| b.id).collect();
        assert_eq!(ids, reference);
    }

    for tab in &tabs {
        tab.shutdown().await;
    }
    assert_eq!(bus.topic_count(), 0);
}

/// Concurrent deletes from every tab empty every tab
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deletes_converge() {
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(LocalBus::default());

    let mut tabs = Vec::new();
    for _ in 0..3 {
        let tab = Arc::new(BookmarkSync::new(store.clone(), bus.clone()));
        tab.initialize(alice()).await.unwrap();
        tabs.push(tab);
    }

    let mut ids = Vec::new();
    for i in 0..30 {
        let b = tabs[0]
            .add_bookmark(&format!("B{}", i), &format!("https://b/{}", i))
            .await
            .unwrap();
        ids.push(b.id);
    }
    for tab in &tabs {
        eventually(|| tab.len() == 30).await;
    }

    // Every tab deletes every id; duplicates hit NotFound and still succeed
    let mut deleters = Vec::new();
    for tab in &tabs {
        let tab = tab.clone();
        let ids = ids.clone();
        deleters.push(tokio::spawn(async move {
            for id in ids {
                tab.delete_bookmark(id).await.unwrap();
            }
        }));
    }
    for result in futures::future::join_all(deleters).await {
        result.unwrap();
    }

    for tab in &tabs {
        eventually(|| tab.is_empty()).await;
    }
    assert!(store.is_empty());
}
