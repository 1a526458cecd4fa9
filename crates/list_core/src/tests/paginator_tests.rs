use super::*;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq)]
struct Note {
    id: u64,
    body: String,
}

impl Identified for Note {
    type Key = u64;

    fn identity(&self) -> u64 {
        self.id
    }
}

fn note(id: u64) -> Note {
    Note {
        id,
        body: format!("note {id}"),
    }
}

fn catalog(len: usize) -> Vec<Note> {
    (0..len as u64).map(note).collect()
}

struct CatalogFetcher {
    notes: Vec<Note>,
    page_size: usize,
    calls: Arc<Mutex<Vec<usize>>>,
    delay: Option<Duration>,
    failures_left: AtomicUsize,
}

impl CatalogFetcher {
    fn new(notes: Vec<Note>, page_size: usize) -> Self {
        Self {
            notes,
            page_size,
            calls: Arc::new(Mutex::new(Vec::new())),
            delay: None,
            failures_left: AtomicUsize::new(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn failing_times(self, failures: usize) -> Self {
        self.failures_left.store(failures, Ordering::SeqCst);
        self
    }

    fn calls(&self) -> Arc<Mutex<Vec<usize>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl PageFetcher<Note> for CatalogFetcher {
    async fn fetch_page(&self, page_number: usize) -> Result<Page<Note>> {
        self.calls.lock().await.push(page_number);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failures_left.load(Ordering::SeqCst) > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(anyhow!("synthetic page failure"));
        }
        let start = (page_number - 1) * self.page_size;
        let slice: Vec<Note> = self
            .notes
            .iter()
            .skip(start)
            .take(self.page_size)
            .cloned()
            .collect();
        Ok(Page::wrap(
            slice,
            self.notes.len(),
            page_number,
            self.page_size,
        ))
    }
}

#[tokio::test]
async fn walks_pages_and_completes_at_total() {
    let fetcher = CatalogFetcher::new(catalog(16), 5);
    let calls = fetcher.calls();
    let paginator = Paginator::new(fetcher);

    for _ in 0..4 {
        paginator.load_more().await;
    }

    assert_eq!(paginator.items().get().len(), 16);
    assert_eq!(paginator.page().get(), 4);
    assert_eq!(paginator.total().get(), 16);
    assert!(paginator.complete().get());
    assert!(!paginator.error().get());
    assert_eq!(*calls.lock().await, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn overlapping_page_items_are_deduplicated() {
    // a source that keeps returning the same slice regardless of page
    let paginator = Paginator::new(|_page_number: usize| async {
        anyhow::Ok(Page::wrap(vec![note(1), note(2)], 4, 1, 2))
    });

    paginator.load_more().await;
    paginator.load_more().await;

    assert_eq!(paginator.items().get(), vec![note(1), note(2)]);
    assert_eq!(paginator.page().get(), 2);
    assert!(paginator.complete().get());
}

#[tokio::test]
async fn empty_page_marks_complete() {
    let paginator = Paginator::<Note, u64>::new(|page_number: usize| async move {
        anyhow::Ok(Page::wrap(Vec::new(), 10, page_number, 5))
    });

    paginator.load_more().await;

    assert!(paginator.complete().get());
    assert!(paginator.items().get().is_empty());
    assert_eq!(paginator.total().get(), 10);
}

#[tokio::test]
async fn failure_sets_error_and_preserves_pagination_then_recovers() {
    let fetcher = CatalogFetcher::new(catalog(16), 5).failing_times(1);
    let calls = fetcher.calls();
    let paginator = Paginator::new(fetcher);

    paginator.load_more().await;

    assert!(paginator.error().get());
    assert!(!paginator.loading().get());
    assert_eq!(paginator.page().get(), 0);
    assert_eq!(paginator.total().get(), 0);
    assert!(paginator.items().get().is_empty());

    // the only recovery path is another explicit call, retrying the same page
    paginator.load_more().await;

    assert!(!paginator.error().get());
    assert_eq!(paginator.page().get(), 1);
    assert_eq!(paginator.items().get().len(), 5);
    assert_eq!(*calls.lock().await, vec![1, 1]);
}

#[tokio::test]
async fn second_caller_waits_without_fetching() {
    let fetcher =
        CatalogFetcher::new(catalog(16), 5).with_delay(Duration::from_millis(50));
    let calls = fetcher.calls();
    let paginator = Paginator::new(fetcher);

    tokio::join!(paginator.load_more(), paginator.load_more());

    assert_eq!(calls.lock().await.len(), 1);
    assert_eq!(paginator.items().get().len(), 5);
    assert!(!paginator.loading().get());
}

#[tokio::test]
async fn placeholders_visible_while_loading_and_replaced_on_success() {
    let paginator = placeholder_paginator(CatalogFetcher::new(catalog(16), 5), 3);
    let mut snapshots = paginator.items().subscribe();

    paginator.load_more().await;

    assert_eq!(snapshots.recv().await, Some(Vec::new()));

    let loading_view = snapshots.recv().await.expect("loading snapshot");
    assert_eq!(loading_view.len(), 3);
    assert!(loading_view.iter().all(|slot| slot.is_none()));

    let settled_view = snapshots.recv().await.expect("settled snapshot");
    assert_eq!(settled_view.len(), 5);
    assert!(settled_view.iter().all(|slot| slot.is_some()));
}

#[tokio::test]
async fn placeholders_stripped_on_failure() {
    let paginator =
        placeholder_paginator(CatalogFetcher::new(catalog(16), 5).failing_times(1), 3);

    paginator.load_more().await;

    assert!(paginator.error().get());
    assert!(paginator.items().get().is_empty());
}

#[tokio::test]
async fn load_on_top_prepends_new_items_only() {
    let served = AtomicUsize::new(0);
    let paginator = Paginator::new(move |_page_number: usize| {
        let call = served.fetch_add(1, Ordering::SeqCst);
        async move {
            let items = if call == 0 {
                vec![note(5), note(6)]
            } else {
                vec![note(4), note(5)]
            };
            anyhow::Ok(Page::wrap(items, 10, 1, 2))
        }
    });

    paginator.load_more().await;
    paginator.load_on_top().await;

    assert_eq!(paginator.items().get(), vec![note(4), note(5), note(6)]);
    assert_eq!(paginator.page().get(), 1);
    assert_eq!(paginator.total().get(), 10);
}

#[tokio::test]
async fn empty_placeholder_paginator_completes_immediately() {
    let paginator = empty_placeholder_paginator::<Note>();

    paginator.load_more().await;

    assert!(paginator.complete().get());
    assert!(paginator.items().get().is_empty());
    assert_eq!(paginator.total().get(), 0);
    assert_eq!(paginator.page().get(), 1);
}
