use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};

use futures::{Stream, StreamExt};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use shared::domain::DEFAULT_PAGE_LIMIT;
use shared::protocol::ListEvent;

use crate::cell::{ReadCell, StateCell};
use crate::fetch::WindowFetcher;
use crate::reconcile::{patch_items, remove_items};
use crate::{
    append_items, option_identity, AfterFetchFn, BeforeFetchFn, Identified, IdentityFn,
    PlaceholderFn,
};

/// Realtime controller whose item slots may still be loading; `None` is the
/// placeholder sentinel.
pub type PlaceholderRealtimeList<T> = RealtimeList<Option<T>, Option<<T as Identified>::Key>>;

/// Paged controller that additionally mirrors a live add/update/delete event
/// stream into the materialized window.
///
/// The fetch cursor is explicit `(limit, offset)`; live events shift the read
/// cursor through `events_count` so the next real fetch neither re-reads nor
/// skips items already accounted for. Events are applied one at a time, in
/// arrival order; a deletion that leaves the window under-filled triggers an
/// awaited single-item backfill before the next event is taken.
///
/// Constructed behind [`Arc`]; dropping the last handle releases the event
/// subscription.
pub struct RealtimeList<T, K> {
    fetcher: Arc<dyn WindowFetcher<T>>,
    before_fetch: BeforeFetchFn<T>,
    after_fetch: AfterFetchFn<T>,
    identity: IdentityFn<T, K>,
    is_placeholder: PlaceholderFn<T>,

    items: Arc<StateCell<Vec<T>>>,
    loading: Arc<StateCell<bool>>,
    init: Arc<StateCell<bool>>,
    error: Arc<StateCell<bool>>,
    complete: Arc<StateCell<bool>>,
    page: Arc<StateCell<usize>>,
    total: Arc<StateCell<usize>>,
    offset: Arc<StateCell<usize>>,
    limit: Arc<StateCell<usize>>,
    events_count: Arc<StateCell<isize>>,

    // serializes read-modify-write sections; never held across a fetch await
    sections: Mutex<()>,
    settled: Notify,
    pump: StdMutex<Option<JoinHandle<()>>>,
}

impl<T, K> RealtimeList<T, K>
where
    T: Clone + Send + Sync + 'static,
    K: PartialEq + Send + Sync + 'static,
{
    pub fn new<S>(
        fetcher: impl WindowFetcher<T> + 'static,
        source: Option<S>,
        limit: usize,
    ) -> Arc<Self>
    where
        T: Identified<Key = K>,
        S: Stream<Item = ListEvent<T, K>> + Send + 'static,
    {
        Self::new_with_identity(fetcher, source, Arc::new(|item: &T| item.identity()), limit)
    }

    pub fn new_with_identity<S>(
        fetcher: impl WindowFetcher<T> + 'static,
        source: Option<S>,
        identity: IdentityFn<T, K>,
        limit: usize,
    ) -> Arc<Self>
    where
        S: Stream<Item = ListEvent<T, K>> + Send + 'static,
    {
        Self::new_with_hooks(
            fetcher,
            source,
            Arc::new(append_items::<T>),
            Arc::new(|items: Vec<T>| items),
            identity,
            Arc::new(|_: &T| false),
            limit,
        )
    }

    pub fn new_with_hooks<S>(
        fetcher: impl WindowFetcher<T> + 'static,
        source: Option<S>,
        after_fetch: AfterFetchFn<T>,
        before_fetch: BeforeFetchFn<T>,
        identity: IdentityFn<T, K>,
        is_placeholder: PlaceholderFn<T>,
        limit: usize,
    ) -> Arc<Self>
    where
        S: Stream<Item = ListEvent<T, K>> + Send + 'static,
    {
        let list = Arc::new(Self {
            fetcher: Arc::new(fetcher),
            before_fetch,
            after_fetch,
            identity,
            is_placeholder,
            items: Arc::new(StateCell::new(Vec::new())),
            loading: Arc::new(StateCell::new(false)),
            init: Arc::new(StateCell::new(false)),
            error: Arc::new(StateCell::new(false)),
            complete: Arc::new(StateCell::new(false)),
            page: Arc::new(StateCell::new(0)),
            total: Arc::new(StateCell::new(0)),
            offset: Arc::new(StateCell::new(0)),
            limit: Arc::new(StateCell::new(limit)),
            events_count: Arc::new(StateCell::new(0)),
            sections: Mutex::new(()),
            settled: Notify::new(),
            pump: StdMutex::new(None),
        });

        if let Some(source) = source {
            let handle = Self::spawn_event_pump(&list, source);
            *list
                .pump
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(handle);
        }

        list
    }

    // One event at a time: the next stream item is not taken until the
    // current handler, including an awaited delete backfill, returns. The
    // pump holds a weak handle so an abandoned controller is released.
    fn spawn_event_pump<S>(list: &Arc<Self>, source: S) -> JoinHandle<()>
    where
        S: Stream<Item = ListEvent<T, K>> + Send + 'static,
    {
        let weak: Weak<Self> = Arc::downgrade(list);
        tokio::spawn(async move {
            tokio::pin!(source);
            while let Some(event) = source.next().await {
                let Some(list) = weak.upgrade() else {
                    break;
                };
                list.apply_event(event).await;
            }
        })
    }

    pub fn items(&self) -> ReadCell<Vec<T>> {
        ReadCell::new(Arc::clone(&self.items))
    }

    pub fn loading(&self) -> ReadCell<bool> {
        ReadCell::new(Arc::clone(&self.loading))
    }

    /// True once at least one load attempt has settled, success or failure.
    pub fn init(&self) -> ReadCell<bool> {
        ReadCell::new(Arc::clone(&self.init))
    }

    pub fn error(&self) -> ReadCell<bool> {
        ReadCell::new(Arc::clone(&self.error))
    }

    pub fn complete(&self) -> ReadCell<bool> {
        ReadCell::new(Arc::clone(&self.complete))
    }

    pub fn page(&self) -> ReadCell<usize> {
        ReadCell::new(Arc::clone(&self.page))
    }

    pub fn total(&self) -> ReadCell<usize> {
        ReadCell::new(Arc::clone(&self.total))
    }

    pub fn offset(&self) -> ReadCell<usize> {
        ReadCell::new(Arc::clone(&self.offset))
    }

    pub fn limit(&self) -> ReadCell<usize> {
        ReadCell::new(Arc::clone(&self.limit))
    }

    /// Net item-count delta accrued from live events since the last natural
    /// forward fetch.
    pub fn events_count(&self) -> ReadCell<isize> {
        ReadCell::new(Arc::clone(&self.events_count))
    }

    /// Fetches the next window and appends the genuinely-new items. A call
    /// made while a fetch is in flight waits for it to settle and returns
    /// without fetching.
    pub async fn load_more(&self) {
        self.load_more_inner(None).await;
    }

    /// Fetches with an explicit limit instead of the configured page size. A
    /// forced load consumes the accrued event delta (`events_count` resets to
    /// 0) instead of advancing the page cursor; the delete branch uses it to
    /// backfill the window.
    pub async fn load_more_with_limit(&self, limit: usize) {
        self.load_more_inner(Some(limit)).await;
    }

    async fn load_more_inner(&self, force_limit: Option<usize>) {
        let settled = self.settled.notified();
        tokio::pin!(settled);
        settled.as_mut().enable();

        let guard = self.sections.lock().await;
        if self.loading.get() {
            drop(guard);
            settled.await;
            return;
        }
        self.loading.set(true);
        self.error.set(false);
        let prior_len = self.items.get().len();
        self.items.set((self.before_fetch)(self.items.get()));
        let limit = force_limit.unwrap_or_else(|| self.limit.get());
        let offset = self
            .offset
            .get()
            .saturating_add_signed(self.events_count.get());
        drop(guard);

        let fetched = self.fetcher.fetch_window(limit, offset).await;

        {
            let _guard = self.sections.lock().await;
            match fetched {
                Ok(window) => {
                    if window.items.is_empty() || prior_len + window.items.len() >= window.total {
                        self.complete.set(true);
                    }
                    self.total.set(window.total);

                    let current = self.items.get();
                    let fresh = patch_items(&current, window.items, &*self.identity);

                    if force_limit.is_none() {
                        self.page.set(self.page.get() + 1);
                        self.offset.set(self.offset.get() + self.limit.get());
                    } else {
                        self.events_count.set(0);
                    }

                    let merged = (self.after_fetch)(current, fresh);
                    debug!(limit, offset, items = merged.len(), "window merged");
                    self.items.set(merged);
                }
                Err(err) => {
                    warn!(limit, offset, error = %err, "window fetch failed");
                    self.strip_placeholders();
                    self.error.set(true);
                }
            }
            self.loading.set(false);
            self.init.set(true);
        }
        self.settled.notify_waiters();
    }

    /// Applies one live event to the materialized window.
    ///
    /// The spawned pump calls this for each stream item in arrival order; it
    /// is public as the injection path when no stream is wired at
    /// construction.
    pub async fn apply_event(&self, event: ListEvent<T, K>) {
        match event {
            ListEvent::Add { item, .. } => self.apply_add(item).await,
            ListEvent::Update { item, .. } => self.apply_update(item).await,
            ListEvent::Delete { item_key } => self.apply_delete(item_key).await,
        }
    }

    async fn apply_add(&self, item: T) {
        let _guard = self.sections.lock().await;
        let current = self.items.get();
        let current_len = current.len();
        let fresh = patch_items(&current, vec![item.clone()], &*self.identity);
        let merged = (self.after_fetch)(current, fresh);
        if merged.len() == current_len {
            // identity already present
            return;
        }

        let window = self.page.get() * self.limit.get();
        let overflows = merged.len() > window;
        let added_at_tail = merged
            .last()
            .map(|last| (self.identity)(last) == (self.identity)(&item))
            .unwrap_or(false);

        self.total.set(self.total.get() + 1);

        if !self.complete.get() && added_at_tail {
            // the item sits past the materialized window: recorded in the
            // total only, a later real fetch surfaces it
            return;
        }

        if overflows {
            // a page boundary was crossed; force a future real fetch
            self.events_count.set(0);
            self.complete.set(false);
        } else {
            self.events_count.set(self.events_count.get() + 1);
        }

        let mut merged = merged;
        merged.truncate(window);
        self.items.set(merged);
    }

    async fn apply_update(&self, item: T) {
        let _guard = self.sections.lock().await;
        let mut found = false;
        let merged: Vec<T> = self
            .items
            .get()
            .into_iter()
            .map(|existing| {
                if (self.identity)(&existing) == (self.identity)(&item) {
                    found = true;
                    item.clone()
                } else {
                    existing
                }
            })
            .collect();

        let appended = if found { Vec::new() } else { vec![item] };
        let mut updated = (self.after_fetch)(merged, appended);
        updated.truncate(self.page.get() * self.limit.get());
        self.items.set(updated);
    }

    async fn apply_delete(&self, item_key: K) {
        let backfill = {
            let _guard = self.sections.lock().await;
            let current = self.items.get();
            let prior_len = current.len();
            let remaining = remove_items(current, &item_key, &*self.identity);
            let remaining_len = remaining.len();
            self.items.set(remaining);
            let removed = prior_len - remaining_len;
            self.total.set(self.total.get().saturating_sub(removed));

            if remaining_len < self.page.get() * self.limit.get() {
                self.events_count.set(self.events_count.get() - 1);
                true
            } else {
                false
            }
        };

        if backfill {
            debug!("window under-filled after delete, backfilling one item");
            // retrieves a replacement item, if one is available
            self.load_more_with_limit(1).await;
        }
    }

    fn strip_placeholders(&self) {
        let kept: Vec<T> = self
            .items
            .get()
            .into_iter()
            .filter(|item| !(self.is_placeholder)(item))
            .collect();
        self.items.set(kept);
    }
}

impl<T, K> Drop for RealtimeList<T, K> {
    fn drop(&mut self) {
        if let Some(pump) = self
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            pump.abort();
        }
    }
}

/// Wraps a windowed source and its event stream with placeholder handling.
/// `limit` usually equals `placeholder_len`; pass them separately when the
/// loading affordance and page size differ.
pub fn placeholder_realtime_list<T, S>(
    fetcher: impl WindowFetcher<T> + 'static,
    source: Option<S>,
    placeholder_len: usize,
    limit: usize,
) -> Arc<PlaceholderRealtimeList<T>>
where
    T: Identified + Clone + Send + Sync + 'static,
    S: Stream<Item = ListEvent<T, T::Key>> + Send + 'static,
{
    let fetcher = Arc::new(fetcher);
    let adapted = move |limit: usize, offset: usize| {
        let fetcher = Arc::clone(&fetcher);
        async move {
            let window = fetcher.fetch_window(limit, offset).await?;
            anyhow::Ok(window.map_items(Some))
        }
    };

    let source = source.map(|stream| {
        stream.map(|event| match event {
            ListEvent::Add { item_key, item } => ListEvent::Add {
                item_key: Some(item_key),
                item: Some(item),
            },
            ListEvent::Update { item_key, item } => ListEvent::Update {
                item_key: Some(item_key),
                item: Some(item),
            },
            ListEvent::Delete { item_key } => ListEvent::Delete {
                item_key: Some(item_key),
            },
        })
    });

    RealtimeList::new_with_hooks(
        adapted,
        source,
        Arc::new(|old: Vec<Option<T>>, new: Vec<Option<T>>| {
            let mut kept: Vec<Option<T>> = old.into_iter().filter(|item| item.is_some()).collect();
            kept.extend(new);
            kept
        }),
        Arc::new(move |mut items: Vec<Option<T>>| {
            items.extend(std::iter::repeat_with(|| None).take(placeholder_len));
            items
        }),
        Arc::new(option_identity::<T>),
        Arc::new(|item: &Option<T>| item.is_none()),
        limit,
    )
}

/// Placeholder realtime list with the default run length and page size.
pub fn placeholder_realtime_list_default<T, S>(
    fetcher: impl WindowFetcher<T> + 'static,
    source: Option<S>,
) -> Arc<PlaceholderRealtimeList<T>>
where
    T: Identified + Clone + Send + Sync + 'static,
    S: Stream<Item = ListEvent<T, T::Key>> + Send + 'static,
{
    placeholder_realtime_list(fetcher, source, DEFAULT_PAGE_LIMIT, DEFAULT_PAGE_LIMIT)
}

#[cfg(test)]
#[path = "tests/realtime_tests.rs"]
mod tests;
