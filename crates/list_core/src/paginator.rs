use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

use shared::domain::{Page, DEFAULT_PAGE_LIMIT};

use crate::cell::{ReadCell, StateCell};
use crate::fetch::PageFetcher;
use crate::reconcile::patch_items;
use crate::{
    append_items, option_identity, AfterFetchFn, BeforeFetchFn, Identified, IdentityFn,
    PlaceholderFn,
};

/// Paged controller whose item slots may still be loading; `None` is the
/// placeholder sentinel.
pub type PlaceholderPaginator<T> = Paginator<Option<T>, Option<<T as Identified>::Key>>;

/// Sequential page-by-page fetch-and-append controller.
///
/// One instance owns one ordered list scoped to one query. Outputs are state
/// cells only: read them synchronously or subscribe for ordered change
/// notifications. At most one fetch is in flight at a time; a second caller
/// waits for the in-flight fetch to settle and returns without fetching.
pub struct Paginator<T, K> {
    fetcher: Arc<dyn PageFetcher<T>>,
    before_fetch: BeforeFetchFn<T>,
    after_fetch: AfterFetchFn<T>,
    identity: IdentityFn<T, K>,
    is_placeholder: PlaceholderFn<T>,

    items: Arc<StateCell<Vec<T>>>,
    loading: Arc<StateCell<bool>>,
    error: Arc<StateCell<bool>>,
    complete: Arc<StateCell<bool>>,
    page: Arc<StateCell<usize>>,
    total: Arc<StateCell<usize>>,

    // serializes read-modify-write sections; never held across a fetch await
    sections: Mutex<()>,
    settled: Notify,
}

impl<T, K> Paginator<T, K>
where
    T: Clone + Send + Sync + 'static,
    K: PartialEq + Send + Sync + 'static,
{
    pub fn new(fetcher: impl PageFetcher<T> + 'static) -> Self
    where
        T: Identified<Key = K>,
    {
        Self::new_with_identity(fetcher, Arc::new(|item: &T| item.identity()))
    }

    pub fn new_with_identity(
        fetcher: impl PageFetcher<T> + 'static,
        identity: IdentityFn<T, K>,
    ) -> Self {
        Self::new_with_hooks(
            fetcher,
            Arc::new(|items: Vec<T>| items),
            Arc::new(append_items::<T>),
            identity,
            Arc::new(|_: &T| false),
        )
    }

    pub fn new_with_hooks(
        fetcher: impl PageFetcher<T> + 'static,
        before_fetch: BeforeFetchFn<T>,
        after_fetch: AfterFetchFn<T>,
        identity: IdentityFn<T, K>,
        is_placeholder: PlaceholderFn<T>,
    ) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            before_fetch,
            after_fetch,
            identity,
            is_placeholder,
            items: Arc::new(StateCell::new(Vec::new())),
            loading: Arc::new(StateCell::new(false)),
            error: Arc::new(StateCell::new(false)),
            complete: Arc::new(StateCell::new(false)),
            page: Arc::new(StateCell::new(0)),
            total: Arc::new(StateCell::new(0)),
            sections: Mutex::new(()),
            settled: Notify::new(),
        }
    }

    pub fn items(&self) -> ReadCell<Vec<T>> {
        ReadCell::new(Arc::clone(&self.items))
    }

    pub fn loading(&self) -> ReadCell<bool> {
        ReadCell::new(Arc::clone(&self.loading))
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

    /// Fetches the next page and appends the genuinely-new items.
    ///
    /// Fetch failures never propagate to the caller; they surface through the
    /// `error` cell, and any placeholder sentinels inserted for the failed
    /// attempt are stripped.
    pub async fn load_more(&self) {
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
        let page_number = self.page.get() + 1;
        drop(guard);

        let fetched = self.fetcher.fetch_page(page_number).await;

        {
            let _guard = self.sections.lock().await;
            match fetched {
                Ok(page) => self.merge_fetched(prior_len, page),
                Err(err) => {
                    warn!(page = page_number, error = %err, "page fetch failed");
                    self.strip_placeholders();
                    self.error.set(true);
                }
            }
            self.loading.set(false);
        }
        self.settled.notify_waiters();
    }

    /// Fetches page 1 and prepends the items not already present. Leaves
    /// `page`, `complete`, and placeholders untouched.
    pub async fn load_on_top(&self) {
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
        drop(guard);

        let fetched = self.fetcher.fetch_page(1).await;

        {
            let _guard = self.sections.lock().await;
            match fetched {
                Ok(page) => {
                    self.total.set(page.total);
                    let current = self.items.get();
                    let mut fresh = patch_items(&current, page.items, &*self.identity);
                    fresh.extend(current);
                    self.items.set(fresh);
                }
                Err(err) => {
                    warn!(error = %err, "top-of-list fetch failed");
                    self.error.set(true);
                }
            }
            self.loading.set(false);
        }
        self.settled.notify_waiters();
    }

    fn merge_fetched(&self, prior_len: usize, page: Page<T>) {
        if page.items.is_empty() || prior_len + page.items.len() >= page.total {
            self.complete.set(true);
        }
        self.total.set(page.total);

        let current = self.items.get();
        let fresh = patch_items(&current, page.items, &*self.identity);
        self.page.set(self.page.get() + 1);
        let merged = (self.after_fetch)(current, fresh);
        debug!(
            page = self.page.get(),
            items = merged.len(),
            "page merged"
        );
        self.items.set(merged);
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

/// Controller whose source always reports an empty, already-complete list.
/// Useful as a stand-in while the real query is not yet known.
pub fn empty_placeholder_paginator<T>() -> PlaceholderPaginator<T>
where
    T: Identified + Clone + Send + Sync + 'static,
{
    Paginator::new_with_identity(
        |_page_number: usize| async { anyhow::Ok(Page::<Option<T>>::empty()) },
        Arc::new(option_identity::<T>),
    )
}

/// Wraps a real page source with placeholder handling: `placeholder_len`
/// sentinels are appended while a fetch is in flight, then stripped and
/// replaced by the fetched items. A failed fetch restores the previous real
/// items.
pub fn placeholder_paginator<T>(
    fetcher: impl PageFetcher<T> + 'static,
    placeholder_len: usize,
) -> PlaceholderPaginator<T>
where
    T: Identified + Clone + Send + Sync + 'static,
{
    let fetcher = Arc::new(fetcher);
    let adapted = move |page_number: usize| {
        let fetcher = Arc::clone(&fetcher);
        async move {
            let page = fetcher.fetch_page(page_number).await?;
            anyhow::Ok(page.map_items(Some))
        }
    };

    Paginator::new_with_hooks(
        adapted,
        Arc::new(move |mut items: Vec<Option<T>>| {
            items.extend(std::iter::repeat_with(|| None).take(placeholder_len));
            items
        }),
        Arc::new(|old: Vec<Option<T>>, new: Vec<Option<T>>| {
            let mut kept: Vec<Option<T>> = old.into_iter().filter(|item| item.is_some()).collect();
            kept.extend(new);
            kept
        }),
        Arc::new(option_identity::<T>),
        Arc::new(|item: &Option<T>| item.is_none()),
    )
}

/// Placeholder paginator with the default run length.
pub fn placeholder_paginator_default<T>(
    fetcher: impl PageFetcher<T> + 'static,
) -> PlaceholderPaginator<T>
where
    T: Identified + Clone + Send + Sync + 'static,
{
    placeholder_paginator(fetcher, DEFAULT_PAGE_LIMIT)
}

#[cfg(test)]
#[path = "tests/paginator_tests.rs"]
mod tests;
