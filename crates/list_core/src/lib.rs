//! Reconciliation engines behind paged and realtime list views.
//!
//! Two controllers maintain a locally cached, ordered window over a remote,
//! offset-paginated source. [`Paginator`] fetches page by page and appends;
//! [`RealtimeList`] additionally consumes a live add/update/delete event
//! stream and reconciles it against the paginated window, backfilling after
//! deletions. Each controller instance owns exactly one ordered list scoped
//! to one query and publishes its state exclusively through [`ReadCell`]
//! handles.

use std::sync::Arc;

pub mod cell;
pub mod fetch;
pub mod reconcile;

mod paginator;
mod realtime;

pub use cell::{ReadCell, StateCell};
pub use paginator::{
    empty_placeholder_paginator, placeholder_paginator, placeholder_paginator_default, Paginator,
    PlaceholderPaginator,
};
pub use realtime::{
    placeholder_realtime_list, placeholder_realtime_list_default, PlaceholderRealtimeList,
    RealtimeList,
};

/// Transform applied to the current items immediately before a fetch is
/// issued (e.g. placeholder insertion). The result is published as-is.
pub type BeforeFetchFn<T> = Arc<dyn Fn(Vec<T>) -> Vec<T> + Send + Sync>;

/// Merge strategy combining the current items with the deduplicated fetched
/// items. The default appends.
pub type AfterFetchFn<T> = Arc<dyn Fn(Vec<T>, Vec<T>) -> Vec<T> + Send + Sync>;

/// Maps an item to its stable identity key.
pub type IdentityFn<T, K> = Arc<dyn Fn(&T) -> K + Send + Sync>;

/// Recognizes placeholder sentinels so a failed fetch can strip them.
pub type PlaceholderFn<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Stable identity used to deduplicate and match items across fetches and
/// live events.
///
/// The key must be stable for the same logical item and must not collide
/// across distinct items. Types without a natural key can use themselves as
/// the key; the integer and `String` impls below do exactly that.
pub trait Identified {
    type Key: PartialEq + Send + Sync + 'static;

    fn identity(&self) -> Self::Key;
}

macro_rules! self_identified {
    ($($ty:ty),*) => {
        $(
            impl Identified for $ty {
                type Key = $ty;

                fn identity(&self) -> $ty {
                    *self
                }
            }
        )*
    };
}

self_identified!(i32, i64, u32, u64, usize);

impl Identified for String {
    type Key = String;

    fn identity(&self) -> String {
        self.clone()
    }
}

pub(crate) fn append_items<T>(mut old: Vec<T>, new: Vec<T>) -> Vec<T> {
    old.extend(new);
    old
}

pub(crate) fn option_identity<T: Identified>(item: &Option<T>) -> Option<T::Key> {
    item.as_ref().map(Identified::identity)
}
