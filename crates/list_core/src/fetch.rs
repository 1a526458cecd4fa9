use anyhow::Result;
use async_trait::async_trait;
use futures::Future;
use shared::domain::Page;

/// Sequential page source. `page_number` is 1-based; the page size is
/// implicit in the source's own configuration.
///
/// Any error is treated opaquely as "fetch failed" by the controllers.
#[async_trait]
pub trait PageFetcher<T>: Send + Sync {
    async fn fetch_page(&self, page_number: usize) -> Result<Page<T>>;
}

/// Windowed source addressed by an explicit `(limit, offset)` cursor.
#[async_trait]
pub trait WindowFetcher<T>: Send + Sync {
    async fn fetch_window(&self, limit: usize, offset: usize) -> Result<Page<T>>;
}

#[async_trait]
impl<T, F, Fut> PageFetcher<T> for F
where
    F: Fn(usize) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Page<T>>> + Send + 'static,
    T: 'static,
{
    async fn fetch_page(&self, page_number: usize) -> Result<Page<T>> {
        self(page_number).await
    }
}

#[async_trait]
impl<T, F, Fut> WindowFetcher<T> for F
where
    F: Fn(usize, usize) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Page<T>>> + Send + 'static,
    T: 'static,
{
    async fn fetch_window(&self, limit: usize, offset: usize) -> Result<Page<T>> {
        self(limit, offset).await
    }
}
