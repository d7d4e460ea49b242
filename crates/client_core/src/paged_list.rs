use std::{
    future::Future,
    ops::Deref,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock},
    time::Duration,
};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    cancel::CancellationToken,
    normalize::{decode_list_response, ListPage},
    pagination::{total_pages, PageSummary},
};

pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
    pub cancellation: CancellationToken,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, request: PageRequest) -> anyhow::Result<Value>;
}

#[async_trait]
impl<F, Fut> PageFetcher for F
where
    F: Fn(PageRequest) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn fetch_page(&self, request: PageRequest) -> anyhow::Result<Value> {
        (self)(request).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorContext {
    pub page: u32,
}

/// Receives genuine load failures of the current load. Called before the
/// first-page fallback is applied and never with the state lock held.
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &PagedListError, context: ErrorContext);
}

impl<F> ErrorSink for F
where
    F: Fn(&PagedListError, ErrorContext) + Send + Sync,
{
    fn report(&self, error: &PagedListError, context: ErrorContext) {
        (self)(error, context)
    }
}

#[derive(Debug, Error)]
pub enum PagedListError {
    #[error("failed to fetch page {page}: {source}")]
    Fetch { page: u32, source: anyhow::Error },
    #[error("failed to decode page {page}: {source}")]
    Decode {
        page: u32,
        source: serde_json::Error,
    },
}

impl PagedListError {
    pub fn page(&self) -> u32 {
        match self {
            Self::Fetch { page, .. } | Self::Decode { page, .. } => *page,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// A newer load started before this one finished.
    Superseded,
    TimedOut,
    /// The fetch cancelled its own token.
    Aborted,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome<T> {
    Loaded(ListPage<T>),
    Cancelled(CancelReason),
}

impl<T> LoadOutcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    pub fn into_page(self) -> Option<ListPage<T>> {
        match self {
            Self::Loaded(page) => Some(page),
            Self::Cancelled(_) => None,
        }
    }
}

/// Client-side view of one page of a remote list.
#[derive(Debug, Clone, PartialEq)]
pub struct PageState<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub total_items: u64,
    pub is_loading: bool,
    pub page_size: u32,
}

impl<T> PageState<T> {
    pub fn total_pages(&self) -> u32 {
        total_pages(self.total_items, self.page_size)
    }

    pub fn summary(&self) -> PageSummary {
        PageSummary::new(self.current_page, self.total_items, self.page_size)
    }
}

struct ControllerState<T> {
    view: PageState<T>,
    fallback: Vec<T>,
    generation: u64,
    active: Option<CancellationToken>,
    closed: bool,
}

impl<T> ControllerState<T> {
    fn is_current(&self, generation: u64) -> bool {
        !self.closed && self.generation == generation
    }

    fn stale_reason(&self) -> CancelReason {
        if self.closed {
            CancelReason::Closed
        } else {
            CancelReason::Superseded
        }
    }

    fn settle(&mut self) {
        self.view.is_loading = false;
        self.active = None;
    }
}

enum FetchStep {
    Done(anyhow::Result<Value>),
    Cancelled,
    TimedOut,
}

pub struct PagedListBuilder<T> {
    page_size: u32,
    fallback: Vec<T>,
    fetcher: Arc<dyn PageFetcher>,
    error_sink: Option<Arc<dyn ErrorSink>>,
    timeout: Option<Duration>,
}

impl<T> PagedListBuilder<T>
where
    T: Clone + DeserializeOwned + Send + Sync + 'static,
{
    pub fn fallback(mut self, fallback: Vec<T>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn error_sink(mut self, sink: impl ErrorSink + 'static) -> Self {
        self.error_sink = Some(Arc::new(sink));
        self
    }

    /// Default timeout for [`PagedListController::load`]; `None` or zero
    /// disables it.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Arc<PagedListController<T>> {
        Arc::new(PagedListController {
            page_size: self.page_size,
            default_timeout: self.timeout,
            fetcher: RwLock::new(self.fetcher),
            error_sink: RwLock::new(self.error_sink),
            state: Mutex::new(ControllerState {
                view: PageState {
                    items: Vec::new(),
                    current_page: 1,
                    total_items: 0,
                    is_loading: false,
                    page_size: self.page_size,
                },
                fallback: self.fallback,
                generation: 0,
                active: None,
                closed: false,
            }),
        })
    }

    /// Builds the controller and immediately loads page 1 in the background.
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> PagedList<T> {
        let controller = self.build();
        let initial = Arc::clone(&controller);
        let initial_load = tokio::spawn(async move {
            // Failures already reach the error sink.
            let _ = initial.load(1).await;
        });
        PagedList {
            controller,
            initial_load: Some(initial_load),
        }
    }
}

/// Race-free, cancellable view of the current page of a remote list. Only the
/// most recently started [`load`](Self::load) may change the state.
pub struct PagedListController<T> {
    page_size: u32,
    default_timeout: Option<Duration>,
    fetcher: RwLock<Arc<dyn PageFetcher>>,
    error_sink: RwLock<Option<Arc<dyn ErrorSink>>>,
    state: Mutex<ControllerState<T>>,
}

impl<T> PagedListController<T>
where
    T: Clone + DeserializeOwned + Send + Sync + 'static,
{
    pub fn builder(page_size: u32, fetcher: impl PageFetcher + 'static) -> PagedListBuilder<T> {
        PagedListBuilder {
            page_size: page_size.max(1),
            fallback: Vec::new(),
            fetcher: Arc::new(fetcher),
            error_sink: None,
            timeout: Some(DEFAULT_LOAD_TIMEOUT),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn state(&self) -> PageState<T> {
        self.lock_state().view.clone()
    }

    pub fn items(&self) -> Vec<T> {
        self.lock_state().view.items.clone()
    }

    pub fn current_page(&self) -> u32 {
        self.lock_state().view.current_page
    }

    pub fn total_items(&self) -> u64 {
        self.lock_state().view.total_items
    }

    pub fn total_pages(&self) -> u32 {
        self.lock_state().view.total_pages()
    }

    pub fn is_loading(&self) -> bool {
        self.lock_state().view.is_loading
    }

    pub fn is_closed(&self) -> bool {
        self.lock_state().closed
    }

    /// Replaces the fetch function used by subsequent loads.
    pub fn set_fetcher(&self, fetcher: impl PageFetcher + 'static) {
        *self.fetcher.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(fetcher);
    }

    pub fn set_error_sink(&self, sink: Option<Arc<dyn ErrorSink>>) {
        *self
            .error_sink
            .write()
            .unwrap_or_else(PoisonError::into_inner) = sink;
    }

    pub fn set_fallback(&self, fallback: Vec<T>) {
        self.lock_state().fallback = fallback;
    }

    pub async fn load(&self, page: u32) -> Result<LoadOutcome<T>, PagedListError> {
        self.load_with_timeout(page, self.default_timeout).await
    }

    /// Loads `page`, cancelling whatever load was in flight. Cancellation
    /// (supersession, timeout, teardown) resolves to `Ok(Cancelled(_))`
    /// without touching the state or the error sink.
    pub async fn load_with_timeout(
        &self,
        page: u32,
        timeout: Option<Duration>,
    ) -> Result<LoadOutcome<T>, PagedListError> {
        let Some((generation, token)) = self.begin(page) else {
            debug!(page, "paged list: load skipped on closed controller");
            return Ok(LoadOutcome::Cancelled(CancelReason::Closed));
        };

        let fetcher = Arc::clone(&*self.fetcher.read().unwrap_or_else(PoisonError::into_inner));
        let request = PageRequest {
            page,
            page_size: self.page_size,
            cancellation: token.clone(),
        };
        let guarded = token.run_until_cancelled(fetcher.fetch_page(request));

        let step = match timeout.filter(|limit| !limit.is_zero()) {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(Some(result)) => FetchStep::Done(result),
                Ok(None) => FetchStep::Cancelled,
                Err(_) => {
                    token.cancel();
                    FetchStep::TimedOut
                }
            },
            None => match guarded.await {
                Some(result) => FetchStep::Done(result),
                None => FetchStep::Cancelled,
            },
        };

        let result = match step {
            FetchStep::Done(result) if !token.is_cancelled() => result,
            FetchStep::Done(_) | FetchStep::Cancelled => {
                return Ok(LoadOutcome::Cancelled(self.finish_cancelled(
                    generation,
                    page,
                    CancelReason::Aborted,
                )));
            }
            FetchStep::TimedOut => {
                return Ok(LoadOutcome::Cancelled(self.finish_cancelled(
                    generation,
                    page,
                    CancelReason::TimedOut,
                )));
            }
        };

        let decoded = match result {
            Ok(payload) => {
                let fallback = self.lock_state().fallback.clone();
                decode_list_response(&payload, &fallback)
                    .map_err(|source| PagedListError::Decode { page, source })
            }
            Err(source) => Err(PagedListError::Fetch { page, source }),
        };

        match decoded {
            Ok(list) => Ok(self.apply_success(generation, page, list)),
            Err(error) => self.apply_failure(generation, page, error),
        }
    }

    /// Cancels any in-flight load and rejects later ones. Idempotent.
    pub fn close(&self) {
        let mut state = self.lock_state();
        if state.closed {
            return;
        }
        state.closed = true;
        state.generation += 1;
        if let Some(token) = state.active.take() {
            token.cancel();
        }
        state.view.is_loading = false;
        debug!(generation = state.generation, "paged list: closed");
    }

    fn lock_state(&self) -> MutexGuard<'_, ControllerState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, page: u32) -> Option<(u64, CancellationToken)> {
        let mut state = self.lock_state();
        if state.closed {
            return None;
        }
        state.generation += 1;
        let token = CancellationToken::new();
        if let Some(previous) = state.active.replace(token.clone()) {
            previous.cancel();
        }
        state.view.is_loading = true;
        debug!(
            page,
            page_size = self.page_size,
            generation = state.generation,
            "paged list: load started"
        );
        Some((state.generation, token))
    }

    /// `current_reason` applies only when the load is still the active one,
    /// i.e. it was not superseded or closed.
    fn finish_cancelled(
        &self,
        generation: u64,
        page: u32,
        current_reason: CancelReason,
    ) -> CancelReason {
        let mut state = self.lock_state();
        let reason = if state.is_current(generation) {
            state.settle();
            current_reason
        } else {
            state.stale_reason()
        };
        debug!(page, generation, ?reason, "paged list: load cancelled");
        reason
    }

    fn apply_success(&self, generation: u64, page: u32, list: ListPage<T>) -> LoadOutcome<T> {
        let mut state = self.lock_state();
        if !state.is_current(generation) {
            let reason = state.stale_reason();
            debug!(page, generation, ?reason, "paged list: discarded stale result");
            return LoadOutcome::Cancelled(reason);
        }

        state.view.items = list.items.clone();
        state.view.total_items = list.total;
        state.view.current_page = page;
        state.settle();
        debug!(
            page,
            generation,
            items = list.items.len(),
            total = list.total,
            "paged list: page loaded"
        );
        LoadOutcome::Loaded(list)
    }

    /// Reports a failure of the current load, then repairs an empty first page
    /// with the fallback. The sink runs without the state lock held and sees
    /// the state as it was before the repair.
    fn apply_failure(
        &self,
        generation: u64,
        page: u32,
        error: PagedListError,
    ) -> Result<LoadOutcome<T>, PagedListError> {
        {
            let state = self.lock_state();
            if !state.is_current(generation) {
                let reason = state.stale_reason();
                debug!(page, generation, ?reason, "paged list: discarded stale failure");
                return Ok(LoadOutcome::Cancelled(reason));
            }
        }

        warn!(page, generation, %error, "paged list: load failed");
        let sink = self
            .error_sink
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(sink) = sink {
            sink.report(&error, ErrorContext { page });
        }

        let mut state = self.lock_state();
        if !state.is_current(generation) {
            return Err(error);
        }
        state.settle();
        if page == 1 && state.view.items.is_empty() && !state.fallback.is_empty() {
            state.view.items = state.fallback.clone();
            state.view.total_items = state.fallback.len() as u64;
            state.view.current_page = 1;
            warn!(
                page,
                fallback_items = state.fallback.len(),
                "paged list: first page failed; showing local fallback data"
            );
        }
        Err(error)
    }
}

/// Owning handle for a started controller; dropping it tears the controller
/// down so no in-flight load can touch the state afterwards.
pub struct PagedList<T>
where
    T: Clone + DeserializeOwned + Send + Sync + 'static,
{
    controller: Arc<PagedListController<T>>,
    initial_load: Option<JoinHandle<()>>,
}

impl<T> PagedList<T>
where
    T: Clone + DeserializeOwned + Send + Sync + 'static,
{
    pub fn controller(&self) -> Arc<PagedListController<T>> {
        Arc::clone(&self.controller)
    }

    /// Waits for the page-1 load kicked off by [`PagedListBuilder::start`].
    pub async fn initial_load_settled(&mut self) {
        if let Some(task) = self.initial_load.take() {
            let _ = task.await;
        }
    }
}

impl<T> Deref for PagedList<T>
where
    T: Clone + DeserializeOwned + Send + Sync + 'static,
{
    type Target = PagedListController<T>;

    fn deref(&self) -> &Self::Target {
        &self.controller
    }
}

impl<T> Drop for PagedList<T>
where
    T: Clone + DeserializeOwned + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.controller.close();
    }
}

#[cfg(test)]
#[path = "tests/paged_list_tests.rs"]
mod tests;
