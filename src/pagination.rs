//! # Paginated Loading
//!
//! Page-counter loader for infinite lists. Pages are appended on
//! `load_more` and replaced on `refresh`; the counter only moves forward
//! after a successful fetch, so a failed page is requested again next time.

use crate::shared::{Result, SyncError};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

#[derive(Debug)]
struct State<T> {
    items: Vec<T>,
    next_page: u32,
    has_more: bool,
    loading: bool,
    refreshing: bool,
    last_error: Option<SyncError>,
}

/// Accumulates pages fetched by the caller
#[derive(Debug)]
pub struct Paginator<T> {
    initial_page: u32,
    state: Mutex<State<T>>,
}

/// Clears the loading flags even if the fetch future is dropped
struct LoadingFlags<'a, T> {
    state: &'a Mutex<State<T>>,
}

impl<T> Drop for LoadingFlags<'_, T> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.loading = false;
        state.refreshing = false;
    }
}

impl<T: Clone> Paginator<T> {
    pub fn new(initial_page: u32) -> Self {
        Self {
            initial_page,
            state: Mutex::new(State {
                items: Vec::new(),
                next_page: initial_page,
                has_more: true,
                loading: false,
                refreshing: false,
                last_error: None,
            }),
        }
    }

    /// Fetch the next page and append it
    ///
    /// Returns `Ok(false)` without calling `fetch` when a load is already
    /// running or the last page said there is nothing more.
    pub async fn load_more<F, Fut>(&self, fetch: F) -> Result<bool>
    where
        F: FnOnce(u32) -> Fut,
        Fut: Future<Output = Result<Page<T>>>,
    {
        let page = {
            let mut state = self.lock();
            if state.loading || !state.has_more {
                return Ok(false);
            }
            state.loading = true;
            state.last_error = None;
            state.next_page
        };

        self.load(page, false, fetch).await
    }

    /// Start over from the initial page, replacing every item
    ///
    /// Returns `Ok(false)` when a load is already running.
    pub async fn refresh<F, Fut>(&self, fetch: F) -> Result<bool>
    where
        F: FnOnce(u32) -> Fut,
        Fut: Future<Output = Result<Page<T>>>,
    {
        {
            let mut state = self.lock();
            if state.loading {
                return Ok(false);
            }
            state.loading = true;
            state.refreshing = true;
            state.last_error = None;
        }

        self.load(self.initial_page, true, fetch).await
    }

    async fn load<F, Fut>(&self, page: u32, replace: bool, fetch: F) -> Result<bool>
    where
        F: FnOnce(u32) -> Fut,
        Fut: Future<Output = Result<Page<T>>>,
    {
        let _flags = LoadingFlags { state: &self.state };
        let result = fetch(page).await;

        let mut state = self.lock();
        match result {
            Ok(fetched) => {
                if replace {
                    state.items = fetched.items;
                } else {
                    state.items.extend(fetched.items);
                }
                state.has_more = fetched.has_more;
                state.next_page = page.saturating_add(1);
                tracing::debug!(page, items = state.items.len(), "loaded page");
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(page, error = %e, "page fetch failed");
                state.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Every item loaded so far
    pub fn items(&self) -> Vec<T> {
        self.lock().items.clone()
    }

    pub fn has_more(&self) -> bool {
        self.lock().has_more
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    pub fn last_error(&self) -> Option<SyncError> {
        self.lock().last_error.clone()
    }

    /// Page number the next `load_more` will request
    pub fn next_page(&self) -> u32 {
        self.lock().next_page
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
