//! Config service: the single source of the current [`Entry`].
//!
//! The service reconciles the in-memory entry, the persistent cache and the CDN. At most one
//! fetch is in flight at any time; callers that need fresh data while a fetch is running wait
//! for that fetch instead of starting another one.
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak,
    },
};

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::{
    cache::{cache_key, ConfigCache},
    entry::Entry,
    fetcher::{ConfigFetcher, FetchResponse},
    hooks::Hooks,
    model::Config,
    poller::PollerThread,
    polling::PollingMode,
    Result,
};

const OFFLINE_REFRESH_WARNING: &str = "Client is in offline mode, it cannot initiate HTTP calls.";

/// Result of [`Client::refresh`](crate::Client::refresh).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshResult {
    /// Whether config JSON was fetched or confirmed unchanged.
    pub success: bool,
    /// Reason of the failure.
    pub error: Option<String>,
}

impl RefreshResult {
    fn failure(error: impl Into<String>) -> RefreshResult {
        RefreshResult {
            success: false,
            error: Some(error.into()),
        }
    }
}

pub(crate) struct ConfigServiceConfig {
    pub sdk_key: String,
    pub polling_mode: PollingMode,
    pub offline: bool,
    pub cache: Arc<dyn ConfigCache>,
    pub fetcher: Arc<dyn ConfigFetcher>,
    pub hooks: Arc<Hooks>,
}

pub(crate) struct ConfigService {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    closed: AtomicBool,
    cache: Arc<dyn ConfigCache>,
    cache_key: String,
    fetcher: Arc<dyn ConfigFetcher>,
    polling_mode: PollingMode,
    hooks: Arc<Hooks>,
}

struct State {
    entry: Arc<Entry>,
    /// Last value read from or written to the cache. An identical cache value is not parsed
    /// again.
    cached_entry_string: String,
    initialized: bool,
    offline: bool,
    in_flight: Option<Arc<PendingFetch>>,
    /// Auto polling readers wait on this until the service is initialized. They never start a
    /// fetch themselves.
    initial_fetch: Option<Arc<PendingFetch>>,
    poller: Option<PollerThread>,
    init_timer: Option<PollerThread>,
}

/// Outcome of a fetch, shared by every caller waiting for it.
#[derive(Debug, Clone)]
struct FetchOutcome {
    entry: Arc<Entry>,
    error: Option<String>,
}

/// Holds `None` until the fetch completes. The first completion wins.
#[derive(Default)]
struct PendingFetch {
    outcome: Mutex<Option<FetchOutcome>>,
    ready: Condvar,
}

impl PendingFetch {
    fn complete(&self, outcome: FetchOutcome) {
        let mut slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(outcome);
            self.ready.notify_all();
        }
    }

    fn wait(&self) -> FetchOutcome {
        let mut slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(outcome) = &*slot {
                return outcome.clone();
            }
            slot = self
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Hook invocations collected while the state lock is held and fired after it is released.
#[derive(Default)]
struct Notifications {
    client_ready: bool,
    config_changed: Option<Arc<Config>>,
    errors: Vec<String>,
}

impl Notifications {
    fn fire(self, hooks: &Hooks) {
        if self.client_ready {
            hooks.client_ready();
        }
        if let Some(config) = self.config_changed {
            hooks.config_changed(&config);
        }
        for error in self.errors {
            hooks.error(&error);
        }
    }
}

impl ConfigService {
    pub fn new(config: ConfigServiceConfig) -> Result<ConfigService> {
        let auto_polling = matches!(config.polling_mode, PollingMode::Auto { .. });
        let inner = Arc::new(Inner {
            state: Mutex::new(State {
                entry: Arc::new(Entry::empty()),
                cached_entry_string: String::new(),
                initialized: false,
                offline: config.offline,
                in_flight: None,
                initial_fetch: None,
                poller: None,
                init_timer: None,
            }),
            closed: AtomicBool::new(false),
            cache: config.cache,
            cache_key: cache_key(&config.sdk_key),
            fetcher: config.fetcher,
            polling_mode: config.polling_mode,
            hooks: config.hooks,
        });

        let mut notifications = Notifications::default();
        {
            let mut state = inner.lock();
            if let (
                PollingMode::Auto {
                    poll_interval,
                    max_init_wait,
                },
                false,
            ) = (inner.polling_mode, config.offline)
            {
                state.initial_fetch = Some(Arc::new(PendingFetch::default()));
                state.poller = Some(start_poller(&inner, poll_interval)?);
                state.init_timer = Some(start_init_timer(&inner, max_init_wait)?);
            } else {
                set_initialized(&mut state, &mut notifications);
            }
        }
        notifications.fire(&inner.hooks);

        log::debug!(target: "configcat", auto_polling; "config service started");
        Ok(ConfigService { inner })
    }

    /// Current entry according to the polling mode. May wait for a fetch, but never longer than
    /// the fetch itself (or auto polling's max init wait).
    pub fn get_settings(&self) -> Arc<Entry> {
        if self.inner.closed.load(Ordering::Acquire) {
            log_closed("get_settings");
            return self.inner.lock().entry.clone();
        }

        let outcome = match self.inner.polling_mode {
            PollingMode::Lazy {
                cache_refresh_interval,
            } => {
                let threshold = ChronoDuration::from_std(cache_refresh_interval)
                    .ok()
                    .and_then(|interval| Utc::now().checked_sub_signed(interval))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC);
                self.inner.fetch_if_older(threshold, false)
            }
            PollingMode::Auto { .. } | PollingMode::Manual => {
                self.inner.fetch_if_older(DateTime::<Utc>::MIN_UTC, true)
            }
        };
        outcome.entry
    }

    /// Fetch config JSON now, regardless of the polling mode.
    pub fn refresh(&self) -> RefreshResult {
        if self.inner.closed.load(Ordering::Acquire) {
            log_closed("refresh");
            return RefreshResult::failure(crate::Error::ClientClosed.to_string());
        }
        if self.is_offline() {
            log::warn!(target: "configcat", event_id = 3200; "{OFFLINE_REFRESH_WARNING}");
            return RefreshResult::failure(OFFLINE_REFRESH_WARNING);
        }

        let outcome = self.inner.fetch_if_older(DateTime::<Utc>::MAX_UTC, false);
        RefreshResult {
            success: outcome.error.is_none(),
            error: outcome.error,
        }
    }

    pub fn is_offline(&self) -> bool {
        self.inner.lock().offline
    }

    pub fn set_offline(&self) {
        if self.inner.closed.load(Ordering::Acquire) {
            log_closed("set_offline");
            return;
        }

        let mut notifications = Notifications::default();
        let threads = {
            let mut state = self.inner.lock();
            if state.offline {
                return;
            }
            state.offline = true;
            // Without the init timer nothing else would release waiting readers.
            set_initialized(&mut state, &mut notifications);
            [state.poller.take(), state.init_timer.take()]
        };
        notifications.fire(&self.inner.hooks);
        shutdown(threads);
        log::info!(target: "configcat", event_id = 5200; "Switched to OFFLINE mode.");
    }

    pub fn set_online(&self) {
        if self.inner.closed.load(Ordering::Acquire) {
            log_closed("set_online");
            return;
        }

        let mut state = self.inner.lock();
        if !state.offline {
            return;
        }
        state.offline = false;
        if let PollingMode::Auto { poll_interval, .. } = self.inner.polling_mode {
            match start_poller(&self.inner, poll_interval) {
                Ok(poller) => state.poller = Some(poller),
                Err(err) => {
                    log::error!(target: "configcat", "failed to start the poller thread: {err}")
                }
            }
        }
        drop(state);
        log::info!(target: "configcat", event_id = 5200; "Switched to ONLINE mode.");
    }

    /// Stop background threads and release the fetcher. Idempotent.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let threads = {
            let mut state = self.inner.lock();
            [state.poller.take(), state.init_timer.take()]
        };
        shutdown(threads);
        self.inner.fetcher.close();
        log::debug!(target: "configcat", "config service closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl Drop for ConfigService {
    fn drop(&mut self) {
        self.close();
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return an entry fetched after `threshold`, fetching if necessary. With `prefer_cached`,
    /// an initialized service returns whatever it has without fetching.
    fn fetch_if_older(&self, threshold: DateTime<Utc>, prefer_cached: bool) -> FetchOutcome {
        let mut notifications = Notifications::default();

        let (pending, started) = {
            let mut state = self.lock();

            // The empty entry is always stale: its fetch time is the distant past.
            if state.entry.fetch_time <= threshold {
                self.read_cache(&mut state, &mut notifications);
            }

            if state.entry.fetch_time > threshold {
                set_initialized(&mut state, &mut notifications);
                let entry = state.entry.clone();
                drop(state);
                notifications.fire(&self.hooks);
                return FetchOutcome { entry, error: None };
            }

            if (prefer_cached && state.initialized) || state.offline {
                let entry = state.entry.clone();
                drop(state);
                notifications.fire(&self.hooks);
                return FetchOutcome { entry, error: None };
            }

            // Auto polling readers leave fetching to the poller thread.
            if let (true, Some(initial)) = (prefer_cached, &state.initial_fetch) {
                let initial = initial.clone();
                drop(state);
                notifications.fire(&self.hooks);
                return initial.wait();
            }

            match &state.in_flight {
                Some(pending) => (pending.clone(), false),
                None => {
                    let pending = Arc::new(PendingFetch::default());
                    state.in_flight = Some(pending.clone());
                    (pending, true)
                }
            }
        };
        notifications.fire(&self.hooks);

        if started {
            self.fetch(&pending);
        }
        pending.wait()
    }

    /// Perform the fetch on the calling thread and complete `pending`.
    fn fetch(&self, pending: &PendingFetch) {
        let etag = self.lock().entry.etag.clone();
        log::debug!(target: "configcat", etag = etag.as_str(); "fetching config JSON");
        // `pending` is completed even if the fetcher panics.
        let response = panic::catch_unwind(AssertUnwindSafe(|| self.fetcher.fetch(&etag)))
            .unwrap_or_else(|payload| {
                let error = format!(
                    "Unexpected error occurred while trying to fetch config JSON. {}",
                    panic_message(&*payload)
                );
                log::error!(target: "configcat", event_id = 1103; "{error}");
                FetchResponse::Failed {
                    error,
                    fetch_time_updatable: false,
                }
            });

        let mut notifications = Notifications::default();
        let outcome = {
            let mut state = self.lock();
            let outcome = match response {
                FetchResponse::Fetched(entry) => {
                    log::debug!(target: "configcat", etag = entry.etag.as_str(); "config JSON fetched");
                    let entry = Arc::new(entry);
                    if entry.etag != state.entry.etag {
                        notifications.config_changed = Some(entry.config.clone());
                    }
                    state.entry = entry.clone();
                    self.write_cache(&mut state, &mut notifications);
                    FetchOutcome { entry, error: None }
                }
                FetchResponse::NotModified => {
                    log::debug!(target: "configcat", "config JSON not modified");
                    if !state.entry.is_empty() {
                        state.entry = Arc::new(state.entry.with_fetch_time(Utc::now()));
                        self.write_cache(&mut state, &mut notifications);
                    }
                    FetchOutcome {
                        entry: state.entry.clone(),
                        error: None,
                    }
                }
                FetchResponse::Failed {
                    error,
                    fetch_time_updatable,
                } => {
                    if fetch_time_updatable {
                        state.entry = Arc::new(state.entry.with_fetch_time(Utc::now()));
                        if !state.entry.is_empty() {
                            self.write_cache(&mut state, &mut notifications);
                        }
                    }
                    notifications.errors.push(error.clone());
                    FetchOutcome {
                        entry: state.entry.clone(),
                        error: Some(error),
                    }
                }
            };
            set_initialized(&mut state, &mut notifications);
            state.in_flight = None;
            outcome
        };

        pending.complete(outcome);
        notifications.fire(&self.hooks);
    }

    fn read_cache(&self, state: &mut State, notifications: &mut Notifications) {
        let value = match self.cache.read(&self.cache_key) {
            Ok(value) => value.unwrap_or_default(),
            Err(err) => {
                let message = format!("Error occurred while reading the cache. {err}");
                log::error!(target: "configcat", event_id = 2200; "{message}");
                notifications.errors.push(message);
                return;
            }
        };
        if value == state.cached_entry_string {
            return;
        }

        let entry = Entry::from_cache(Some(&value));
        state.cached_entry_string = value;
        if !entry.is_empty() && entry.etag != state.entry.etag {
            notifications.config_changed = Some(entry.config.clone());
            state.entry = Arc::new(entry);
        }
    }

    fn write_cache(&self, state: &mut State, notifications: &mut Notifications) {
        let value = state.entry.serialize();
        if let Err(err) = self.cache.write(&self.cache_key, &value) {
            let message = format!("Error occurred while writing the cache. {err}");
            log::error!(target: "configcat", event_id = 2201; "{message}");
            notifications.errors.push(message);
        }
        state.cached_entry_string = value;
    }

    /// Called by the init timer when auto polling's max init wait elapses.
    fn init_wait_elapsed(&self, max_init_wait: std::time::Duration) {
        let mut notifications = Notifications::default();
        {
            let mut state = self.lock();
            if state.initialized {
                return;
            }

            let message = format!(
                "`max_init_wait` for the very first fetch reached ({}ms). Returning cached config.",
                max_init_wait.as_millis()
            );
            log::warn!(target: "configcat", event_id = 4200; "{message}");

            // The fetch itself keeps running and updates the entry when done.
            if let Some(initial) = state.initial_fetch.take() {
                initial.complete(FetchOutcome {
                    entry: state.entry.clone(),
                    error: Some(message),
                });
            }
            set_initialized(&mut state, &mut notifications);
        }
        notifications.fire(&self.hooks);
    }
}

/// Mark the service initialized and release auto polling readers.
fn set_initialized(state: &mut State, notifications: &mut Notifications) {
    if state.initialized {
        return;
    }
    state.initialized = true;
    notifications.client_ready = true;
    if let Some(initial) = state.initial_fetch.take() {
        initial.complete(FetchOutcome {
            entry: state.entry.clone(),
            error: None,
        });
    }
}

fn start_poller(inner: &Arc<Inner>, poll_interval: std::time::Duration) -> Result<PollerThread> {
    let inner: Weak<Inner> = Arc::downgrade(inner);
    PollerThread::start_periodic("configcat-poller", poll_interval, move || {
        let Some(inner) = inner.upgrade() else {
            return false;
        };
        if inner.closed.load(Ordering::Acquire) || inner.lock().offline {
            return false;
        }
        inner.fetch_if_older(DateTime::<Utc>::MAX_UTC, false);
        true
    })
}

fn start_init_timer(
    inner: &Arc<Inner>,
    max_init_wait: std::time::Duration,
) -> Result<PollerThread> {
    let inner: Weak<Inner> = Arc::downgrade(inner);
    PollerThread::start_delayed("configcat-init-timer", max_init_wait, move || {
        if let Some(inner) = inner.upgrade() {
            inner.init_wait_elapsed(max_init_wait);
        }
    })
}

fn shutdown(threads: [Option<PollerThread>; 2]) {
    for thread in threads.into_iter().flatten() {
        if let Err(err) = thread.shutdown() {
            log::error!(target: "configcat", "{err}");
        }
    }
}

fn log_closed(method: &str) {
    log::warn!(target: "configcat", event_id = 3201;
        "The client is already closed, `{method}` has no effect.");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "The fetcher panicked."
    }
}
