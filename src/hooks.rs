use std::sync::{PoisonError, RwLock};

use crate::{model::Config, EvaluationDetails, SettingValue};

type ClientReadyHandler = Box<dyn Fn() + Send + Sync>;
type ConfigChangedHandler = Box<dyn Fn(&Config) + Send + Sync>;
type FlagEvaluatedHandler = Box<dyn Fn(&EvaluationDetails<SettingValue>) + Send + Sync>;
type ErrorHandler = Box<dyn Fn(&str) + Send + Sync>;

/// Event handlers notified by the client.
///
/// Handlers are invoked synchronously on the thread that caused the event (a caller thread or the
/// background poller), and never while the client holds an internal lock, so they may call back
/// into the client.
///
/// ```
/// # use configcat::Hooks;
/// let hooks = Hooks::new();
/// hooks.add_on_config_changed(|config| {
///     println!("received {} settings", config.settings.len());
/// });
/// ```
#[derive(Default)]
pub struct Hooks {
    on_client_ready: RwLock<Vec<ClientReadyHandler>>,
    on_config_changed: RwLock<Vec<ConfigChangedHandler>>,
    on_flag_evaluated: RwLock<Vec<FlagEvaluatedHandler>>,
    on_error: RwLock<Vec<ErrorHandler>>,
}

impl Hooks {
    /// Create an empty set of hooks.
    pub fn new() -> Hooks {
        Hooks::default()
    }

    /// Called once the client has a usable config (from cache or network), or once auto
    /// polling's max init wait elapses.
    pub fn add_on_client_ready(&self, handler: impl Fn() + Send + Sync + 'static) {
        push(&self.on_client_ready, Box::new(handler));
    }

    /// Called whenever a config with a new ETag is adopted.
    pub fn add_on_config_changed(&self, handler: impl Fn(&Config) + Send + Sync + 'static) {
        push(&self.on_config_changed, Box::new(handler));
    }

    /// Called after every flag evaluation.
    pub fn add_on_flag_evaluated(
        &self,
        handler: impl Fn(&EvaluationDetails<SettingValue>) + Send + Sync + 'static,
    ) {
        push(&self.on_flag_evaluated, Box::new(handler));
    }

    /// Called with the error message whenever the SDK logs an error.
    pub fn add_on_error(&self, handler: impl Fn(&str) + Send + Sync + 'static) {
        push(&self.on_error, Box::new(handler));
    }

    pub(crate) fn client_ready(&self) {
        for handler in read(&self.on_client_ready).iter() {
            handler();
        }
    }

    pub(crate) fn config_changed(&self, config: &Config) {
        for handler in read(&self.on_config_changed).iter() {
            handler(config);
        }
    }

    pub(crate) fn flag_evaluated(&self, details: &EvaluationDetails<SettingValue>) {
        for handler in read(&self.on_flag_evaluated).iter() {
            handler(details);
        }
    }

    pub(crate) fn error(&self, message: &str) {
        for handler in read(&self.on_error).iter() {
            handler(message);
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}

fn push<T>(handlers: &RwLock<Vec<T>>, handler: T) {
    handlers
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .push(handler);
}

fn read<T>(handlers: &RwLock<Vec<T>>) -> std::sync::RwLockReadGuard<'_, Vec<T>> {
    handlers.read().unwrap_or_else(PoisonError::into_inner)
}
