use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, PoisonError, RwLock,
    },
};

use chrono::{DateTime, Utc};

use crate::{
    config_service::{ConfigService, ConfigServiceConfig, RefreshResult},
    eval::{self, EvaluationResult},
    fetcher::{ConfigFetcher, HttpConfigFetcher, HttpConfigFetcherConfig},
    hooks::Hooks,
    model::{Config, PercentageOption, Setting, SettingValue, TargetingRule},
    overrides::{self, OverrideBehaviour},
    ClientConfig, Error, Result, User,
};

const LOCAL_ONLY_WARNING: &str = "Client is configured to use the `LocalOnly` override behaviour, which prevents synchronization with external sources.";

/// A client for ConfigCat.
///
/// In order to create a client instance, first create [`ClientConfig`].
///
/// Evaluation methods never fail: when something goes wrong (no config JSON yet, unknown key,
/// broken flag definition) the error is logged and the caller's default value is returned. Use
/// [`get_value_details`](Client::get_value_details) to inspect the error.
///
/// # Examples
/// ```no_run
/// # use configcat::{ClientConfig, User};
/// let client = ClientConfig::from_sdk_key("configcat-sdk-1/PKDVCLf-Hq-h-kCzMp-L7Q/HhOWfwVtZ0mb30i9wi17GQ")
///     .to_client()
///     .unwrap();
///
/// let user = User::new("435170f4-8a8b-4b67-a723-505ac7cdea92");
/// let enabled = client.get_value("isAwesomeFeatureEnabled", false, Some(&user));
/// ```
pub struct Client {
    sdk_key: String,
    /// `None` when only local overrides are used.
    service: Option<ConfigService>,
    local: Option<LocalConfig>,
    default_user: RwLock<Option<User>>,
    hooks: Arc<Hooks>,
    closed: AtomicBool,
}

struct LocalConfig {
    behaviour: OverrideBehaviour,
    config: Arc<Config>,
}

/// Config used for one evaluation call.
struct Snapshot {
    config: Arc<Config>,
    fetch_time: Option<DateTime<Utc>>,
}

/// Result of a flag evaluation with everything that influenced it.
#[derive(Debug, Clone)]
pub struct EvaluationDetails<T> {
    /// Setting key.
    pub key: String,
    /// Evaluated value, or the caller's default value if [`error`](Self::error) is set.
    pub value: T,
    /// Variation id of the evaluated value.
    pub variation_id: Option<String>,
    /// Whether the caller's default value was returned because of an error.
    pub is_default_value: bool,
    /// Why the default value was returned.
    pub error: Option<Error>,
    /// User the flag was evaluated for.
    pub user: Option<User>,
    /// Fetch time of the config JSON used. `None` for local-only config.
    pub fetch_time: Option<DateTime<Utc>>,
    /// Targeting rule that served the value.
    pub matched_targeting_rule: Option<TargetingRule>,
    /// Percentage option that served the value.
    pub matched_percentage_option: Option<PercentageOption>,
}

impl<T> EvaluationDetails<T> {
    /// Convert the value, keeping the rest of the details.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> EvaluationDetails<U> {
        EvaluationDetails {
            key: self.key,
            value: f(self.value),
            variation_id: self.variation_id,
            is_default_value: self.is_default_value,
            error: self.error,
            user: self.user,
            fetch_time: self.fetch_time,
            matched_targeting_rule: self.matched_targeting_rule,
            matched_percentage_option: self.matched_percentage_option,
        }
    }

    fn from_default(
        key: &str,
        default: T,
        user: Option<User>,
        fetch_time: Option<DateTime<Utc>>,
        error: Error,
    ) -> Self {
        EvaluationDetails {
            key: key.to_owned(),
            value: default,
            variation_id: None,
            is_default_value: true,
            error: Some(error),
            user,
            fetch_time,
            matched_targeting_rule: None,
            matched_percentage_option: None,
        }
    }
}

impl EvaluationDetails<SettingValue> {
    fn from_result(
        key: &str,
        result: EvaluationResult,
        user: Option<User>,
        fetch_time: Option<DateTime<Utc>>,
    ) -> Self {
        EvaluationDetails {
            key: key.to_owned(),
            value: result.value,
            variation_id: result.variation_id,
            is_default_value: false,
            error: None,
            user,
            fetch_time,
            matched_targeting_rule: result.matched_targeting_rule,
            matched_percentage_option: result.matched_percentage_option,
        }
    }
}

/// Types that can be requested from [`Client::get_value`].
pub trait SettingValueType: Clone {
    /// Wrap into a [`SettingValue`].
    fn into_setting_value(self) -> SettingValue;

    /// Unwrap a [`SettingValue`] of the matching kind.
    fn from_setting_value(value: SettingValue) -> Option<Self>;
}

impl SettingValueType for bool {
    fn into_setting_value(self) -> SettingValue {
        SettingValue::Bool(self)
    }

    fn from_setting_value(value: SettingValue) -> Option<Self> {
        match value {
            SettingValue::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl SettingValueType for String {
    fn into_setting_value(self) -> SettingValue {
        SettingValue::String(self)
    }

    fn from_setting_value(value: SettingValue) -> Option<Self> {
        match value {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl SettingValueType for i64 {
    fn into_setting_value(self) -> SettingValue {
        SettingValue::Int(self)
    }

    fn from_setting_value(value: SettingValue) -> Option<Self> {
        match value {
            SettingValue::Int(i) => Some(i),
            _ => None,
        }
    }
}

impl SettingValueType for f64 {
    fn into_setting_value(self) -> SettingValue {
        SettingValue::Double(self)
    }

    fn from_setting_value(value: SettingValue) -> Option<Self> {
        match value {
            SettingValue::Double(d) => Some(d),
            _ => None,
        }
    }
}

impl SettingValueType for SettingValue {
    fn into_setting_value(self) -> SettingValue {
        self
    }

    fn from_setting_value(value: SettingValue) -> Option<Self> {
        Some(value)
    }
}

impl Client {
    /// Create a new `Client` using the specified configuration.
    ///
    /// In auto polling mode this starts the poller thread. Fails if the SDK key or the base URL is
    /// invalid, or if a local override file cannot be loaded.
    pub fn new(config: ClientConfig) -> Result<Client> {
        config.validate()?;

        let local = config
            .overrides
            .as_ref()
            .map(|overrides| {
                overrides.load().map(|local| LocalConfig {
                    behaviour: overrides.behaviour(),
                    config: local,
                })
            })
            .transpose()?;

        let service = match &local {
            Some(local) if local.behaviour == OverrideBehaviour::LocalOnly => {
                config.hooks.client_ready();
                None
            }
            _ => {
                let fetcher: Arc<dyn ConfigFetcher> = match config.fetcher {
                    Some(fetcher) => fetcher,
                    None => Arc::new(HttpConfigFetcher::new(HttpConfigFetcherConfig {
                        sdk_key: config.sdk_key.clone(),
                        base_url: config.base_url,
                        data_governance: config.data_governance,
                        polling_identifier: config.polling_mode.identifier(),
                        request_timeout: config.request_timeout,
                    })?),
                };
                Some(ConfigService::new(ConfigServiceConfig {
                    sdk_key: config.sdk_key.clone(),
                    polling_mode: config.polling_mode,
                    offline: config.offline,
                    cache: config.cache,
                    fetcher,
                    hooks: config.hooks.clone(),
                })?)
            }
        };

        log::debug!(target: "configcat", polling_mode = config.polling_mode.identifier(); "client created");
        Ok(Client {
            sdk_key: config.sdk_key,
            service,
            local,
            default_user: RwLock::new(config.default_user),
            hooks: config.hooks,
            closed: AtomicBool::new(false),
        })
    }

    /// SDK key of this client.
    pub fn sdk_key(&self) -> &str {
        &self.sdk_key
    }

    /// Hooks of this client. Handlers may be added at any time.
    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Get the value of a feature flag or setting, or `default` if it cannot be evaluated.
    ///
    /// `default` also determines the requested type: it must match the type of the setting.
    /// Without `user`, the default user is used.
    ///
    /// ```no_run
    /// # use configcat::{ClientConfig, User};
    /// # let client = ClientConfig::from_sdk_key("configcat-sdk-1/PKDVCLf-Hq-h-kCzMp-L7Q/HhOWfwVtZ0mb30i9wi17GQ").to_client().unwrap();
    /// let text = client.get_value("keySampleText", String::new(), None);
    /// let count = client.get_value("maxItems", 10_i64, Some(&User::new("user-1")));
    /// ```
    pub fn get_value<T: SettingValueType>(&self, key: &str, default: T, user: Option<&User>) -> T {
        self.get_value_details(key, default, user).value
    }

    /// Same as [`get_value`](Client::get_value) but also returns the details of the evaluation.
    pub fn get_value_details<T: SettingValueType>(
        &self,
        key: &str,
        default: T,
        user: Option<&User>,
    ) -> EvaluationDetails<T> {
        let user = self.resolve_user(user);
        let details = match self.snapshot() {
            Some(snapshot) => {
                self.evaluate(&snapshot, key, default.clone().into_setting_value(), user)
            }
            None => {
                let default = default.clone().into_setting_value();
                log::error!(target: "configcat", event_id = 1000;
                    "Config JSON is not present when evaluating setting '{key}'. Returning the `default_value` parameter that you specified in your application: '{default}'.");
                EvaluationDetails::from_default(key, default, user, None, Error::ConfigJsonMissing)
            }
        };
        self.hooks.flag_evaluated(&details);
        details.map(|value| T::from_setting_value(value).unwrap_or(default))
    }

    /// Keys of all settings, sorted.
    pub fn get_all_keys(&self) -> Vec<String> {
        let Some(snapshot) = self.snapshot() else {
            log::error!(target: "configcat", event_id = 1000; "Config JSON is not present. Returning empty list.");
            return Vec::new();
        };
        sorted_keys(&snapshot.config)
    }

    /// Values of all settings for `user`. Settings that fail to evaluate report their default
    /// value.
    pub fn get_all_values(&self, user: Option<&User>) -> HashMap<String, SettingValue> {
        self.get_all_value_details(user)
            .into_iter()
            .map(|details| (details.key, details.value))
            .collect()
    }

    /// Details of all settings for `user`, ordered by key.
    pub fn get_all_value_details(&self, user: Option<&User>) -> Vec<EvaluationDetails<SettingValue>> {
        let user = self.resolve_user(user);
        let Some(snapshot) = self.snapshot() else {
            log::error!(target: "configcat", event_id = 1000; "Config JSON is not present. Returning empty list.");
            return Vec::new();
        };

        let mut settings: Vec<(&String, &Setting)> = snapshot.config.settings.iter().collect();
        settings.sort_by(|(a, _), (b, _)| a.cmp(b));
        settings
            .into_iter()
            .map(|(key, setting)| {
                let details = self.evaluate(&snapshot, key, setting.value.clone(), user.clone());
                self.hooks.flag_evaluated(&details);
                details
            })
            .collect()
    }

    /// Find the setting key and value served with `variation_id`.
    pub fn get_key_and_value(&self, variation_id: &str) -> Result<(String, SettingValue)> {
        let Some(snapshot) = self.snapshot() else {
            log::error!(target: "configcat", event_id = 1000; "Config JSON is not present. Returning None.");
            return Err(Error::ConfigJsonMissing);
        };

        for (key, setting) in &snapshot.config.settings {
            if let Some(value) = find_variation(setting, variation_id) {
                return Ok((key.clone(), value.clone()));
            }
        }

        log::error!(target: "configcat", event_id = 2011;
            "Could not find the setting for the specified variation ID: '{variation_id}'.");
        Err(Error::VariationIdNotFound(variation_id.to_owned()))
    }

    /// Fetch config JSON now, regardless of the polling mode.
    pub fn refresh(&self) -> RefreshResult {
        match &self.service {
            Some(service) => service.refresh(),
            None => {
                log::warn!(target: "configcat", event_id = 3202; "{LOCAL_ONLY_WARNING}");
                RefreshResult {
                    success: false,
                    error: Some(LOCAL_ONLY_WARNING.to_owned()),
                }
            }
        }
    }

    /// Allow HTTP calls again and resume polling.
    pub fn set_online(&self) {
        match &self.service {
            Some(service) => service.set_online(),
            None => log::warn!(target: "configcat", event_id = 3202; "{LOCAL_ONLY_WARNING}"),
        }
    }

    /// Stop HTTP calls. Evaluation keeps using the cached config.
    pub fn set_offline(&self) {
        if let Some(service) = &self.service {
            service.set_offline();
        }
    }

    /// Whether the client makes no HTTP calls. Always `true` with local-only overrides.
    pub fn is_offline(&self) -> bool {
        self.service.as_ref().map_or(true, ConfigService::is_offline)
    }

    /// Set the user used when an evaluation method gets no user.
    pub fn set_default_user(&self, user: User) {
        *self
            .default_user
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(user);
    }

    /// Remove the default user.
    pub fn clear_default_user(&self) {
        *self
            .default_user
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Stop background threads and release network resources. Idempotent.
    ///
    /// A closed client keeps serving the last known config but never fetches again.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(service) = &self.service {
            service.close();
        }
        log::debug!(target: "configcat", "client closed");
    }

    /// Whether [`close`](Client::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn resolve_user(&self, user: Option<&User>) -> Option<User> {
        user.cloned().or_else(|| {
            self.default_user
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        })
    }

    /// Current config with local overrides applied. `None` if there is neither.
    fn snapshot(&self) -> Option<Snapshot> {
        let remote = self
            .service
            .as_ref()
            .map(ConfigService::get_settings)
            .filter(|entry| !entry.is_empty());

        match (&self.local, remote) {
            (Some(local), None) => Some(Snapshot {
                config: local.config.clone(),
                fetch_time: None,
            }),
            (Some(local), Some(entry)) => Some(Snapshot {
                config: overrides::merge(local.behaviour, &local.config, &entry.config),
                fetch_time: Some(entry.fetch_time),
            }),
            (None, Some(entry)) => Some(Snapshot {
                config: entry.config.clone(),
                fetch_time: Some(entry.fetch_time),
            }),
            (None, None) => None,
        }
    }

    fn evaluate(
        &self,
        snapshot: &Snapshot,
        key: &str,
        default: SettingValue,
        user: Option<User>,
    ) -> EvaluationDetails<SettingValue> {
        let fetch_time = snapshot.fetch_time;
        let Some(setting) = snapshot.config.settings.get(key) else {
            let available_keys = sorted_keys(&snapshot.config);
            log::error!(target: "configcat", event_id = 1001;
                "Failed to evaluate setting '{key}' (the key was not found in config JSON). Returning the `default_value` parameter that you specified in your application: '{default}'. Available keys: [{}].",
                available_keys.iter().map(|key| format!("'{key}'")).collect::<Vec<_>>().join(", "));
            let error = Error::SettingNotFound {
                key: key.to_owned(),
                available_keys,
            };
            return EvaluationDetails::from_default(key, default, user, fetch_time, error);
        };

        let result = if setting.setting_type.accepts(&default) {
            eval::evaluate(&snapshot.config, key, user.as_ref()).map_err(Error::from)
        } else {
            Err(Error::SettingTypeMismatch {
                key: key.to_owned(),
                setting_type: setting.setting_type.to_string(),
            })
        };

        match result {
            Ok(result) => {
                log::trace!(target: "configcat",
                    setting_key = key,
                    value:serde = &result.value;
                    "evaluated a flag");
                EvaluationDetails::from_result(key, result, user, fetch_time)
            }
            Err(error) => {
                log::error!(target: "configcat", event_id = 1002;
                    "Failed to evaluate setting '{key}' ({error}). Returning the `default_value` parameter that you specified in your application: '{default}'.");
                self.hooks.error(&error.to_string());
                EvaluationDetails::from_default(key, default, user, fetch_time, error)
            }
        }
    }
}

fn sorted_keys(config: &Config) -> Vec<String> {
    let mut keys: Vec<String> = config.settings.keys().cloned().collect();
    keys.sort();
    keys
}

fn find_variation<'a>(setting: &'a Setting, variation_id: &str) -> Option<&'a SettingValue> {
    let id = Some(variation_id);
    if setting.variation_id.as_deref() == id {
        return Some(&setting.value);
    }
    for rule in &setting.targeting_rules {
        if let Some(served) = &rule.served_value {
            if served.variation_id.as_deref() == id {
                return Some(&served.value);
            }
        }
        if let Some(option) = rule
            .percentage_options
            .iter()
            .flatten()
            .find(|option| option.variation_id.as_deref() == id)
        {
            return Some(&option.value);
        }
    }
    setting
        .percentage_options
        .iter()
        .find(|option| option.variation_id.as_deref() == id)
        .map(|option| &option.value)
}
