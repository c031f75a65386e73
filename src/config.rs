use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use regex::Regex;

use crate::{
    cache::NullConfigCache, Client, ConfigCache, ConfigFetcher, DataGovernance, Error,
    FlagOverrides, Hooks, OverrideBehaviour, PollingMode, Result, User,
};

/// Configuration for [`Client`].
#[derive(Clone)]
pub struct ClientConfig {
    pub(crate) sdk_key: String,
    pub(crate) polling_mode: PollingMode,
    pub(crate) base_url: Option<String>,
    pub(crate) data_governance: DataGovernance,
    pub(crate) cache: Arc<dyn ConfigCache>,
    pub(crate) offline: bool,
    pub(crate) default_user: Option<User>,
    pub(crate) request_timeout: Duration,
    pub(crate) overrides: Option<FlagOverrides>,
    pub(crate) hooks: Arc<Hooks>,
    pub(crate) fetcher: Option<Arc<dyn ConfigFetcher>>,
}

impl ClientConfig {
    /// Default timeout of HTTP requests.
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a default configuration using the specified SDK key.
    ///
    /// ```
    /// # use configcat::ClientConfig;
    /// ClientConfig::from_sdk_key("configcat-sdk-1/PKDVCLf-Hq-h-kCzMp-L7Q/HhOWfwVtZ0mb30i9wi17GQ");
    /// ```
    pub fn from_sdk_key(sdk_key: impl Into<String>) -> Self {
        ClientConfig {
            sdk_key: sdk_key.into(),
            polling_mode: PollingMode::default(),
            base_url: None,
            data_governance: DataGovernance::default(),
            cache: Arc::new(NullConfigCache),
            offline: false,
            default_user: None,
            request_timeout: ClientConfig::DEFAULT_REQUEST_TIMEOUT,
            overrides: None,
            hooks: Arc::new(Hooks::new()),
            fetcher: None,
        }
    }

    /// Set the polling mode.
    ///
    /// ```
    /// # use std::time::Duration;
    /// # use configcat::{ClientConfig, PollingMode};
    /// let config = ClientConfig::from_sdk_key("configcat-sdk-1/PKDVCLf-Hq-h-kCzMp-L7Q/HhOWfwVtZ0mb30i9wi17GQ")
    ///     .polling_mode(PollingMode::lazy_with(Duration::from_secs(120)));
    /// ```
    pub fn polling_mode(mut self, polling_mode: PollingMode) -> Self {
        self.polling_mode = polling_mode;
        self
    }

    /// Override the CDN base URL, e.g. to use the ConfigCat Proxy. Clients should use the default
    /// setting in most cases.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the data governance. Must match the setting on the ConfigCat Dashboard.
    pub fn data_governance(mut self, data_governance: DataGovernance) -> Self {
        self.data_governance = data_governance;
        self
    }

    /// Set the persistent cache. The same cache may be shared by several clients.
    pub fn cache(mut self, cache: Arc<dyn ConfigCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Start the client in offline mode.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// User used when an evaluation method gets no user.
    pub fn default_user(mut self, user: User) -> Self {
        self.default_user = Some(user);
        self
    }

    /// Timeout of HTTP requests.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Use local flag overrides.
    pub fn overrides(mut self, overrides: FlagOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }

    /// Use the given hooks. Handlers can also be added later through [`Client::hooks`].
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use configcat::{ClientConfig, Hooks};
    /// let hooks = Arc::new(Hooks::new());
    /// hooks.add_on_client_ready(|| println!("client is ready"));
    /// let config = ClientConfig::from_sdk_key("configcat-sdk-1/PKDVCLf-Hq-h-kCzMp-L7Q/HhOWfwVtZ0mb30i9wi17GQ")
    ///     .hooks(hooks);
    /// ```
    pub fn hooks(mut self, hooks: Arc<Hooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Replace the HTTP fetcher with a custom source of config JSON, e.g. a scripted one in tests.
    /// `base_url`, `data_governance` and `request_timeout` are ignored when set.
    pub fn fetcher(mut self, fetcher: Arc<dyn ConfigFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// SDK key.
    pub fn sdk_key(&self) -> &str {
        &self.sdk_key
    }

    /// Create a new [`Client`] using the specified configuration.
    ///
    /// ```no_run
    /// # use configcat::ClientConfig;
    /// let client = ClientConfig::from_sdk_key("configcat-sdk-1/PKDVCLf-Hq-h-kCzMp-L7Q/HhOWfwVtZ0mb30i9wi17GQ")
    ///     .to_client()
    ///     .unwrap();
    /// ```
    pub fn to_client(self) -> Result<Client> {
        Client::new(self)
    }

    /// Check the SDK key format. Local-only overrides don't need a key.
    pub(crate) fn validate(&self) -> Result<()> {
        let local_only = self
            .overrides
            .as_ref()
            .is_some_and(|overrides| overrides.behaviour == OverrideBehaviour::LocalOnly);
        if local_only || is_valid_sdk_key(&self.sdk_key, self.base_url.is_some()) {
            Ok(())
        } else {
            Err(Error::InvalidSdkKey(self.sdk_key.clone()))
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("sdk_key", &self.sdk_key)
            .field("polling_mode", &self.polling_mode)
            .field("base_url", &self.base_url)
            .field("data_governance", &self.data_governance)
            .field("offline", &self.offline)
            .field("default_user", &self.default_user)
            .field("request_timeout", &self.request_timeout)
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}

/// `configcat-sdk-1/<22 chars>/<22 chars>` or the legacy `<22 chars>/<22 chars>`. A custom base URL
/// (ConfigCat Proxy) also allows `configcat-proxy/<anything>`.
fn is_valid_sdk_key(sdk_key: &str, custom_base_url: bool) -> bool {
    const PROXY_PREFIX: &str = "configcat-proxy/";
    if custom_base_url && sdk_key.len() > PROXY_PREFIX.len() && sdk_key.starts_with(PROXY_PREFIX)
    {
        return true;
    }

    sdk_key_pattern().is_some_and(|pattern| pattern.is_match(sdk_key))
}

fn sdk_key_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(?:configcat-sdk-1/)?[^/]{22}/[^/]{22}$").ok())
        .as_ref()
}
