//! An HTTP client that fetches config JSON from the ConfigCat CDN.
use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use chrono::Utc;
use reqwest::{header, StatusCode};
use sha1::{Digest, Sha1};

use crate::{
    entry::Entry,
    model::{Config, Preferences, RedirectMode},
    Error, Result,
};

/// Outcome of a single fetch attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResponse {
    /// New config JSON was downloaded.
    Fetched(Entry),
    /// The config JSON identified by the sent ETag is still current.
    NotModified,
    /// The fetch failed. The config service keeps the previous entry.
    Failed {
        /// Human readable reason, already logged by the fetcher.
        error: String,
        /// Whether the entry's fetch time should still be refreshed. Set for errors that won't
        /// go away by retrying immediately (e.g. invalid SDK key), to avoid hammering the CDN.
        fetch_time_updatable: bool,
    },
}

/// Source of config JSON. The client uses an HTTP fetcher unless [`ClientConfig::fetcher`](crate::ClientConfig::fetcher) sets another one.
pub trait ConfigFetcher: Send + Sync {
    /// Perform one conditional fetch. `etag` is empty if nothing has been fetched yet.
    fn fetch(&self, etag: &str) -> FetchResponse;

    /// Release resources. Called once when the client closes.
    fn close(&self) {}
}

/// Describes where the config JSON is stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataGovernance {
    /// Global CDN network.
    #[default]
    Global,
    /// Only CDN nodes in the European Union.
    EuOnly,
}

impl DataGovernance {
    /// Base URL of the CDN for this data governance setting.
    pub fn base_url(self) -> &'static str {
        match self {
            DataGovernance::Global => "https://cdn-global.configcat.com",
            DataGovernance::EuOnly => "https://cdn-eu.configcat.com",
        }
    }
}

pub(crate) struct HttpConfigFetcherConfig {
    pub sdk_key: String,
    /// Custom base URL. `None` means the data governance URL is used.
    pub base_url: Option<String>,
    pub data_governance: DataGovernance,
    pub polling_identifier: &'static str,
    pub request_timeout: Duration,
}

/// Fetches config JSON over HTTP, following the redirects the CDN asks for.
pub(crate) struct HttpConfigFetcher {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::blocking::Client,
    sdk_key: String,
    /// Current base URL. Updated when the CDN redirects the SDK.
    url: Mutex<String>,
    url_is_custom: bool,
    user_agent: String,
    request_timeout: Duration,
}

/// Maximum number of redirects followed within one fetch.
const MAX_REDIRECTS: usize = 2;

impl HttpConfigFetcher {
    pub(crate) fn new(config: HttpConfigFetcherConfig) -> Result<HttpConfigFetcher> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let url_is_custom = config.base_url.is_some();
        let url = config
            .base_url
            .unwrap_or_else(|| config.data_governance.base_url().to_owned());
        url::Url::parse(&url).map_err(Error::InvalidBaseUrl)?;

        Ok(HttpConfigFetcher {
            client,
            sdk_key: config.sdk_key,
            url: Mutex::new(url),
            url_is_custom,
            user_agent: format!(
                "ConfigCat-Rust/{}-{}",
                config.polling_identifier,
                env!("CARGO_PKG_VERSION")
            ),
            request_timeout: config.request_timeout,
        })
    }

    fn current_url(&self) -> String {
        self.url
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn fetch_from(&self, base_url: &str, etag: &str) -> FetchResponse {
        let endpoint = format!(
            "{}/configuration-files/{}/config_v6.json",
            base_url.trim_end_matches('/'),
            self.sdk_key
        );

        log::debug!(target: "configcat", "fetching config JSON");
        let mut request = self
            .client
            .get(endpoint)
            .header("X-ConfigCat-UserAgent", &self.user_agent);
        if !etag.is_empty() {
            request = request.header(header::IF_NONE_MATCH, etag);
        }

        let response = match request.send() {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                let error = format!(
                    "Request timed out while trying to fetch config JSON. Timeout value: {}ms",
                    self.request_timeout.as_millis()
                );
                log::error!(target: "configcat", event_id = 1102; "{error}");
                return failed(error, false);
            }
            Err(err) => {
                let error = format!(
                    "Unexpected error occurred while trying to fetch config JSON. It is most likely due to a local network issue. Please make sure your application can reach the ConfigCat CDN servers (or your proxy server) over HTTP. {}",
                    Error::from(err)
                );
                log::error!(target: "configcat", event_id = 1103; "{error}");
                return failed(error, false);
            }
        };

        match response.status() {
            StatusCode::OK => {
                let response_etag = response
                    .headers()
                    .get(header::ETAG)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_owned);
                let body = match response.text() {
                    Ok(body) => body,
                    Err(err) => {
                        let error = format!(
                            "Fetching config JSON was successful but the HTTP response content was invalid. {}",
                            Error::from(err)
                        );
                        log::error!(target: "configcat", event_id = 1105; "{error}");
                        return failed(error, false);
                    }
                };
                match Config::from_json(&body) {
                    Ok(config) => {
                        log::debug!(target: "configcat", "fetch was successful: new config fetched");
                        let etag = response_etag.unwrap_or_else(|| synthetic_etag(&body));
                        FetchResponse::Fetched(Entry::new(config, etag, body, Utc::now()))
                    }
                    Err(err) => {
                        let error = format!(
                            "Fetching config JSON was successful but the HTTP response content was invalid. Config JSON parsing failed. {err}"
                        );
                        log::error!(target: "configcat", event_id = 1105; "{error}");
                        failed(error, false)
                    }
                }
            }
            StatusCode::NOT_MODIFIED => {
                log::debug!(target: "configcat", "fetch was successful: config not modified");
                FetchResponse::NotModified
            }
            StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                let error = "Your SDK Key seems to be wrong. You can find the valid SDK Key at https://app.configcat.com/sdkkey".to_owned();
                log::error!(target: "configcat", event_id = 1100; "{error}");
                failed(error, true)
            }
            status => {
                let error = format!(
                    "Unexpected HTTP response was received while trying to fetch config JSON: {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or_default()
                );
                log::error!(target: "configcat", event_id = 1101; "{error}");
                failed(error, false)
            }
        }
    }
}

impl ConfigFetcher for HttpConfigFetcher {
    fn fetch(&self, etag: &str) -> FetchResponse {
        let mut redirects = 0;
        loop {
            let url = self.current_url();
            let response = self.fetch_from(&url, etag);
            let FetchResponse::Fetched(entry) = &response else {
                return response;
            };

            match redirect_action(&url, self.url_is_custom, entry.config.preferences.as_ref()) {
                RedirectAction::Stay => return response,
                RedirectAction::Adopt(new_url) => {
                    *self.url.lock().unwrap_or_else(PoisonError::into_inner) = new_url;
                    return response;
                }
                RedirectAction::Follow { url: new_url, warn } => {
                    *self.url.lock().unwrap_or_else(PoisonError::into_inner) = new_url;
                    if warn {
                        log::warn!(target: "configcat", event_id = 3002;
                            "The `data_governance` parameter specified at the client initialization is not in sync with the preferences on the ConfigCat Dashboard. Read more: https://configcat.com/docs/advanced/data-governance/");
                    }
                    if redirects >= MAX_REDIRECTS {
                        log::error!(target: "configcat", event_id = 1104;
                            "Redirection loop encountered while trying to fetch config JSON. Please contact us at https://configcat.com/support/");
                        return response;
                    }
                    redirects += 1;
                }
            }
        }
    }

    fn close(&self) {
        log::debug!(target: "configcat", "closing config fetcher");
    }
}

fn failed(error: String, fetch_time_updatable: bool) -> FetchResponse {
    FetchResponse::Failed {
        error,
        fetch_time_updatable,
    }
}

/// ETag for responses that don't carry one, so that different documents stay distinguishable.
fn synthetic_etag(body: &str) -> String {
    format!("W/\"{}\"", hex::encode(Sha1::digest(body)))
}

#[derive(Debug, PartialEq)]
enum RedirectAction {
    /// Keep using the current URL.
    Stay,
    /// Use the new URL from the next fetch on.
    Adopt(String),
    /// Use the new URL and fetch again right away.
    Follow { url: String, warn: bool },
}

fn redirect_action(
    current_url: &str,
    url_is_custom: bool,
    preferences: Option<&Preferences>,
) -> RedirectAction {
    let Some(preferences) = preferences else {
        return RedirectAction::Stay;
    };
    let Some(new_url) = preferences
        .base_url
        .as_deref()
        .filter(|url| !url.is_empty() && *url != current_url)
    else {
        return RedirectAction::Stay;
    };

    let redirect = preferences.redirect.unwrap_or(RedirectMode::No);
    if url_is_custom && redirect != RedirectMode::Force {
        return RedirectAction::Stay;
    }

    match redirect {
        RedirectMode::No => RedirectAction::Adopt(new_url.to_owned()),
        RedirectMode::Should => RedirectAction::Follow {
            url: new_url.to_owned(),
            warn: true,
        },
        RedirectMode::Force => RedirectAction::Follow {
            url: new_url.to_owned(),
            warn: false,
        },
    }
}
