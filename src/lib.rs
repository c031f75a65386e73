//! The Rust SDK for ConfigCat, a hosted service for feature flags and remotely managed settings.
//!
//! # Overview
//!
//! The SDK revolves around a [`Client`] that evaluates feature flags and settings for a [`User`].
//! The client downloads config JSON from the ConfigCat CDN according to its [`PollingMode`],
//! keeps it in memory (and optionally in a shared [`ConfigCache`]), and evaluates targeting rules,
//! segments, prerequisite flags and percentage options locally. No user data leaves the process.
//!
//! ```no_run
//! # use configcat::{ClientConfig, User};
//! let client = ClientConfig::from_sdk_key("configcat-sdk-1/PKDVCLf-Hq-h-kCzMp-L7Q/HhOWfwVtZ0mb30i9wi17GQ")
//!     .to_client()
//!     .unwrap();
//!
//! let user = User::new("435170f4-8a8b-4b67-a723-505ac7cdea92").email("john@example.com");
//! if client.get_value("isAwesomeFeatureEnabled", false, Some(&user)) {
//!     // ...
//! }
//! ```
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum. Evaluation methods never fail: they log the
//! problem and return the default value passed by the caller. The error is still available
//! through [`Client::get_value_details`].
//!
//! In production, it is recommended to treat flag evaluation errors as non-fatal. However, the
//! reported errors are valuable for debugging and usually indicate that developer's attention is
//! needed (e.g. a typo in a setting key).
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate for logging messages, with
//! the `configcat` target. Records carry an `event_id` key-value that identifies the kind of event
//! across ConfigCat SDKs. When `info` is enabled, every evaluation logs a trace explaining how the
//! value was chosen.
//!
//! # Examples
//!
//! Examples can be found in the `demos` directory of the `configcat` crate repository.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

mod cache;
mod client;
mod config;
mod config_service;
mod entry;
mod error;
pub mod eval;
mod fetcher;
mod hooks;
pub mod model;
mod overrides;
mod poller;
mod polling;
mod registry;
mod sharder;
mod user;

pub use cache::{CacheResult, ConfigCache, InMemoryConfigCache, NullConfigCache};
pub use client::{Client, EvaluationDetails, SettingValueType};
pub use config::ClientConfig;
pub use config_service::RefreshResult;
pub use entry::Entry;
pub use error::{Error, Result};
pub use eval::EvaluationError;
pub use fetcher::{ConfigFetcher, DataGovernance, FetchResponse};
pub use hooks::Hooks;
pub use model::{Config, Setting, SettingType, SettingValue};
pub use overrides::{FlagOverrides, OverrideBehaviour, OverrideDataSource};
pub use polling::PollingMode;
pub use registry::ClientRegistry;
pub use user::{User, UserAttributeValue};
