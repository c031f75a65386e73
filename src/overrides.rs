//! Local flag overrides.
use std::{collections::HashMap, path::PathBuf, sync::Arc};

use serde::Deserialize;

use crate::{
    model::{Config, Setting, SettingValue},
    Error, Result,
};

/// How local values are combined with the ones downloaded from the CDN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideBehaviour {
    /// Only local values are used. The client never makes network requests.
    LocalOnly,
    /// Local values win over remote ones with the same key.
    LocalOverRemote,
    /// Remote values win over local ones with the same key.
    RemoteOverLocal,
}

/// Where local values come from.
#[derive(Debug, Clone, PartialEq)]
pub enum OverrideDataSource {
    /// Values from memory.
    Map(HashMap<String, SettingValue>),
    /// A JSON file containing either a full config JSON document or a simplified
    /// `{"flags": {"<key>": <value>}}` object.
    File(PathBuf),
}

/// Local overrides of the client. See [`ClientConfig::overrides`](crate::ClientConfig::overrides).
///
/// ```
/// # use std::collections::HashMap;
/// # use configcat::{FlagOverrides, OverrideBehaviour, OverrideDataSource, SettingValue};
/// let overrides = FlagOverrides::new(
///     OverrideDataSource::Map(HashMap::from([(
///         "isAwesomeFeatureEnabled".to_owned(),
///         SettingValue::Bool(true),
///     )])),
///     OverrideBehaviour::LocalOverRemote,
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FlagOverrides {
    pub(crate) source: OverrideDataSource,
    pub(crate) behaviour: OverrideBehaviour,
}

#[derive(Deserialize)]
struct SimplifiedConfig {
    flags: HashMap<String, serde_json::Value>,
}

impl FlagOverrides {
    /// Create overrides from a data source.
    pub fn new(source: OverrideDataSource, behaviour: OverrideBehaviour) -> FlagOverrides {
        FlagOverrides { source, behaviour }
    }

    /// Override behaviour.
    pub fn behaviour(&self) -> OverrideBehaviour {
        self.behaviour
    }

    /// Load the local config. Files are read once, when the client is created.
    pub(crate) fn load(&self) -> Result<Arc<Config>> {
        let config = match &self.source {
            OverrideDataSource::Map(values) => config_from_values(
                values
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone())),
            ),
            OverrideDataSource::File(path) => {
                let json = std::fs::read_to_string(path)?;
                parse_file(&json).map_err(|err| {
                    log::error!(target: "configcat", event_id = 1302;
                        "Failed to decode JSON from the local config file '{}'. {err}", path.display());
                    err
                })?
            }
        };
        Ok(Arc::new(config))
    }
}

fn parse_file(json: &str) -> Result<Config> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|err| Error::ConfigJsonParse(err.to_string()))?;

    if value.get("flags").is_some() {
        let simplified: SimplifiedConfig =
            serde_json::from_value(value).map_err(|err| Error::ConfigJsonParse(err.to_string()))?;
        let mut values = Vec::with_capacity(simplified.flags.len());
        for (key, value) in simplified.flags {
            let value = SettingValue::from_json_scalar(&value).ok_or_else(|| {
                Error::ConfigJsonParse(format!("unsupported value for flag '{key}': {value}"))
            })?;
            values.push((key, value));
        }
        return Ok(config_from_values(values));
    }

    serde_json::from_value(value).map_err(|err| Error::ConfigJsonParse(err.to_string()))
}

fn config_from_values(values: impl IntoIterator<Item = (String, SettingValue)>) -> Config {
    Config {
        preferences: None,
        settings: values
            .into_iter()
            .map(|(key, value)| (key, Setting::from_value(value)))
            .collect(),
        segments: Vec::new(),
    }
}

/// Combine local and remote config according to `behaviour`. Segments and preferences always
/// come from the remote config, unless only local values are used.
pub(crate) fn merge(
    behaviour: OverrideBehaviour,
    local: &Arc<Config>,
    remote: &Arc<Config>,
) -> Arc<Config> {
    let (base, winner) = match behaviour {
        OverrideBehaviour::LocalOnly => return local.clone(),
        OverrideBehaviour::LocalOverRemote => (remote, local),
        OverrideBehaviour::RemoteOverLocal => (local, remote),
    };
    if local.settings.is_empty() {
        return remote.clone();
    }

    let mut settings = base.settings.clone();
    settings.extend(
        winner
            .settings
            .iter()
            .map(|(key, setting)| (key.clone(), setting.clone())),
    );
    Arc::new(Config {
        preferences: remote.preferences.clone(),
        settings,
        segments: remote.segments.clone(),
    })
}
