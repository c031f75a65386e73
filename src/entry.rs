use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};

use crate::{model::Config, Error, Result};

/// One snapshot of config JSON: the parsed document, its ETag, the raw JSON text and the time it
/// was fetched.
///
/// Entries are immutable. The config service replaces the current entry instead of mutating it,
/// so readers holding an `Arc<Entry>` are never affected by updates.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Parsed config JSON.
    pub config: Arc<Config>,
    /// ETag returned by the CDN. Empty only for the empty entry.
    pub etag: String,
    /// Raw config JSON text.
    pub config_json: String,
    /// Time of the last successful fetch (or "not modified" response). Millisecond precision.
    pub fetch_time: DateTime<Utc>,
}

impl Entry {
    /// Create an entry, truncating `fetch_time` to milliseconds.
    pub fn new(
        config: Config,
        etag: impl Into<String>,
        config_json: impl Into<String>,
        fetch_time: DateTime<Utc>,
    ) -> Entry {
        Entry {
            config: Arc::new(config),
            etag: etag.into(),
            config_json: config_json.into(),
            fetch_time: fetch_time.trunc_subsecs(3),
        }
    }

    /// Entry representing "nothing fetched or cached yet".
    pub fn empty() -> Entry {
        Entry {
            config: Arc::new(Config::default()),
            etag: String::new(),
            config_json: String::new(),
            fetch_time: DateTime::<Utc>::MIN_UTC,
        }
    }

    /// Whether this is the empty entry.
    pub fn is_empty(&self) -> bool {
        self.etag.is_empty()
    }

    /// Copy of this entry with a new fetch time. The parsed config is shared.
    pub fn with_fetch_time(&self, fetch_time: DateTime<Utc>) -> Entry {
        Entry {
            config: Arc::clone(&self.config),
            etag: self.etag.clone(),
            config_json: self.config_json.clone(),
            fetch_time: fetch_time.trunc_subsecs(3),
        }
    }

    /// Serialize into the cross-SDK cache format: `"<fetch time millis>\n<etag>\n<json>"`.
    pub fn serialize(&self) -> String {
        format!(
            "{}\n{}\n{}",
            self.fetch_time.timestamp_millis(),
            self.etag,
            self.config_json
        )
    }

    /// Parse the cache format. The fetch time may be either epoch milliseconds or an HTTP date
    /// (RFC 1123).
    pub fn deserialize(value: &str) -> Result<Entry> {
        let mut parts = value.splitn(3, '\n');
        let (Some(time), Some(etag), Some(config_json)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::ConfigJsonParse(
                "number of values is fewer than expected".to_owned(),
            ));
        };

        let fetch_time = parse_fetch_time(time).ok_or_else(|| {
            Error::ConfigJsonParse(format!("invalid fetch time: {time}"))
        })?;

        if etag.is_empty() {
            return Err(Error::ConfigJsonParse("empty eTag value".to_owned()));
        }

        if config_json.is_empty() {
            return Err(Error::ConfigJsonParse("empty config JSON".to_owned()));
        }

        let config = Config::from_json(config_json)
            .map_err(|err| Error::ConfigJsonParse(format!("invalid config JSON content: {err}")))?;

        Ok(Entry::new(config, etag, config_json, fetch_time))
    }

    /// Read a cached value, falling back to the empty entry if there's nothing usable. Parse
    /// errors are logged.
    pub(crate) fn from_cache(value: Option<&str>) -> Entry {
        let Some(value) = value.filter(|value| !value.is_empty()) else {
            return Entry::empty();
        };
        match Entry::deserialize(value) {
            Ok(entry) => entry,
            Err(err) => {
                log::error!(target: "configcat", event_id = 2200; "Error occurred while reading the cache. {err}");
                Entry::empty()
            }
        }
    }
}

fn parse_fetch_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(millis) = value.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis);
    }
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|time| time.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const JSON: &str = r#"{"p":{"u":"https://cdn-global.configcat.com","r":0,"s":"salt"},"f":{"flag":{"t":0,"v":{"b":true}}}}"#;

    #[test]
    fn serialize_and_deserialize() {
        let fetch_time = Utc.timestamp_millis_opt(1_686_756_435_844).unwrap();
        let entry = Entry::new(Config::from_json(JSON).unwrap(), "etag", JSON, fetch_time);

        let serialized = entry.serialize();
        assert_eq!(serialized, format!("1686756435844\netag\n{JSON}"));
        assert_eq!(Entry::deserialize(&serialized).unwrap(), entry);
    }

    #[test]
    fn fetch_time_is_truncated_to_millis() {
        let fetch_time = Utc.timestamp_nanos(1_686_756_435_844_123_456);
        let entry = Entry::new(Config::default(), "etag", "{}", fetch_time);
        assert_eq!(entry.fetch_time.timestamp_subsec_nanos(), 844_000_000);
        assert_eq!(
            Entry::deserialize(&entry.serialize()).unwrap().fetch_time,
            entry.fetch_time
        );
    }

    #[test]
    fn deserialize_http_date() {
        let entry = Entry::deserialize(&format!("Wed, 14 Jun 2023 15:27:15 GMT\netag\n{JSON}"))
            .unwrap();
        assert_eq!(
            entry.fetch_time,
            Utc.with_ymd_and_hms(2023, 6, 14, 15, 27, 15).unwrap()
        );
    }

    #[test]
    fn json_may_contain_newlines() {
        let json = "{\n\"f\": {}\n}";
        let entry = Entry::deserialize(&format!("1000\netag\n{json}")).unwrap();
        assert_eq!(entry.config_json, json);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for value in [
            "1000\netag",
            "not-a-time\netag\n{}",
            "1000\n\n{}",
            "1000\netag\n",
            "1000\netag\n{invalid",
        ] {
            assert!(Entry::deserialize(value).is_err(), "{value:?}");
        }
    }

    #[test]
    fn from_cache_falls_back_to_empty() {
        assert!(Entry::from_cache(None).is_empty());
        assert!(Entry::from_cache(Some("")).is_empty());
        assert!(Entry::from_cache(Some("garbage")).is_empty());
        assert!(!Entry::from_cache(Some(&format!("1000\netag\n{JSON}"))).is_empty());
    }
}
