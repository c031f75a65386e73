use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use derive_more::From;
use serde::Serialize;

/// User object: the evaluation context for targeting rules and percentage options.
///
/// ```
/// # use configcat::User;
/// let user = User::new("435170f4-8a8b-4b67-a723-505ac7cdea92")
///     .email("john@example.com")
///     .country("Hungary")
///     .custom("SubscriptionType", "Pro")
///     .custom("Age", 42.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    identifier: String,
    email: Option<String>,
    country: Option<String>,
    custom: BTreeMap<String, UserAttributeValue>,
}

/// Value of a user attribute.
#[derive(Debug, Clone, PartialEq, From, Serialize)]
#[serde(untagged)]
pub enum UserAttributeValue {
    /// Text value.
    String(String),
    /// Decimal number.
    Number(f64),
    /// Whole number.
    Int(i64),
    /// Point in time. Compared as Unix seconds.
    DateTime(DateTime<Utc>),
    /// List of strings, used by the array comparators.
    StringList(Vec<String>),
}

impl From<&str> for UserAttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<i32> for UserAttributeValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<Vec<&str>> for UserAttributeValue {
    fn from(value: Vec<&str>) -> Self {
        Self::StringList(value.into_iter().map(str::to_owned).collect())
    }
}

impl User {
    /// Attribute name of the identifier.
    pub const IDENTIFIER: &'static str = "Identifier";
    /// Attribute name of the email address.
    pub const EMAIL: &'static str = "Email";
    /// Attribute name of the country.
    pub const COUNTRY: &'static str = "Country";

    /// Create a user with the given identifier.
    pub fn new(identifier: impl Into<String>) -> User {
        User {
            identifier: identifier.into(),
            email: None,
            country: None,
            custom: BTreeMap::new(),
        }
    }

    /// Set the email address.
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the country.
    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    /// Set a custom attribute. Custom attributes named `Identifier`, `Email` or `Country` are
    /// shadowed by the built-in ones.
    pub fn custom(mut self, name: impl Into<String>, value: impl Into<UserAttributeValue>) -> Self {
        self.custom.insert(name.into(), value.into());
        self
    }

    /// The identifier.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Look up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<UserAttributeValue> {
        match name {
            User::IDENTIFIER => Some(UserAttributeValue::String(self.identifier.clone())),
            User::EMAIL if self.email.is_some() => self.email.clone().map(Into::into),
            User::COUNTRY if self.country.is_some() => self.country.clone().map(Into::into),
            _ => self.custom.get(name).cloned(),
        }
    }

    fn attributes(&self) -> impl Iterator<Item = (&str, UserAttributeValue)> + '_ {
        let builtin = [
            (User::IDENTIFIER, Some(self.identifier.clone())),
            (User::EMAIL, self.email.clone()),
            (User::COUNTRY, self.country.clone()),
        ];
        builtin
            .into_iter()
            .filter_map(|(name, value)| Some((name, UserAttributeValue::String(value?))))
            .chain(
                self.custom
                    .iter()
                    .filter(|(name, _)| match name.as_str() {
                        User::IDENTIFIER => false,
                        User::EMAIL => self.email.is_none(),
                        User::COUNTRY => self.country.is_none(),
                        _ => true,
                    })
                    .map(|(name, value)| (name.as_str(), value.clone())),
            )
    }
}

/// Renders the user as a JSON object, built-in attributes first.
impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.attributes().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            let name = serde_json::to_string(name).map_err(|_| fmt::Error)?;
            let value = serde_json::to_string(&value).map_err(|_| fmt::Error)?;
            write!(f, "{name}:{value}")?;
        }
        f.write_str("}")
    }
}

impl UserAttributeValue {
    /// Canonical text form used by text comparators and percentage bucketing.
    ///
    /// Returns `None` for text values, which don't need any conversion.
    pub(crate) fn converted_text(&self) -> Option<String> {
        match self {
            UserAttributeValue::String(_) => None,
            UserAttributeValue::Number(n) => Some(format_number(*n)),
            UserAttributeValue::Int(i) => Some(i.to_string()),
            UserAttributeValue::DateTime(dt) => Some(format_number(unix_seconds(dt))),
            UserAttributeValue::StringList(list) => serde_json::to_string(list).ok(),
        }
    }

    /// Text form of the value, converting non-text values.
    pub(crate) fn to_text(&self) -> String {
        match self {
            UserAttributeValue::String(s) => s.clone(),
            other => other.converted_text().unwrap_or_default(),
        }
    }
}

/// Seconds since Unix epoch with millisecond precision.
pub(crate) fn unix_seconds(dt: &DateTime<Utc>) -> f64 {
    dt.timestamp_millis() as f64 / 1000.0
}

/// Format a number the same way across all SDKs: positional notation between `1e-6` and `1e21`,
/// exponential notation (`1e+21`, `1e-7`) outside of that range.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    let abs = n.abs();
    if abs == 0.0 || (1e-6..1e21).contains(&abs) {
        return format!("{n}");
    }
    let formatted = format!("{n:e}");
    if abs > 1.0 {
        formatted.replacen('e', "e+", 1)
    } else {
        formatted
    }
}
