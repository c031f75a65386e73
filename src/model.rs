//! Config JSON data model (config_v6 wire format).
//!
//! Field names follow the compact wire format used by the ConfigCat CDN. Each type is
//! deserialized directly with `serde`, while tagged unions that are encoded on the wire as
//! "objects with exactly one populated field" are converted through a private raw
//! representation.
use std::{collections::HashMap, fmt};

use derive_more::From;
use serde::{Deserialize, Serialize};

use crate::user::format_number;

/// Parsed config JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Document-level preferences. `None` only for documents that omit them (e.g. local
    /// overrides).
    #[serde(rename = "p", default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
    /// Settings by key.
    #[serde(rename = "f", default)]
    pub settings: HashMap<String, Setting>,
    /// Segments referenced by index from segment conditions.
    #[serde(rename = "s", default, skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<Segment>,
}

impl Config {
    /// Parse config JSON.
    pub fn from_json(json: &str) -> Result<Config, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Config salt used by hashed comparators.
    pub fn salt(&self) -> Option<&str> {
        self.preferences.as_ref()?.salt.as_deref()
    }
}

/// Document-level preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// Base URL the SDK should use for subsequent requests.
    #[serde(rename = "u", default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// How the SDK should treat `base_url`.
    #[serde(rename = "r", default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<RedirectMode>,
    /// Salt for hashed comparison values.
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

/// Redirect mode sent in [`Preferences`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RedirectMode {
    /// Stay on the current URL.
    No,
    /// The data governance setting of the client does not match the dashboard; move and warn.
    Should,
    /// Move to the given URL even if a custom URL is configured.
    Force,
}

impl TryFrom<u8> for RedirectMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RedirectMode::No),
            1 => Ok(RedirectMode::Should),
            2 => Ok(RedirectMode::Force),
            other => Err(format!("unknown redirect mode: {other}")),
        }
    }
}

impl From<RedirectMode> for u8 {
    fn from(value: RedirectMode) -> u8 {
        value as u8
    }
}

/// `TryParse` allows the subfield to fail parsing without failing the parsing of the whole
/// structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TryParse<T> {
    /// Successfully parsed value.
    Parsed(T),
    /// Raw JSON that could not be parsed as `T`.
    ParseFailed(serde_json::Value),
}

impl<T> From<T> for TryParse<T> {
    fn from(value: T) -> TryParse<T> {
        TryParse::Parsed(value)
    }
}

impl<'a, T> From<&'a TryParse<T>> for Option<&'a T> {
    fn from(value: &TryParse<T>) -> Option<&T> {
        match value {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(_) => None,
        }
    }
}

/// Declared type of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SettingType {
    /// On/off toggle.
    Boolean,
    /// Text setting.
    String,
    /// Whole number setting.
    Int,
    /// Decimal number setting.
    Double,
}

impl SettingType {
    /// Whether `value` has the shape this type requires.
    pub fn accepts(self, value: &SettingValue) -> bool {
        matches!(
            (self, value),
            (SettingType::Boolean, SettingValue::Bool(_))
                | (SettingType::String, SettingValue::String(_))
                | (SettingType::Int, SettingValue::Int(_))
                | (SettingType::Double, SettingValue::Double(_))
        )
    }
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SettingType::Boolean => "Boolean",
            SettingType::String => "String",
            SettingType::Int => "Int",
            SettingType::Double => "Double",
        })
    }
}

impl TryFrom<u8> for SettingType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SettingType::Boolean),
            1 => Ok(SettingType::String),
            2 => Ok(SettingType::Int),
            3 => Ok(SettingType::Double),
            other => Err(format!("unknown setting type: {other}")),
        }
    }
}

impl From<SettingType> for u8 {
    fn from(value: SettingType) -> u8 {
        value as u8
    }
}

/// A served value. Exactly one of the four typed values.
#[derive(Debug, Clone, PartialEq, From, Serialize, Deserialize)]
#[serde(try_from = "RawSettingValue", into = "RawSettingValue")]
pub enum SettingValue {
    /// Boolean value.
    Bool(bool),
    /// Text value.
    String(String),
    /// Whole number value.
    Int(i64),
    /// Decimal number value.
    Double(f64),
}

impl SettingValue {
    /// The setting type this value belongs to.
    pub fn setting_type(&self) -> SettingType {
        match self {
            SettingValue::Bool(_) => SettingType::Boolean,
            SettingValue::String(_) => SettingType::String,
            SettingValue::Int(_) => SettingType::Int,
            SettingValue::Double(_) => SettingType::Double,
        }
    }

    /// Convert a plain JSON scalar (as found in flag override files) to a setting value.
    pub fn from_json_scalar(value: &serde_json::Value) -> Option<SettingValue> {
        match value {
            serde_json::Value::Bool(b) => Some(SettingValue::Bool(*b)),
            serde_json::Value::String(s) => Some(SettingValue::String(s.clone())),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(SettingValue::Int(i)),
                None => n.as_f64().map(SettingValue::Double),
            },
            _ => None,
        }
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(b) => write!(f, "{b}"),
            SettingValue::String(s) => f.write_str(s),
            SettingValue::Int(i) => write!(f, "{i}"),
            SettingValue::Double(d) => f.write_str(&format_number(*d)),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawSettingValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    b: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    s: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    i: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    d: Option<f64>,
}

impl TryFrom<RawSettingValue> for SettingValue {
    type Error = &'static str;

    fn try_from(raw: RawSettingValue) -> Result<Self, Self::Error> {
        match raw {
            RawSettingValue {
                b: Some(b),
                s: None,
                i: None,
                d: None,
            } => Ok(SettingValue::Bool(b)),
            RawSettingValue {
                b: None,
                s: Some(s),
                i: None,
                d: None,
            } => Ok(SettingValue::String(s)),
            RawSettingValue {
                b: None,
                s: None,
                i: Some(i),
                d: None,
            } => Ok(SettingValue::Int(i)),
            RawSettingValue {
                b: None,
                s: None,
                i: None,
                d: Some(d),
            } => Ok(SettingValue::Double(d)),
            _ => Err("setting value must have exactly one of `b`, `s`, `i`, `d`"),
        }
    }
}

impl From<SettingValue> for RawSettingValue {
    fn from(value: SettingValue) -> Self {
        let mut raw = RawSettingValue::default();
        match value {
            SettingValue::Bool(b) => raw.b = Some(b),
            SettingValue::String(s) => raw.s = Some(s),
            SettingValue::Int(i) => raw.i = Some(i),
            SettingValue::Double(d) => raw.d = Some(d),
        }
        raw
    }
}

/// One feature flag or setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    /// Declared type.
    #[serde(rename = "t")]
    pub setting_type: SettingType,
    /// User attribute used for percentage bucketing. Defaults to the identifier.
    #[serde(rename = "a", default, skip_serializing_if = "Option::is_none")]
    pub percentage_attribute: Option<String>,
    /// Targeting rules, evaluated in order.
    #[serde(rename = "r", default, skip_serializing_if = "Vec::is_empty")]
    pub targeting_rules: Vec<TargetingRule>,
    /// Top-level percentage options.
    #[serde(rename = "p", default, skip_serializing_if = "Vec::is_empty")]
    pub percentage_options: Vec<PercentageOption>,
    /// Default value.
    #[serde(rename = "v")]
    pub value: SettingValue,
    /// Variation id of the default value.
    #[serde(rename = "i", default, skip_serializing_if = "Option::is_none")]
    pub variation_id: Option<String>,
}

impl Setting {
    /// A setting that serves `value` unconditionally.
    pub fn from_value(value: SettingValue) -> Setting {
        Setting {
            setting_type: value.setting_type(),
            percentage_attribute: None,
            targeting_rules: Vec::new(),
            percentage_options: Vec::new(),
            value,
            variation_id: None,
        }
    }
}

/// AND'd list of conditions with a consequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetingRule {
    /// Conditions; all must hold.
    #[serde(rename = "c", default)]
    pub conditions: Vec<Condition>,
    /// Value served when the rule matches.
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub served_value: Option<ServedValue>,
    /// Percentage options evaluated when the rule matches.
    #[serde(rename = "p", default, skip_serializing_if = "Option::is_none")]
    pub percentage_options: Option<Vec<PercentageOption>>,
}

/// Value served by a targeting rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServedValue {
    /// Served value.
    #[serde(rename = "v")]
    pub value: SettingValue,
    /// Variation id of the served value.
    #[serde(rename = "i", default, skip_serializing_if = "Option::is_none")]
    pub variation_id: Option<String>,
}

/// Weighted bucket of a setting's possible values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentageOption {
    /// Weight in the `0..=100` range.
    #[serde(rename = "p")]
    pub percentage: u32,
    /// Served value.
    #[serde(rename = "v")]
    pub value: SettingValue,
    /// Variation id of the served value.
    #[serde(rename = "i", default, skip_serializing_if = "Option::is_none")]
    pub variation_id: Option<String>,
}

/// A single condition of a targeting rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCondition", into = "RawCondition")]
pub enum Condition {
    /// Compares a user attribute.
    User(UserCondition),
    /// Checks segment membership.
    Segment(SegmentCondition),
    /// Checks the value of another flag.
    Prerequisite(PrerequisiteFlagCondition),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    u: Option<UserCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    s: Option<SegmentCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    p: Option<PrerequisiteFlagCondition>,
}

impl TryFrom<RawCondition> for Condition {
    type Error = &'static str;

    fn try_from(raw: RawCondition) -> Result<Self, Self::Error> {
        match raw {
            RawCondition {
                u: Some(u),
                s: None,
                p: None,
            } => Ok(Condition::User(u)),
            RawCondition {
                u: None,
                s: Some(s),
                p: None,
            } => Ok(Condition::Segment(s)),
            RawCondition {
                u: None,
                s: None,
                p: Some(p),
            } => Ok(Condition::Prerequisite(p)),
            _ => Err("condition must have exactly one of `u`, `s`, `p`"),
        }
    }
}

impl From<Condition> for RawCondition {
    fn from(value: Condition) -> Self {
        let mut raw = RawCondition::default();
        match value {
            Condition::User(u) => raw.u = Some(u),
            Condition::Segment(s) => raw.s = Some(s),
            Condition::Prerequisite(p) => raw.p = Some(p),
        }
        raw
    }
}

/// Compares a user attribute against a comparison value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCondition {
    /// Name of the user attribute.
    #[serde(rename = "a")]
    pub attribute: String,
    /// Comparator. Comparators unknown to this SDK are kept unparsed so that the rest of the
    /// document stays usable.
    #[serde(rename = "c")]
    pub comparator: TryParse<UserComparator>,
    /// Single text comparison value.
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    /// Single number comparison value.
    #[serde(rename = "d", default, skip_serializing_if = "Option::is_none")]
    pub number_value: Option<f64>,
    /// List comparison value.
    #[serde(rename = "l", default, skip_serializing_if = "Option::is_none")]
    pub string_list_value: Option<Vec<String>>,
}

/// Checks whether the user is in a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentCondition {
    /// Index into [`Config::segments`].
    #[serde(rename = "s")]
    pub segment_index: usize,
    /// Comparator.
    #[serde(rename = "c")]
    pub comparator: SegmentComparator,
}

/// Named, reusable list of user conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Name, also used as the context salt of hashed conditions.
    #[serde(rename = "n", default)]
    pub name: String,
    /// Conditions; all must hold.
    #[serde(rename = "r", default)]
    pub conditions: Vec<UserCondition>,
}

/// Checks the evaluated value of another flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrerequisiteFlagCondition {
    /// Key of the prerequisite flag.
    #[serde(rename = "f")]
    pub flag_key: String,
    /// Comparator.
    #[serde(rename = "c")]
    pub comparator: PrerequisiteComparator,
    /// Value to compare the prerequisite flag's value with.
    #[serde(rename = "v")]
    pub value: SettingValue,
}

/// Segment condition comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SegmentComparator {
    /// IS IN SEGMENT
    IsIn,
    /// IS NOT IN SEGMENT
    IsNotIn,
}

impl SegmentComparator {
    /// Display name used in evaluation logs.
    pub fn name(self) -> &'static str {
        match self {
            SegmentComparator::IsIn => "IS IN SEGMENT",
            SegmentComparator::IsNotIn => "IS NOT IN SEGMENT",
        }
    }
}

impl TryFrom<u8> for SegmentComparator {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SegmentComparator::IsIn),
            1 => Ok(SegmentComparator::IsNotIn),
            other => Err(format!("unknown segment comparator: {other}")),
        }
    }
}

impl From<SegmentComparator> for u8 {
    fn from(value: SegmentComparator) -> u8 {
        value as u8
    }
}

/// Prerequisite flag condition comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PrerequisiteComparator {
    /// EQUALS
    Equals,
    /// NOT EQUALS
    NotEquals,
}

impl PrerequisiteComparator {
    /// Display name used in evaluation logs.
    pub fn name(self) -> &'static str {
        match self {
            PrerequisiteComparator::Equals => "EQUALS",
            PrerequisiteComparator::NotEquals => "NOT EQUALS",
        }
    }
}

impl TryFrom<u8> for PrerequisiteComparator {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PrerequisiteComparator::Equals),
            1 => Ok(PrerequisiteComparator::NotEquals),
            other => Err(format!("unknown prerequisite comparator: {other}")),
        }
    }
}

impl From<PrerequisiteComparator> for u8 {
    fn from(value: PrerequisiteComparator) -> u8 {
        value as u8
    }
}

/// User condition comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[allow(missing_docs)]
pub enum UserComparator {
    IsOneOf = 0,
    IsNotOneOf = 1,
    ContainsAnyOf = 2,
    NotContainsAnyOf = 3,
    SemverIsOneOf = 4,
    SemverIsNotOneOf = 5,
    SemverLess = 6,
    SemverLessOrEquals = 7,
    SemverGreater = 8,
    SemverGreaterOrEquals = 9,
    NumberEquals = 10,
    NumberNotEquals = 11,
    NumberLess = 12,
    NumberLessOrEquals = 13,
    NumberGreater = 14,
    NumberGreaterOrEquals = 15,
    SensitiveIsOneOf = 16,
    SensitiveIsNotOneOf = 17,
    DateBefore = 18,
    DateAfter = 19,
    HashedEquals = 20,
    HashedNotEquals = 21,
    HashedStartsWithAnyOf = 22,
    HashedNotStartsWithAnyOf = 23,
    HashedEndsWithAnyOf = 24,
    HashedNotEndsWithAnyOf = 25,
    HashedArrayContainsAnyOf = 26,
    HashedArrayNotContainsAnyOf = 27,
    TextEquals = 28,
    TextNotEquals = 29,
    TextStartsWithAnyOf = 30,
    TextNotStartsWithAnyOf = 31,
    TextEndsWithAnyOf = 32,
    TextNotEndsWithAnyOf = 33,
    TextArrayContainsAnyOf = 34,
    TextArrayNotContainsAnyOf = 35,
}

const USER_COMPARATORS: [UserComparator; 36] = {
    use UserComparator::*;
    [
        IsOneOf,
        IsNotOneOf,
        ContainsAnyOf,
        NotContainsAnyOf,
        SemverIsOneOf,
        SemverIsNotOneOf,
        SemverLess,
        SemverLessOrEquals,
        SemverGreater,
        SemverGreaterOrEquals,
        NumberEquals,
        NumberNotEquals,
        NumberLess,
        NumberLessOrEquals,
        NumberGreater,
        NumberGreaterOrEquals,
        SensitiveIsOneOf,
        SensitiveIsNotOneOf,
        DateBefore,
        DateAfter,
        HashedEquals,
        HashedNotEquals,
        HashedStartsWithAnyOf,
        HashedNotStartsWithAnyOf,
        HashedEndsWithAnyOf,
        HashedNotEndsWithAnyOf,
        HashedArrayContainsAnyOf,
        HashedArrayNotContainsAnyOf,
        TextEquals,
        TextNotEquals,
        TextStartsWithAnyOf,
        TextNotStartsWithAnyOf,
        TextEndsWithAnyOf,
        TextNotEndsWithAnyOf,
        TextArrayContainsAnyOf,
        TextArrayNotContainsAnyOf,
    ]
};

impl UserComparator {
    /// Display name used in evaluation logs.
    pub fn name(self) -> &'static str {
        use UserComparator::*;
        match self {
            IsOneOf | SemverIsOneOf | SensitiveIsOneOf => "IS ONE OF",
            IsNotOneOf | SemverIsNotOneOf | SensitiveIsNotOneOf => "IS NOT ONE OF",
            ContainsAnyOf => "CONTAINS ANY OF",
            NotContainsAnyOf => "NOT CONTAINS ANY OF",
            SemverLess | NumberLess => "<",
            SemverLessOrEquals | NumberLessOrEquals => "<=",
            SemverGreater | NumberGreater => ">",
            SemverGreaterOrEquals | NumberGreaterOrEquals => ">=",
            NumberEquals => "=",
            NumberNotEquals => "!=",
            DateBefore => "BEFORE",
            DateAfter => "AFTER",
            HashedEquals | TextEquals => "EQUALS",
            HashedNotEquals | TextNotEquals => "NOT EQUALS",
            HashedStartsWithAnyOf | TextStartsWithAnyOf => "STARTS WITH ANY OF",
            HashedNotStartsWithAnyOf | TextNotStartsWithAnyOf => "NOT STARTS WITH ANY OF",
            HashedEndsWithAnyOf | TextEndsWithAnyOf => "ENDS WITH ANY OF",
            HashedNotEndsWithAnyOf | TextNotEndsWithAnyOf => "NOT ENDS WITH ANY OF",
            HashedArrayContainsAnyOf | TextArrayContainsAnyOf => "ARRAY CONTAINS ANY OF",
            HashedArrayNotContainsAnyOf | TextArrayNotContainsAnyOf => "ARRAY NOT CONTAINS ANY OF",
        }
    }

    /// Whether comparison values are salted SHA-256 hashes.
    pub fn is_sensitive(self) -> bool {
        use UserComparator::*;
        matches!(
            self,
            SensitiveIsOneOf
                | SensitiveIsNotOneOf
                | HashedEquals
                | HashedNotEquals
                | HashedStartsWithAnyOf
                | HashedNotStartsWithAnyOf
                | HashedEndsWithAnyOf
                | HashedNotEndsWithAnyOf
                | HashedArrayContainsAnyOf
                | HashedArrayNotContainsAnyOf
        )
    }
}

impl TryFrom<u8> for UserComparator {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        USER_COMPARATORS
            .get(usize::from(value))
            .copied()
            .ok_or_else(|| format!("unknown user comparator: {value}"))
    }
}

impl From<UserComparator> for u8 {
    fn from(value: UserComparator) -> u8 {
        value as u8
    }
}

#[cfg(test)]
mod tests {
    use std::{fs::File, io::BufReader};

    use super::*;

    #[test]
    fn parse_test_config() {
        let f = File::open("tests/data/config/test_config.json")
            .expect("Failed to open tests/data/config/test_config.json");
        let config: Config = serde_json::from_reader(BufReader::new(f)).unwrap();
        assert_eq!(config.salt(), Some("test-salt"));
        assert_eq!(config.segments.len(), 1);
        assert!(config.settings.contains_key("stringPercentageFlag"));
    }

    #[test]
    fn parse_minimal_document() {
        let config = Config::from_json(r#"{"f":{"k":{"v":{"s":"x"},"t":1,"p":[],"r":[]}}}"#)
            .unwrap();
        let setting = &config.settings["k"];
        assert_eq!(setting.setting_type, SettingType::String);
        assert_eq!(setting.value, SettingValue::String("x".to_owned()));
        assert_eq!(config.preferences, None);
    }

    #[test]
    fn setting_value_requires_exactly_one_field() {
        assert!(serde_json::from_str::<SettingValue>(r#"{"b":true,"s":"x"}"#).is_err());
        assert!(serde_json::from_str::<SettingValue>(r#"{}"#).is_err());
        assert_eq!(
            serde_json::from_str::<SettingValue>(r#"{"d":1.5}"#).unwrap(),
            SettingValue::Double(1.5)
        );
    }

    #[test]
    fn condition_requires_exactly_one_variant() {
        let both = r#"{"u":{"a":"Email","c":28,"s":"a"},"s":{"s":0,"c":0}}"#;
        assert!(serde_json::from_str::<Condition>(both).is_err());

        let segment = serde_json::from_str::<Condition>(r#"{"s":{"s":0,"c":1}}"#).unwrap();
        assert_eq!(
            segment,
            Condition::Segment(SegmentCondition {
                segment_index: 0,
                comparator: SegmentComparator::IsNotIn,
            })
        );
    }

    #[test]
    fn parse_partially_if_unknown_comparator() {
        let condition: UserCondition =
            serde_json::from_str(r#"{"a":"Email","c":99,"s":"x"}"#).unwrap();
        assert!(matches!(condition.comparator, TryParse::ParseFailed(_)));

        let condition: UserCondition =
            serde_json::from_str(r#"{"a":"Email","c":34,"l":["x"]}"#).unwrap();
        assert_eq!(
            condition.comparator,
            TryParse::Parsed(UserComparator::TextArrayContainsAnyOf)
        );
    }

    #[test]
    fn comparator_ids_are_stable() {
        for id in 0..36u8 {
            let comparator = UserComparator::try_from(id).unwrap();
            assert_eq!(u8::from(comparator), id);
        }
        assert!(UserComparator::try_from(36).is_err());
        assert_eq!(UserComparator::NumberNotEquals.name(), "!=");
        assert!(UserComparator::HashedArrayContainsAnyOf.is_sensitive());
        assert!(!UserComparator::TextArrayContainsAnyOf.is_sensitive());
    }

    #[test]
    fn serialization_keeps_wire_format() {
        let json = r#"{"p":{"s":"salt"},"f":{"flag":{"t":0,"v":{"b":true},"i":"v1"}}}"#;
        let config = Config::from_json(json).unwrap();
        let serialized = serde_json::to_string(&config).unwrap();
        assert_eq!(Config::from_json(&serialized).unwrap(), config);
    }
}
