//! User condition comparators.
use std::cmp::Ordering;

use semver::Version;
use sha2::{Digest, Sha256};

use crate::{
    model::{TryParse, UserComparator, UserCondition},
    user::{unix_seconds, UserAttributeValue},
};

use super::{
    context::EvaluationContext,
    trace::{Trace, UserConditionText},
    EvaluationError,
};

type Result<T> = std::result::Result<T, EvaluationError>;

/// Evaluate a user condition. `context_salt` is the flag key, or the segment name for conditions
/// of a segment.
pub(super) fn evaluate_user_condition(
    condition: &UserCondition,
    context_salt: &str,
    config_salt: Option<&str>,
    ctx: &mut EvaluationContext,
    trace: &mut Trace,
) -> Result<bool> {
    let comparator = match &condition.comparator {
        TryParse::Parsed(comparator) => *comparator,
        TryParse::ParseFailed(_) => return Err(EvaluationError::ComparisonOperatorInvalid),
    };
    trace.append(UserConditionText(condition, comparator));

    let Some(user) = ctx.user else {
        ctx.log_user_missing();
        return Err(EvaluationError::UserMissing);
    };

    let attribute = condition.attribute.as_str();
    let value = match user.attribute(attribute) {
        Some(UserAttributeValue::String(s)) if s.is_empty() => None,
        value => value,
    };
    let Some(value) = value else {
        log::warn!(target: "configcat", event_id = 3003;
            "Cannot evaluate condition ({}) for setting '{}' (the User.{attribute} attribute is missing). You should set the User.{attribute} attribute in order to make targeting work properly. Read more: https://configcat.com/docs/advanced/user-object/",
            UserConditionText(condition, comparator), ctx.key);
        return Err(EvaluationError::AttributeMissing(attribute.to_owned()));
    };

    let comparison = Comparison {
        condition,
        comparator,
        context_salt,
        config_salt,
        key: ctx.key,
    };

    use UserComparator::*;
    match comparator {
        IsOneOf | IsNotOneOf | SensitiveIsOneOf | SensitiveIsNotOneOf => {
            let text = comparison.text(&value);
            let list = comparison.list_value()?;
            let found = if comparator.is_sensitive() {
                let hash = comparison.hash(text.as_bytes())?;
                list.iter().any(|item| *item == hash)
            } else {
                list.iter().any(|item| *item == text)
            };
            Ok(found ^ matches!(comparator, IsNotOneOf | SensitiveIsNotOneOf))
        }

        ContainsAnyOf | NotContainsAnyOf => {
            let text = comparison.text(&value);
            let found = comparison
                .list_value()?
                .iter()
                .any(|item| text.contains(item.as_str()));
            Ok(found ^ (comparator == NotContainsAnyOf))
        }

        TextEquals | TextNotEquals | HashedEquals | HashedNotEquals => {
            let text = comparison.text(&value);
            let expected = comparison.string_value()?;
            let equals = if comparator.is_sensitive() {
                comparison.hash(text.as_bytes())? == expected
            } else {
                text == expected
            };
            Ok(equals ^ matches!(comparator, TextNotEquals | HashedNotEquals))
        }

        TextStartsWithAnyOf | TextNotStartsWithAnyOf | TextEndsWithAnyOf
        | TextNotEndsWithAnyOf => {
            let text = comparison.text(&value);
            let starts = matches!(comparator, TextStartsWithAnyOf | TextNotStartsWithAnyOf);
            let found = comparison.list_value()?.iter().any(|item| {
                if starts {
                    text.starts_with(item.as_str())
                } else {
                    text.ends_with(item.as_str())
                }
            });
            Ok(found ^ matches!(comparator, TextNotStartsWithAnyOf | TextNotEndsWithAnyOf))
        }

        HashedStartsWithAnyOf | HashedNotStartsWithAnyOf | HashedEndsWithAnyOf
        | HashedNotEndsWithAnyOf => {
            let text = comparison.text(&value);
            let bytes = text.as_bytes();
            let starts = matches!(comparator, HashedStartsWithAnyOf | HashedNotStartsWithAnyOf);
            let mut found = false;
            for item in comparison.list_value()? {
                let (length, hash) = item
                    .split_once('_')
                    .ok_or(EvaluationError::ComparisonValueInvalid)?;
                let length: usize = length
                    .parse()
                    .map_err(|_| EvaluationError::ComparisonValueInvalid)?;
                if bytes.len() < length {
                    continue;
                }
                let slice = if starts {
                    &bytes[..length]
                } else {
                    &bytes[bytes.len() - length..]
                };
                if comparison.hash(slice)? == hash {
                    found = true;
                    break;
                }
            }
            Ok(found ^ matches!(comparator, HashedNotStartsWithAnyOf | HashedNotEndsWithAnyOf))
        }

        SemverIsOneOf | SemverIsNotOneOf => {
            let version = comparison.semver(&value)?;
            let found = comparison
                .list_value()?
                .iter()
                .map(|item| item.trim())
                .filter(|item| !item.is_empty())
                // Invalid comparison values are skipped.
                .filter_map(|item| Version::parse(item).ok())
                .any(|other| version.cmp_precedence(&other) == Ordering::Equal);
            Ok(found ^ (comparator == SemverIsNotOneOf))
        }

        SemverLess | SemverLessOrEquals | SemverGreater | SemverGreaterOrEquals => {
            let version = comparison.semver(&value)?;
            // An invalid comparison value makes the condition false.
            let Ok(other) = Version::parse(comparison.string_value()?.trim()) else {
                return Ok(false);
            };
            let ordering = version.cmp_precedence(&other);
            Ok(match comparator {
                SemverLess => ordering == Ordering::Less,
                SemverLessOrEquals => ordering != Ordering::Greater,
                SemverGreater => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }

        NumberEquals | NumberNotEquals | NumberLess | NumberLessOrEquals | NumberGreater
        | NumberGreaterOrEquals => {
            let number = comparison.number(&value)?;
            let other = comparison.number_value()?;
            Ok(match comparator {
                NumberEquals => number == other,
                NumberNotEquals => number != other,
                NumberLess => number < other,
                NumberLessOrEquals => number <= other,
                NumberGreater => number > other,
                _ => number >= other,
            })
        }

        DateBefore | DateAfter => {
            let seconds = comparison.unix_seconds(&value)?;
            let other = comparison.number_value()?;
            Ok(if comparator == DateBefore {
                seconds < other
            } else {
                seconds > other
            })
        }

        TextArrayContainsAnyOf | TextArrayNotContainsAnyOf | HashedArrayContainsAnyOf
        | HashedArrayNotContainsAnyOf => {
            let items = comparison.string_list(&value)?;
            let list = comparison.list_value()?;
            let mut found = false;
            for item in &items {
                let item = if comparator.is_sensitive() {
                    comparison.hash(item.as_bytes())?
                } else {
                    item.clone()
                };
                if list.iter().any(|other| *other == item) {
                    found = true;
                    break;
                }
            }
            Ok(found ^ matches!(comparator, TextArrayNotContainsAnyOf | HashedArrayNotContainsAnyOf))
        }
    }
}

/// Everything a comparator needs besides the attribute value.
struct Comparison<'c> {
    condition: &'c UserCondition,
    comparator: UserComparator,
    context_salt: &'c str,
    config_salt: Option<&'c str>,
    key: &'c str,
}

impl Comparison<'_> {
    fn string_value(&self) -> Result<&str> {
        self.condition
            .string_value
            .as_deref()
            .ok_or(EvaluationError::ComparisonValueInvalid)
    }

    fn number_value(&self) -> Result<f64> {
        self.condition
            .number_value
            .ok_or(EvaluationError::ComparisonValueInvalid)
    }

    fn list_value(&self) -> Result<&[String]> {
        self.condition
            .string_list_value
            .as_deref()
            .ok_or(EvaluationError::ComparisonValueInvalid)
    }

    /// Salted SHA-256 of `value`, hex encoded.
    fn hash(&self, value: &[u8]) -> Result<String> {
        let salt = self.config_salt.ok_or(EvaluationError::SaltMissing)?;
        let mut hasher = Sha256::new();
        hasher.update(value);
        hasher.update(salt.as_bytes());
        hasher.update(self.context_salt.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }

    /// Text form of the attribute. Non-text values are converted with a warning.
    fn text(&self, value: &UserAttributeValue) -> String {
        match value {
            UserAttributeValue::String(s) => s.clone(),
            other => {
                let text = other.to_text();
                log::warn!(target: "configcat", event_id = 3005;
                    "Evaluation of condition ({}) for setting '{}' may not produce the expected result (the User.{} attribute is not a string value, thus it was automatically converted to the string value '{text}'). Please make sure that using a non-string value was intended.",
                    UserConditionText(self.condition, self.comparator), self.key, self.condition.attribute);
                text
            }
        }
    }

    fn semver(&self, value: &UserAttributeValue) -> Result<Version> {
        let version = match value {
            UserAttributeValue::String(s) => Version::parse(s.trim()).ok(),
            _ => None,
        };
        version.ok_or_else(|| self.invalid(value, "is not a valid semantic version"))
    }

    fn number(&self, value: &UserAttributeValue) -> Result<f64> {
        let number = match value {
            UserAttributeValue::Number(n) => Some(*n),
            UserAttributeValue::Int(i) => Some(*i as f64),
            UserAttributeValue::String(s) => parse_number(s),
            _ => None,
        };
        number.ok_or_else(|| self.invalid(value, "is not a valid decimal number"))
    }

    fn unix_seconds(&self, value: &UserAttributeValue) -> Result<f64> {
        let seconds = match value {
            UserAttributeValue::DateTime(dt) => Some(unix_seconds(dt)),
            UserAttributeValue::Number(n) => Some(*n),
            UserAttributeValue::Int(i) => Some(*i as f64),
            UserAttributeValue::String(s) => parse_number(s),
            UserAttributeValue::StringList(_) => None,
        };
        seconds.ok_or_else(|| {
            self.invalid(
                value,
                "is not a valid Unix timestamp (number of seconds elapsed since Unix epoch)",
            )
        })
    }

    fn string_list(&self, value: &UserAttributeValue) -> Result<Vec<String>> {
        let list = match value {
            UserAttributeValue::StringList(list) => Some(list.clone()),
            UserAttributeValue::String(s) => serde_json::from_str(s).ok(),
            _ => None,
        };
        list.ok_or_else(|| self.invalid(value, "is not a valid string array"))
    }

    fn invalid(&self, value: &UserAttributeValue, what: &str) -> EvaluationError {
        let reason = format!("'{}' {what}", value.to_text());
        log::warn!(target: "configcat", event_id = 3004;
            "Cannot evaluate condition ({}) for setting '{}' ({reason}). Please check the User.{} attribute and make sure that its value corresponds to the comparison operator.",
            UserConditionText(self.condition, self.comparator), self.key, self.condition.attribute);
        EvaluationError::AttributeInvalid {
            attribute: self.condition.attribute.clone(),
            reason,
        }
    }
}

/// Parse a decimal number, accepting `,` as decimal separator.
fn parse_number(value: &str) -> Option<f64> {
    value.trim().replace(',', ".").parse().ok()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{model::Setting, SettingValue, User};

    fn condition(
        attribute: &str,
        comparator: UserComparator,
        value: impl Into<ComparisonValue>,
    ) -> UserCondition {
        let mut condition = UserCondition {
            attribute: attribute.to_owned(),
            comparator: TryParse::Parsed(comparator),
            string_value: None,
            number_value: None,
            string_list_value: None,
        };
        match value.into() {
            ComparisonValue::String(s) => condition.string_value = Some(s),
            ComparisonValue::Number(n) => condition.number_value = Some(n),
            ComparisonValue::List(l) => condition.string_list_value = Some(l),
        }
        condition
    }

    enum ComparisonValue {
        String(String),
        Number(f64),
        List(Vec<String>),
    }
    impl From<&str> for ComparisonValue {
        fn from(value: &str) -> Self {
            Self::String(value.to_owned())
        }
    }
    impl From<f64> for ComparisonValue {
        fn from(value: f64) -> Self {
            Self::Number(value)
        }
    }
    impl From<Vec<&str>> for ComparisonValue {
        fn from(value: Vec<&str>) -> Self {
            Self::List(value.into_iter().map(str::to_owned).collect())
        }
    }

    fn eval(condition: &UserCondition, user: Option<&User>) -> Result<bool> {
        let setting = Setting::from_value(SettingValue::Bool(false));
        let mut visited = Vec::new();
        let mut ctx = EvaluationContext::new("flag", &setting, user, &mut visited);
        evaluate_user_condition(condition, "flag", Some("salt"), &mut ctx, &mut Trace::new(false))
    }

    fn matches(condition: &UserCondition, user: &User) -> bool {
        eval(condition, Some(user)).unwrap()
    }

    #[test]
    fn missing_user_and_attribute() {
        let c = condition("Email", UserComparator::TextEquals, "a@example.com");
        assert_eq!(eval(&c, None), Err(EvaluationError::UserMissing));
        assert_eq!(
            eval(&c, Some(&User::new("id"))),
            Err(EvaluationError::AttributeMissing("Email".to_owned()))
        );
        assert_eq!(
            eval(&c, Some(&User::new("id").email(""))),
            Err(EvaluationError::AttributeMissing("Email".to_owned()))
        );
    }

    #[test]
    fn unknown_comparator_is_structural_error() {
        let mut c = condition("Email", UserComparator::TextEquals, "x");
        c.comparator = TryParse::ParseFailed(serde_json::json!(99));
        let err = eval(&c, Some(&User::new("id"))).unwrap_err();
        assert_eq!(err, EvaluationError::ComparisonOperatorInvalid);
        assert!(!err.is_contextual());
    }

    #[test]
    fn missing_comparison_value_is_structural_error() {
        let c = condition("Email", UserComparator::IsOneOf, "not-a-list");
        assert_eq!(
            eval(&c, Some(&User::new("id").email("a"))),
            Err(EvaluationError::ComparisonValueInvalid)
        );
    }

    #[test]
    fn is_one_of() {
        let user = User::new("id").email("a@example.com");
        let c = condition("Email", UserComparator::IsOneOf, vec!["b@example.com", "a@example.com"]);
        assert!(matches(&c, &user));
        let c = condition("Email", UserComparator::IsNotOneOf, vec!["a@example.com"]);
        assert!(!matches(&c, &user));
    }

    #[test]
    fn contains_starts_ends_with() {
        let user = User::new("id").email("john@example.com");
        assert!(matches(
            &condition("Email", UserComparator::ContainsAnyOf, vec!["nope", "@example"]),
            &user
        ));
        assert!(matches(
            &condition("Email", UserComparator::NotContainsAnyOf, vec!["@test.com"]),
            &user
        ));
        assert!(matches(
            &condition("Email", UserComparator::TextStartsWithAnyOf, vec!["jo"]),
            &user
        ));
        assert!(!matches(
            &condition("Email", UserComparator::TextEndsWithAnyOf, vec![".org"]),
            &user
        ));
        assert!(matches(
            &condition("Email", UserComparator::TextNotEndsWithAnyOf, vec![".org"]),
            &user
        ));
    }

    #[test]
    fn hashed_comparators() {
        let user = User::new("id").email("a@example.com");
        let hash = "a48173a642e00dd79806c6489b0c6bdaa1102f174d0839243070595d7389ec73";
        assert!(matches(&condition("Email", UserComparator::HashedEquals, hash), &user));
        assert!(!matches(&condition("Email", UserComparator::HashedNotEquals, hash), &user));
        assert!(matches(
            &condition("Email", UserComparator::SensitiveIsOneOf, vec!["other", hash]),
            &user
        ));
    }

    #[test]
    fn hashed_starts_and_ends_with() {
        let user = User::new("id").email("john@example.com");
        let starts = "4_f99a9a6d481fd25ca012b998c808feffd0dbf1e005c713b0313fd055b62aac80";
        let ends = "4_965ddb6b696dbc6064172a0646bb2b05dc6f649b3ad4b09b6730556d17ba3f77";
        assert!(matches(
            &condition("Email", UserComparator::HashedStartsWithAnyOf, vec![starts]),
            &user
        ));
        assert!(matches(
            &condition("Email", UserComparator::HashedEndsWithAnyOf, vec![ends]),
            &user
        ));
        assert!(!matches(
            &condition("Email", UserComparator::HashedNotStartsWithAnyOf, vec![starts]),
            &user
        ));
        // Longer than the attribute: no match.
        assert!(!matches(
            &condition("Email", UserComparator::HashedStartsWithAnyOf, vec!["100_abc"]),
            &user
        ));
        assert_eq!(
            eval(
                &condition("Email", UserComparator::HashedStartsWithAnyOf, vec!["abc"]),
                Some(&user)
            ),
            Err(EvaluationError::ComparisonValueInvalid)
        );
    }

    #[test]
    fn only_semver_comparison_values_are_trimmed() {
        let user = User::new("12345")
            .email("a@example.com")
            .custom("Roles", vec!["reader", "admin"])
            .custom("Version", "1.0.0");
        let padded_hash = "  a48173a642e00dd79806c6489b0c6bdaa1102f174d0839243070595d7389ec73  ";
        let padded_role_hash =
            "  2454de65950590b707518212bb4c640560368075d4ef3b9437603f02a5f0da65  ";

        let untrimmed = [
            (UserComparator::IsOneOf, "Identifier", vec!["  12345  "], false),
            (UserComparator::IsNotOneOf, "Identifier", vec!["  12345  "], true),
            (UserComparator::ContainsAnyOf, "Identifier", vec!["  12345  "], false),
            (UserComparator::TextStartsWithAnyOf, "Identifier", vec!["  123"], false),
            (UserComparator::TextEndsWithAnyOf, "Identifier", vec!["345  "], false),
            (UserComparator::SensitiveIsOneOf, "Email", vec![padded_hash], false),
            (UserComparator::SensitiveIsNotOneOf, "Email", vec![padded_hash], true),
            (UserComparator::TextArrayContainsAnyOf, "Roles", vec!["  admin  "], false),
            (UserComparator::TextArrayNotContainsAnyOf, "Roles", vec!["  admin  "], true),
            (UserComparator::HashedArrayContainsAnyOf, "Roles", vec![padded_role_hash], false),
            (UserComparator::HashedArrayNotContainsAnyOf, "Roles", vec![padded_role_hash], true),
        ];
        for (comparator, attribute, value, expected) in untrimmed {
            assert_eq!(
                matches(&condition(attribute, comparator, value), &user),
                expected,
                "{comparator:?}"
            );
        }
        for (comparator, attribute, value, expected) in [
            (UserComparator::TextEquals, "Identifier", "  12345  ", false),
            (UserComparator::TextNotEquals, "Identifier", "  12345  ", true),
            (UserComparator::HashedEquals, "Email", padded_hash, false),
            (UserComparator::HashedNotEquals, "Email", padded_hash, true),
        ] {
            assert_eq!(
                matches(&condition(attribute, comparator, value), &user),
                expected,
                "{comparator:?}"
            );
        }

        // A padded `<length>_<hash>` cannot be parsed.
        let john = User::new("12345").email("john@example.com");
        let padded_starts = "  4_f99a9a6d481fd25ca012b998c808feffd0dbf1e005c713b0313fd055b62aac80  ";
        let padded_ends = "  4_965ddb6b696dbc6064172a0646bb2b05dc6f649b3ad4b09b6730556d17ba3f77  ";
        for (comparator, value) in [
            (UserComparator::HashedStartsWithAnyOf, padded_starts),
            (UserComparator::HashedNotStartsWithAnyOf, padded_starts),
            (UserComparator::HashedEndsWithAnyOf, padded_ends),
            (UserComparator::HashedNotEndsWithAnyOf, padded_ends),
        ] {
            assert_eq!(
                eval(&condition("Email", comparator, vec![value]), Some(&john)),
                Err(EvaluationError::ComparisonValueInvalid),
                "{comparator:?}"
            );
        }

        assert!(matches(
            &condition("Version", UserComparator::SemverIsOneOf, vec!["  1.0.0  "]),
            &user
        ));
        assert!(!matches(
            &condition("Version", UserComparator::SemverIsNotOneOf, vec!["  1.0.0  "]),
            &user
        ));
        for (comparator, value) in [
            (UserComparator::SemverLess, "  1.0.1  "),
            (UserComparator::SemverLessOrEquals, "  1.0.0  "),
            (UserComparator::SemverGreater, "  0.9.9  "),
            (UserComparator::SemverGreaterOrEquals, "  1.0.0  "),
        ] {
            assert!(matches(&condition("Version", comparator, value), &user), "{comparator:?}");
        }
    }

    #[test]
    fn hashed_comparator_needs_salt() {
        let setting = Setting::from_value(SettingValue::Bool(false));
        let mut visited = Vec::new();
        let user = User::new("id").email("a@example.com");
        let mut ctx = EvaluationContext::new("flag", &setting, Some(&user), &mut visited);
        let c = condition("Email", UserComparator::HashedEquals, "x");
        assert_eq!(
            evaluate_user_condition(&c, "flag", None, &mut ctx, &mut Trace::new(false)),
            Err(EvaluationError::SaltMissing)
        );
    }

    #[test]
    fn array_contains() {
        let user = User::new("id")
            .custom("Roles", vec!["reader", "admin"])
            .custom("RolesJson", r#"["reader","admin"]"#)
            .custom("Broken", "reader");
        assert!(matches(
            &condition("Roles", UserComparator::TextArrayContainsAnyOf, vec!["admin"]),
            &user
        ));
        assert!(matches(
            &condition("RolesJson", UserComparator::TextArrayContainsAnyOf, vec!["admin"]),
            &user
        ));
        assert!(matches(
            &condition(
                "Roles",
                UserComparator::HashedArrayContainsAnyOf,
                vec!["2454de65950590b707518212bb4c640560368075d4ef3b9437603f02a5f0da65"]
            ),
            &user
        ));
        assert!(matches(
            &condition("Roles", UserComparator::TextArrayNotContainsAnyOf, vec!["owner"]),
            &user
        ));
        let err = eval(
            &condition("Broken", UserComparator::TextArrayContainsAnyOf, vec!["admin"]),
            Some(&user),
        )
        .unwrap_err();
        assert!(err.is_contextual());
    }

    #[test]
    fn semver_comparators() {
        let user = User::new("id").custom("Version", " 1.2.3 ");
        assert!(matches(
            &condition("Version", UserComparator::SemverIsOneOf, vec!["", "1.2.3"]),
            &user
        ));
        assert!(matches(
            &condition("Version", UserComparator::SemverLess, "1.10.0"),
            &user
        ));
        assert!(matches(
            &condition("Version", UserComparator::SemverGreaterOrEquals, "1.2.3+build"),
            &user
        ));
        assert!(!matches(
            &condition("Version", UserComparator::SemverGreater, "1.2.3-beta"),
            &User::new("id").custom("Version", "1.2.3-alpha")
        ));
    }

    #[test]
    fn semver_invalid_comparison_values() {
        let user = User::new("id").custom("Version", "1.2.3");
        // Skipped element by element for IS ONE OF.
        assert!(matches(
            &condition("Version", UserComparator::SemverIsOneOf, vec!["invalid", "1.2.3"]),
            &user
        ));
        assert!(matches(
            &condition("Version", UserComparator::SemverIsNotOneOf, vec!["invalid"]),
            &user
        ));
        // Relational operators are simply false.
        assert!(!matches(
            &condition("Version", UserComparator::SemverLess, "invalid"),
            &user
        ));
        assert!(!matches(
            &condition("Version", UserComparator::SemverGreaterOrEquals, "invalid"),
            &user
        ));
    }

    #[test]
    fn semver_invalid_attribute_is_contextual() {
        let err = eval(
            &condition("Version", UserComparator::SemverLess, "1.0.0"),
            Some(&User::new("id").custom("Version", "not-a-version")),
        )
        .unwrap_err();
        assert_eq!(
            err,
            EvaluationError::AttributeInvalid {
                attribute: "Version".to_owned(),
                reason: "'not-a-version' is not a valid semantic version".to_owned(),
            }
        );
        assert!(err.is_contextual());
    }

    #[test]
    fn number_comparators() {
        let c = |comparator, value: f64| condition("Age", comparator, value);
        let text = User::new("id").custom("Age", " 21,5 ");
        let number = User::new("id").custom("Age", 21.5);
        let int = User::new("id").custom("Age", 21);
        assert!(matches(&c(UserComparator::NumberEquals, 21.5), &text));
        assert!(matches(&c(UserComparator::NumberEquals, 21.5), &number));
        assert!(matches(&c(UserComparator::NumberLess, 21.5), &int));
        assert!(matches(&c(UserComparator::NumberNotEquals, 21.0), &number));
        assert!(matches(&c(UserComparator::NumberGreaterOrEquals, 21.5), &number));
        assert!(!matches(&c(UserComparator::NumberGreater, 21.5), &number));
        assert!(matches(&c(UserComparator::NumberLessOrEquals, 21.5), &text));

        let err = eval(
            &c(UserComparator::NumberEquals, 1.0),
            Some(&User::new("id").custom("Age", "abc")),
        )
        .unwrap_err();
        assert!(err.is_contextual());
    }

    #[test]
    fn date_comparators() {
        let c = |comparator| condition("Created", comparator, 1680307200.0);
        let date = User::new("id").custom(
            "Created",
            Utc.with_ymd_and_hms(2023, 3, 31, 23, 59, 59).unwrap(),
        );
        let seconds = User::new("id").custom("Created", "1680307201");
        assert!(matches(&c(UserComparator::DateBefore), &date));
        assert!(!matches(&c(UserComparator::DateAfter), &date));
        assert!(matches(&c(UserComparator::DateAfter), &seconds));
    }

    #[test]
    fn non_text_attribute_is_converted() {
        let user = User::new("id").custom("Age", 21);
        assert!(matches(
            &condition("Age", UserComparator::IsOneOf, vec!["21"]),
            &user
        ));
        let user = User::new("id").custom("Score", 1.5);
        assert!(matches(
            &condition("Score", UserComparator::TextEquals, "1.5"),
            &user
        ));
    }
}
