//! Feature flag evaluation.
//!
//! Evaluation is a pure function of a [`Config`], a setting key and an optional [`User`]:
//! targeting rules are tried in order, then the setting's percentage options, and finally the
//! default value is served. When `info` logging is enabled for the `configcat` target, a
//! human-readable trace of each evaluation is logged.
use std::collections::BTreeMap;

use crate::{
    model::{Config, PercentageOption, SettingValue, TargetingRule},
    User,
};

mod context;
mod error;
mod evaluator;
mod trace;
mod user_condition;

pub use error::EvaluationError;

use context::EvaluationContext;
use evaluator::Evaluator;
use trace::Trace;

/// Outcome of a successful evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    /// Served value.
    pub value: SettingValue,
    /// Variation id of the served value.
    pub variation_id: Option<String>,
    /// Targeting rule that served the value, if any.
    pub matched_targeting_rule: Option<TargetingRule>,
    /// Percentage option that served the value, if any.
    pub matched_percentage_option: Option<PercentageOption>,
}

/// Evaluate the setting `key` for `user`.
pub fn evaluate(
    config: &Config,
    key: &str,
    user: Option<&User>,
) -> Result<EvaluationResult, EvaluationError> {
    if !config.settings.contains_key(key) {
        return Err(EvaluationError::SettingNotFound(key.to_owned()));
    }

    let mut trace = Trace::new(log::log_enabled!(target: "configcat", log::Level::Info));
    let result = evaluate_traced(config, key, user, &mut trace);
    if trace.is_enabled() {
        log::info!(target: "configcat", event_id = 5000; "{trace}");
    }
    result
}

/// Evaluate every setting of `config` for `user`.
pub fn evaluate_all(
    config: &Config,
    user: Option<&User>,
) -> BTreeMap<String, Result<EvaluationResult, EvaluationError>> {
    config
        .settings
        .keys()
        .map(|key| (key.clone(), evaluate(config, key, user)))
        .collect()
}

fn evaluate_traced(
    config: &Config,
    key: &str,
    user: Option<&User>,
    trace: &mut Trace,
) -> Result<EvaluationResult, EvaluationError> {
    let (key, setting) = config
        .settings
        .get_key_value(key)
        .ok_or_else(|| EvaluationError::SettingNotFound(key.to_owned()))?;

    trace.append(format_args!("Evaluating '{key}'"));
    if let Some(user) = user {
        trace.append(format_args!(" for User '{user}'"));
    }
    trace.increase_indent();

    let mut visited_keys = Vec::new();
    let mut ctx = EvaluationContext::new(key, setting, user, &mut visited_keys);
    let result = Evaluator { config }.evaluate_setting(&mut ctx, trace)?;

    trace
        .new_line(format_args!("Returning '{}'.", result.value))
        .decrease_indent();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(json: serde_json::Value) -> Config {
        serde_json::from_value(json).unwrap()
    }

    fn trace_of(config: &Config, key: &str, user: Option<&User>) -> String {
        let mut trace = Trace::new(true);
        let _ = evaluate_traced(config, key, user, &mut trace);
        trace.to_string()
    }

    fn rules_config() -> Config {
        config(serde_json::json!({
            "p": {"s": "test-salt"},
            "f": {
                "testFlag": {
                    "t": 1,
                    "v": {"s": "default"},
                    "i": "v0",
                    "r": [
                        {
                            "c": [{"u": {"a": "Email", "c": 0, "l": ["a@example.com"]}}],
                            "s": {"v": {"s": "rule1"}, "i": "v1"}
                        },
                        {
                            "c": [{"u": {"a": "Country", "c": 28, "s": "Hungary"}}],
                            "s": {"v": {"s": "rule2"}, "i": "v2"}
                        }
                    ],
                    "p": [
                        {"p": 50, "v": {"s": "A"}, "i": "pA"},
                        {"p": 50, "v": {"s": "B"}, "i": "pB"}
                    ]
                }
            }
        }))
    }

    #[test]
    fn setting_not_found() {
        assert_eq!(
            evaluate(&rules_config(), "missing", None),
            Err(EvaluationError::SettingNotFound("missing".to_owned()))
        );
    }

    #[test]
    fn first_matching_rule_wins() {
        let config = rules_config();
        let user = User::new("12345").email("a@example.com").country("Hungary");
        let result = evaluate(&config, "testFlag", Some(&user)).unwrap();
        assert_eq!(result.value, SettingValue::from("rule1"));
        assert_eq!(result.variation_id.as_deref(), Some("v1"));
        assert!(result.matched_targeting_rule.is_some());
        assert_eq!(result.matched_percentage_option, None);
    }

    #[test]
    fn falls_back_to_percentage_options() {
        let config = rules_config();
        let user = User::new("12345").email("b@example.com");
        let result = evaluate(&config, "testFlag", Some(&user)).unwrap();
        assert_eq!(result.value, SettingValue::from("B"));
        assert_eq!(result.variation_id.as_deref(), Some("pB"));
        assert_eq!(result.matched_targeting_rule, None);
        assert_eq!(result.matched_percentage_option.unwrap().percentage, 50);
    }

    #[test]
    fn default_value_without_user() {
        let result = evaluate(&rules_config(), "testFlag", None).unwrap();
        assert_eq!(result.value, SettingValue::from("default"));
        assert_eq!(result.variation_id.as_deref(), Some("v0"));
    }

    #[test]
    fn trace_format() {
        let config = rules_config();
        let user = User::new("12345").email("b@example.com");
        assert_eq!(
            trace_of(&config, "testFlag", Some(&user)),
            r#"Evaluating 'testFlag' for User '{"Identifier":"12345","Email":"b@example.com"}'
  Evaluating targeting rules and applying the first match if any:
  - IF User.Email IS ONE OF ['a@example.com'] THEN 'rule1' => no match
  - IF User.Country EQUALS 'Hungary' THEN 'rule2' => cannot evaluate, the User.Country attribute is missing
    The current targeting rule is ignored and the evaluation continues with the next rule.
  Evaluating % options based on the User.Identifier attribute:
  - Computing hash in the [0..99] range from User.Identifier => 52 (this value is sticky and consistent across all SDKs)
  - Hash value 52 selects % option 2 (50%), 'B'.
  Returning 'B'."#
        );
    }

    #[test]
    fn trace_without_user() {
        let config = rules_config();
        assert_eq!(
            trace_of(&config, "testFlag", None),
            "Evaluating 'testFlag'
  Evaluating targeting rules and applying the first match if any:
  - IF User.Email IS ONE OF ['a@example.com'] THEN 'rule1' => cannot evaluate, User Object is missing
    The current targeting rule is ignored and the evaluation continues with the next rule.
  - IF User.Country EQUALS 'Hungary' THEN 'rule2' => cannot evaluate, User Object is missing
    The current targeting rule is ignored and the evaluation continues with the next rule.
  Skipping % options because the User Object is missing.
  Returning 'default'."
        );
    }

    #[test]
    fn percentage_options_use_sticky_buckets() {
        // sha1("k12345") buckets to 85.
        let config = config(serde_json::json!({
            "f": {
                "k": {
                    "t": 1,
                    "v": {"s": "default"},
                    "p": [
                        {"p": 50, "v": {"s": "A"}},
                        {"p": 40, "v": {"s": "B"}},
                        {"p": 10, "v": {"s": "C"}}
                    ]
                }
            }
        }));
        let user = User::new("12345");
        let result = evaluate(&config, "k", Some(&user)).unwrap();
        assert_eq!(result.value, SettingValue::from("B"));
    }

    #[test]
    fn percentage_attribute() {
        let config = config(serde_json::json!({
            "f": {
                "k": {
                    "t": 0,
                    "a": "Tenant",
                    "v": {"b": false},
                    "p": [{"p": 100, "v": {"b": true}}]
                }
            }
        }));
        let user = User::new("12345");
        assert_eq!(
            evaluate(&config, "k", Some(&user)).unwrap().value,
            SettingValue::Bool(false)
        );
        let user = User::new("12345").custom("Tenant", "acme");
        assert_eq!(
            evaluate(&config, "k", Some(&user)).unwrap().value,
            SettingValue::Bool(true)
        );
    }

    #[test]
    fn percentage_sum_below_100_is_an_error() {
        let config = config(serde_json::json!({
            "f": {
                "k": {
                    "t": 1,
                    "v": {"s": "default"},
                    "p": [{"p": 50, "v": {"s": "A"}}, {"p": 30, "v": {"s": "B"}}]
                }
            }
        }));
        // Bucket 85 falls outside of the options.
        assert_eq!(
            evaluate(&config, "k", Some(&User::new("12345"))),
            Err(EvaluationError::PercentageSumInvalid)
        );
    }

    #[test]
    fn rule_without_then_part_is_an_error() {
        let config = config(serde_json::json!({
            "f": {
                "k": {
                    "t": 1,
                    "v": {"s": "default"},
                    "r": [{"c": [{"u": {"a": "Identifier", "c": 28, "s": "12345"}}]}]
                }
            }
        }));
        assert_eq!(
            evaluate(&config, "k", Some(&User::new("12345"))),
            Err(EvaluationError::TargetingRuleValueMissing)
        );
    }

    #[test]
    fn rule_with_percentage_options() {
        let config = config(serde_json::json!({
            "f": {
                "k": {
                    "t": 1,
                    "v": {"s": "default"},
                    "r": [{
                        "c": [{"u": {"a": "Identifier", "c": 28, "s": "12345"}}],
                        "p": [{"p": 90, "v": {"s": "A"}, "i": "a"}, {"p": 10, "v": {"s": "B"}, "i": "b"}]
                    }]
                }
            }
        }));
        let result = evaluate(&config, "k", Some(&User::new("12345"))).unwrap();
        assert_eq!(result.value, SettingValue::from("A"));
        assert!(result.matched_targeting_rule.is_some());
        assert_eq!(result.matched_percentage_option.unwrap().variation_id.as_deref(), Some("a"));
    }

    fn segment_config() -> Config {
        config(serde_json::json!({
            "p": {"s": "salt"},
            "s": [{
                "n": "Beta users",
                "r": [{
                    "a": "Email",
                    "c": 16,
                    "l": ["a931281089f0a7d62704c2e3d4e52eae57feb8d56ee7cbee7f0a844386c1ba1f"]
                }]
            }],
            "f": {
                "inSegment": {
                    "t": 0,
                    "v": {"b": false},
                    "r": [{"c": [{"s": {"s": 0, "c": 0}}], "s": {"v": {"b": true}}}]
                },
                "notInSegment": {
                    "t": 0,
                    "v": {"b": false},
                    "r": [{"c": [{"s": {"s": 0, "c": 1}}], "s": {"v": {"b": true}}}]
                },
                "badSegment": {
                    "t": 0,
                    "v": {"b": false},
                    "r": [{"c": [{"s": {"s": 3, "c": 0}}], "s": {"v": {"b": true}}}]
                }
            }
        }))
    }

    #[test]
    fn segment_conditions() {
        let config = segment_config();
        let member = User::new("1").email("a@example.com");
        let other = User::new("2").email("b@example.com");

        let value = |key, user: &User| evaluate(&config, key, Some(user)).unwrap().value;
        assert_eq!(value("inSegment", &member), SettingValue::Bool(true));
        assert_eq!(value("inSegment", &other), SettingValue::Bool(false));
        assert_eq!(value("notInSegment", &member), SettingValue::Bool(false));
        assert_eq!(value("notInSegment", &other), SettingValue::Bool(true));
        assert_eq!(
            evaluate(&config, "badSegment", Some(&member)),
            Err(EvaluationError::SegmentReferenceInvalid)
        );
    }

    #[test]
    fn segment_trace() {
        let config = segment_config();
        let user = User::new("1").email("a@example.com");
        assert_eq!(
            trace_of(&config, "inSegment", Some(&user)),
            r#"Evaluating 'inSegment' for User '{"Identifier":"1","Email":"a@example.com"}'
  Evaluating targeting rules and applying the first match if any:
  - IF User IS IN SEGMENT 'Beta users'
    (
      Evaluating segment 'Beta users':
      - IF User.Email IS ONE OF [<1 hashed value>] => true
      Segment evaluation result: User IS IN SEGMENT.
      Condition (User IS IN SEGMENT 'Beta users') evaluates to true.
    )
    THEN 'true' => MATCH, applying rule
  Returning 'true'."#
        );
    }

    fn prerequisite_config() -> Config {
        config(serde_json::json!({
            "f": {
                "main": {
                    "t": 1,
                    "v": {"s": "off"},
                    "r": [{
                        "c": [{"p": {"f": "dep", "c": 0, "v": {"b": true}}}],
                        "s": {"v": {"s": "on"}}
                    }]
                },
                "dep": {"t": 0, "v": {"b": true}},
                "mismatch": {
                    "t": 1,
                    "v": {"s": "off"},
                    "r": [{
                        "c": [{"p": {"f": "dep", "c": 0, "v": {"s": "true"}}}],
                        "s": {"v": {"s": "on"}}
                    }]
                },
                "missing": {
                    "t": 1,
                    "v": {"s": "off"},
                    "r": [{
                        "c": [{"p": {"f": "nope", "c": 1, "v": {"b": true}}}],
                        "s": {"v": {"s": "on"}}
                    }]
                },
                "A": {
                    "t": 0,
                    "v": {"b": false},
                    "r": [{"c": [{"p": {"f": "B", "c": 0, "v": {"b": true}}}], "s": {"v": {"b": true}}}]
                },
                "B": {
                    "t": 0,
                    "v": {"b": false},
                    "r": [{"c": [{"p": {"f": "A", "c": 0, "v": {"b": true}}}], "s": {"v": {"b": true}}}]
                }
            }
        }))
    }

    #[test]
    fn prerequisite_flags() {
        let config = prerequisite_config();
        assert_eq!(
            evaluate(&config, "main", None).unwrap().value,
            SettingValue::from("on")
        );
        assert_eq!(
            evaluate(&config, "mismatch", None),
            Err(EvaluationError::PrerequisiteTypeMismatch {
                key: "dep".to_owned(),
                value: "true".to_owned(),
            })
        );
        assert_eq!(
            evaluate(&config, "missing", None),
            Err(EvaluationError::PrerequisiteKeyInvalid)
        );
    }

    #[test]
    fn circular_dependency() {
        let config = prerequisite_config();
        let err = evaluate(&config, "A", None).unwrap_err();
        assert_eq!(
            err,
            EvaluationError::CircularDependency("'A' -> 'B' -> 'A'".to_owned())
        );
        assert_eq!(
            err.to_string(),
            "Circular dependency detected between the following depending flags: 'A' -> 'B' -> 'A'."
        );
    }

    #[test]
    fn prerequisite_trace() {
        let config = prerequisite_config();
        assert_eq!(
            trace_of(&config, "main", None),
            "Evaluating 'main'
  Evaluating targeting rules and applying the first match if any:
  - IF Flag 'dep' EQUALS 'true'
    (
      Evaluating prerequisite flag 'dep':
      Prerequisite flag evaluation result: 'true'.
      Condition (Flag 'dep' EQUALS 'true') evaluates to true.
    )
    THEN 'on' => MATCH, applying rule
  Returning 'on'."
        );
    }

    #[test]
    fn evaluate_all_reports_each_setting() {
        let config = prerequisite_config();
        let results = evaluate_all(&config, None);
        assert_eq!(results.len(), 6);
        assert!(results["main"].is_ok());
        assert!(results["A"].is_err());
    }

    #[test]
    fn unknown_comparator_fails_only_the_affected_flag() {
        let config = config(serde_json::json!({
            "f": {
                "broken": {
                    "t": 0,
                    "v": {"b": false},
                    "r": [{"c": [{"u": {"a": "Email", "c": 99, "s": "x"}}], "s": {"v": {"b": true}}}]
                },
                "fine": {"t": 0, "v": {"b": true}}
            }
        }));
        let user = User::new("1").email("x");
        assert_eq!(
            evaluate(&config, "broken", Some(&user)),
            Err(EvaluationError::ComparisonOperatorInvalid)
        );
        assert_eq!(
            evaluate(&config, "fine", Some(&user)).unwrap().value,
            SettingValue::Bool(true)
        );
    }
}
