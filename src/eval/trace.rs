//! Human-readable evaluation log.
//!
//! The format is shared by all ConfigCat SDKs. Hashed comparison values are never printed.
use std::fmt::{self, Display, Write};

use chrono::DateTime;

use crate::{
    model::{
        PrerequisiteFlagCondition, Segment, SegmentCondition, TargetingRule, UserComparator,
        UserCondition,
    },
    user::format_number,
};

use super::EvaluationError;

const MAX_LIST_ELEMENTS: usize = 10;
const INVALID_VALUE: &str = "<invalid value>";

pub(crate) const TARGETING_RULE_IGNORED: &str =
    "The current targeting rule is ignored and the evaluation continues with the next rule.";

/// Evaluation log builder. All operations are no-ops when disabled.
#[derive(Debug, Default)]
pub(crate) struct Trace {
    enabled: bool,
    text: String,
    indent: usize,
}

impl Trace {
    pub fn new(enabled: bool) -> Trace {
        Trace {
            enabled,
            text: String::new(),
            indent: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn append(&mut self, value: impl Display) -> &mut Self {
        if self.enabled {
            let _ = write!(self.text, "{value}");
        }
        self
    }

    pub fn new_line(&mut self, value: impl Display) -> &mut Self {
        if self.enabled {
            self.text.push('\n');
            for _ in 0..self.indent {
                self.text.push_str("  ");
            }
            let _ = write!(self.text, "{value}");
        }
        self
    }

    pub fn increase_indent(&mut self) -> &mut Self {
        self.indent += 1;
        self
    }

    pub fn decrease_indent(&mut self) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self
    }

    pub fn condition_consequence(&mut self, result: bool) -> &mut Self {
        self.append(format_args!(" => {result}"));
        if !result {
            self.append(", skipping the remaining AND conditions");
        }
        self
    }

    pub fn targeting_rule_consequence(
        &mut self,
        rule: &TargetingRule,
        result: &Result<bool, EvaluationError>,
        new_line: bool,
    ) -> &mut Self {
        self.increase_indent();
        if new_line {
            self.new_line("");
        } else {
            self.append(" ");
        }
        match &rule.served_value {
            Some(served) => self.append(format_args!("THEN '{}' => ", served.value)),
            None => self.append("THEN % options => "),
        };
        match result {
            Ok(true) => self.append("MATCH, applying rule"),
            Ok(false) => self.append("no match"),
            Err(err) => self.append(err),
        };
        self.decrease_indent()
    }
}

impl Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// `User.<attribute> <comparator> <comparison value>`
pub(crate) struct UserConditionText<'a>(pub &'a UserCondition, pub UserComparator);

impl Display for UserConditionText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let UserConditionText(condition, comparator) = self;
        write!(f, "User.{} {} ", condition.attribute, comparator.name())?;

        use UserComparator::*;
        match comparator {
            IsOneOf | IsNotOneOf | ContainsAnyOf | NotContainsAnyOf | SemverIsOneOf
            | SemverIsNotOneOf | TextStartsWithAnyOf | TextNotStartsWithAnyOf
            | TextEndsWithAnyOf | TextNotEndsWithAnyOf | TextArrayContainsAnyOf
            | TextArrayNotContainsAnyOf => write_list(f, condition.string_list_value.as_deref(), false),
            SensitiveIsOneOf | SensitiveIsNotOneOf | HashedStartsWithAnyOf
            | HashedNotStartsWithAnyOf | HashedEndsWithAnyOf | HashedNotEndsWithAnyOf
            | HashedArrayContainsAnyOf | HashedArrayNotContainsAnyOf => {
                write_list(f, condition.string_list_value.as_deref(), true)
            }
            SemverLess | SemverLessOrEquals | SemverGreater | SemverGreaterOrEquals | TextEquals
            | TextNotEquals => match &condition.string_value {
                Some(value) => write!(f, "'{value}'"),
                None => f.write_str(INVALID_VALUE),
            },
            HashedEquals | HashedNotEquals => match &condition.string_value {
                Some(_) => f.write_str("'<hashed value>'"),
                None => f.write_str(INVALID_VALUE),
            },
            NumberEquals | NumberNotEquals | NumberLess | NumberLessOrEquals | NumberGreater
            | NumberGreaterOrEquals => match condition.number_value {
                Some(value) => write!(f, "'{}'", format_number(value)),
                None => f.write_str(INVALID_VALUE),
            },
            DateBefore | DateAfter => match condition.number_value {
                Some(value) => {
                    write!(f, "'{}'", format_number(value))?;
                    let millis = (value * 1000.0) as i64;
                    if let Some(date) = DateTime::from_timestamp_millis(millis) {
                        write!(f, " ({} UTC)", date.format("%Y-%m-%dT%H:%M:%S%.3f"))?;
                    }
                    Ok(())
                }
                None => f.write_str(INVALID_VALUE),
            },
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, values: Option<&[String]>, sensitive: bool) -> fmt::Result {
    let Some(values) = values else {
        return f.write_str(INVALID_VALUE);
    };
    if sensitive {
        let noun = if values.len() == 1 { "value" } else { "values" };
        return write!(f, "[<{} hashed {noun}>]", values.len());
    }

    f.write_str("[")?;
    for (i, value) in values.iter().take(MAX_LIST_ELEMENTS).enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "'{value}'")?;
    }
    if values.len() > MAX_LIST_ELEMENTS {
        let more = values.len() - MAX_LIST_ELEMENTS;
        let noun = if more == 1 { "value" } else { "values" };
        write!(f, ", ... <{more} more {noun}>")?;
    }
    f.write_str("]")
}

/// `User IS IN SEGMENT '<name>'`
pub(crate) struct SegmentConditionText<'a>(pub &'a SegmentCondition, pub &'a Segment);

impl Display for SegmentConditionText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "User {} '{}'", self.0.comparator.name(), self.1.name)
    }
}

/// `Flag '<key>' EQUALS '<value>'`
pub(crate) struct PrerequisiteConditionText<'a>(pub &'a PrerequisiteFlagCondition);

impl Display for PrerequisiteConditionText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Flag '{}' {} '{}'",
            self.0.flag_key,
            self.0.comparator.name(),
            self.0.value
        )
    }
}
