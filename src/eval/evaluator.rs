use crate::{
    model::{
        Condition, Config, PercentageOption, PrerequisiteComparator, PrerequisiteFlagCondition,
        SegmentComparator, SegmentCondition, TargetingRule, UserCondition,
    },
    sharder::percentage_bucket,
    User,
};

use super::{
    context::EvaluationContext,
    trace::{PrerequisiteConditionText, SegmentConditionText, Trace, TARGETING_RULE_IGNORED},
    user_condition::evaluate_user_condition,
    EvaluationError, EvaluationResult,
};

type Result<T> = std::result::Result<T, EvaluationError>;

/// Condition of a targeting rule or a segment.
#[derive(Clone, Copy)]
enum ConditionRef<'a> {
    User(&'a UserCondition),
    Segment(&'a SegmentCondition),
    Prerequisite(&'a PrerequisiteFlagCondition),
}

impl<'a> From<&'a Condition> for ConditionRef<'a> {
    fn from(value: &'a Condition) -> Self {
        match value {
            Condition::User(c) => ConditionRef::User(c),
            Condition::Segment(c) => ConditionRef::Segment(c),
            Condition::Prerequisite(c) => ConditionRef::Prerequisite(c),
        }
    }
}

pub(super) struct Evaluator<'a> {
    pub config: &'a Config,
}

impl<'a> Evaluator<'a> {
    pub fn evaluate_setting(
        &self,
        ctx: &mut EvaluationContext<'a, '_>,
        trace: &mut Trace,
    ) -> Result<EvaluationResult> {
        let setting = ctx.setting;

        if !setting.targeting_rules.is_empty() {
            if let Some(result) = self.evaluate_targeting_rules(ctx, trace)? {
                return Ok(result);
            }
        }

        if !setting.percentage_options.is_empty() {
            if let Some(option) =
                self.evaluate_percentage_options(&setting.percentage_options, ctx, trace)?
            {
                return Ok(EvaluationResult {
                    value: option.value.clone(),
                    variation_id: option.variation_id.clone(),
                    matched_targeting_rule: None,
                    matched_percentage_option: Some(option.clone()),
                });
            }
        }

        Ok(EvaluationResult {
            value: setting.value.clone(),
            variation_id: setting.variation_id.clone(),
            matched_targeting_rule: None,
            matched_percentage_option: None,
        })
    }

    fn evaluate_targeting_rules(
        &self,
        ctx: &mut EvaluationContext<'a, '_>,
        trace: &mut Trace,
    ) -> Result<Option<EvaluationResult>> {
        let setting = ctx.setting;
        trace.new_line("Evaluating targeting rules and applying the first match if any:");

        for rule in &setting.targeting_rules {
            let conditions = rule.conditions.iter().map(ConditionRef::from);
            match self.evaluate_conditions(conditions, Some(rule), ctx.key, ctx, trace) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) if err.is_contextual() => {
                    trace
                        .increase_indent()
                        .new_line(TARGETING_RULE_IGNORED)
                        .decrease_indent();
                    continue;
                }
                Err(err) => return Err(err),
            }

            if let Some(served) = &rule.served_value {
                return Ok(Some(EvaluationResult {
                    value: served.value.clone(),
                    variation_id: served.variation_id.clone(),
                    matched_targeting_rule: Some(rule.clone()),
                    matched_percentage_option: None,
                }));
            }

            let options = match &rule.percentage_options {
                Some(options) if !options.is_empty() => options,
                _ => return Err(EvaluationError::TargetingRuleValueMissing),
            };

            trace.increase_indent();
            match self.evaluate_percentage_options(options, ctx, trace)? {
                Some(option) => {
                    trace.decrease_indent();
                    return Ok(Some(EvaluationResult {
                        value: option.value.clone(),
                        variation_id: option.variation_id.clone(),
                        matched_targeting_rule: Some(rule.clone()),
                        matched_percentage_option: Some(option.clone()),
                    }));
                }
                None => {
                    trace.new_line(TARGETING_RULE_IGNORED).decrease_indent();
                }
            }
        }

        Ok(None)
    }

    /// Evaluate AND'd conditions. Stops at the first condition that doesn't hold.
    fn evaluate_conditions<I>(
        &self,
        conditions: I,
        rule: Option<&TargetingRule>,
        context_salt: &str,
        ctx: &mut EvaluationContext<'a, '_>,
        trace: &mut Trace,
    ) -> Result<bool>
    where
        I: ExactSizeIterator<Item = ConditionRef<'a>>,
    {
        let len = conditions.len();
        let mut result = Ok(true);
        let mut new_line_before_then = false;

        for (i, condition) in conditions.enumerate() {
            if i == 0 {
                trace.new_line("- IF ").increase_indent();
            } else {
                trace.increase_indent().new_line("AND ");
            }

            result = match condition {
                ConditionRef::User(c) => {
                    new_line_before_then = len > 1;
                    evaluate_user_condition(c, context_salt, self.config.salt(), ctx, trace)
                }
                ConditionRef::Segment(c) => {
                    let result = self.evaluate_segment_condition(c, ctx, trace);
                    new_line_before_then = result.is_ok() || len > 1;
                    result
                }
                ConditionRef::Prerequisite(c) => {
                    new_line_before_then = true;
                    self.evaluate_prerequisite_condition(c, ctx, trace)
                }
            };

            if matches!(&result, Err(err) if !err.is_contextual()) {
                return result;
            }

            if rule.is_none() || len > 1 {
                trace.condition_consequence(matches!(result, Ok(true)));
            }
            trace.decrease_indent();

            if !matches!(result, Ok(true)) {
                break;
            }
        }

        if let Some(rule) = rule {
            trace.targeting_rule_consequence(rule, &result, new_line_before_then);
        }
        result
    }

    fn evaluate_segment_condition(
        &self,
        condition: &'a SegmentCondition,
        ctx: &mut EvaluationContext<'a, '_>,
        trace: &mut Trace,
    ) -> Result<bool> {
        let segment = self
            .config
            .segments
            .get(condition.segment_index)
            .ok_or(EvaluationError::SegmentReferenceInvalid)?;
        if segment.name.is_empty() {
            return Err(EvaluationError::SegmentNameMissing);
        }

        let text = SegmentConditionText(condition, segment);
        trace.append(&text);

        if ctx.user.is_none() {
            ctx.log_user_missing();
            return Err(EvaluationError::UserMissing);
        }

        trace
            .new_line("(")
            .increase_indent()
            .new_line(format_args!("Evaluating segment '{}':", segment.name));

        let conditions = segment.conditions.iter().map(ConditionRef::User);
        let result = self.evaluate_conditions(conditions, None, &segment.name, ctx, trace);

        let result = match result {
            Ok(in_segment) => {
                let result = match condition.comparator {
                    SegmentComparator::IsIn => in_segment,
                    SegmentComparator::IsNotIn => !in_segment,
                };
                trace
                    .new_line(format_args!(
                        "Segment evaluation result: User {}.",
                        if in_segment {
                            SegmentComparator::IsIn.name()
                        } else {
                            SegmentComparator::IsNotIn.name()
                        }
                    ))
                    .new_line(format_args!(
                        "Condition ({text}) evaluates to {result}."
                    ));
                Ok(result)
            }
            Err(err) if err.is_contextual() => {
                trace
                    .new_line(format_args!("Segment evaluation result: {err}."))
                    .new_line(format_args!("Condition ({text}) failed to evaluate."));
                Err(err)
            }
            Err(err) => return Err(err),
        };

        trace.decrease_indent().new_line(")");
        result
    }

    fn evaluate_prerequisite_condition(
        &self,
        condition: &'a PrerequisiteFlagCondition,
        ctx: &mut EvaluationContext<'a, '_>,
        trace: &mut Trace,
    ) -> Result<bool> {
        let text = PrerequisiteConditionText(condition);
        trace.append(&text);

        let key = condition.flag_key.as_str();
        let setting = self
            .config
            .settings
            .get(key)
            .ok_or(EvaluationError::PrerequisiteKeyInvalid)?;
        if !setting.setting_type.accepts(&condition.value) {
            return Err(EvaluationError::PrerequisiteTypeMismatch {
                key: key.to_owned(),
                value: condition.value.to_string(),
            });
        }

        ctx.visited_keys.push(ctx.key);
        if ctx.visited_keys.contains(&key) {
            let path = ctx
                .visited_keys
                .iter()
                .chain(std::iter::once(&key))
                .map(|k| format!("'{k}'"))
                .collect::<Vec<_>>()
                .join(" -> ");
            ctx.visited_keys.pop();
            return Err(EvaluationError::CircularDependency(path));
        }

        trace
            .new_line("(")
            .increase_indent()
            .new_line(format_args!("Evaluating prerequisite flag '{key}':"));

        let user: Option<&'a User> = ctx.user;
        let result = {
            let mut child = EvaluationContext::new(key, setting, user, &mut *ctx.visited_keys);
            self.evaluate_setting(&mut child, trace)
        };
        ctx.visited_keys.pop();
        let value = result?.value;

        let is_match = match condition.comparator {
            PrerequisiteComparator::Equals => value == condition.value,
            PrerequisiteComparator::NotEquals => value != condition.value,
        };

        trace
            .new_line(format_args!(
                "Prerequisite flag evaluation result: '{value}'."
            ))
            .new_line(format_args!("Condition ({text}) evaluates to {is_match}."))
            .decrease_indent()
            .new_line(")");

        Ok(is_match)
    }

    /// Pick a percentage option for the user. `None` if the user or the bucketing attribute is
    /// missing.
    fn evaluate_percentage_options<'o>(
        &self,
        options: &'o [PercentageOption],
        ctx: &mut EvaluationContext<'a, '_>,
        trace: &mut Trace,
    ) -> Result<Option<&'o PercentageOption>> {
        let Some(user) = ctx.user else {
            trace.new_line("Skipping % options because the User Object is missing.");
            ctx.log_user_missing();
            return Ok(None);
        };

        let attribute = ctx
            .setting
            .percentage_attribute
            .as_deref()
            .unwrap_or(User::IDENTIFIER);
        let Some(value) = user.attribute(attribute) else {
            trace.new_line(format_args!(
                "Skipping % options because the User.{attribute} attribute is missing."
            ));
            ctx.log_percentage_attribute_missing(attribute);
            return Ok(None);
        };

        let bucket = percentage_bucket(ctx.key, &value.to_text());
        trace
            .new_line(format_args!(
                "Evaluating % options based on the User.{attribute} attribute:"
            ))
            .new_line(format_args!(
                "- Computing hash in the [0..99] range from User.{attribute} => {bucket} (this value is sticky and consistent across all SDKs)"
            ));

        let mut cumulative = 0u64;
        for (i, option) in options.iter().enumerate() {
            cumulative += u64::from(option.percentage);
            if bucket < cumulative {
                trace.new_line(format_args!(
                    "- Hash value {bucket} selects % option {} ({}%), '{}'.",
                    i + 1,
                    option.percentage,
                    option.value
                ));
                return Ok(Some(option));
            }
        }

        Err(EvaluationError::PercentageSumInvalid)
    }
}
