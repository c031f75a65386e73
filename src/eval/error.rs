/// Enum representing possible errors that can occur during flag evaluation.
///
/// Errors fall in two groups. *Contextual* errors ([`is_contextual`](Self::is_contextual)) are
/// caused by the user object not carrying the data a condition needs; the evaluator treats the
/// affected targeting rule as not matching and goes on. All other errors indicate a broken flag
/// definition and abort the evaluation of the flag.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EvaluationError {
    /// A condition needs a user object but none was given.
    #[error("cannot evaluate, User Object is missing")]
    UserMissing,

    /// The user object has no value for an attribute a condition needs.
    #[error("cannot evaluate, the User.{0} attribute is missing")]
    AttributeMissing(String),

    /// The attribute's value cannot be interpreted by the comparator.
    #[error("cannot evaluate, the User.{attribute} attribute is invalid ({reason})")]
    AttributeInvalid {
        /// Attribute name.
        attribute: String,
        /// Why the value is invalid.
        reason: String,
    },

    /// The requested setting does not exist.
    #[error("Setting '{0}' is not present in config JSON.")]
    SettingNotFound(String),

    /// Comparator id is unknown to this SDK.
    #[error("Comparison operator is invalid.")]
    ComparisonOperatorInvalid,

    /// The comparison value doesn't have the shape the comparator needs.
    #[error("Comparison value is missing or invalid.")]
    ComparisonValueInvalid,

    /// Hashed comparators need the config salt.
    #[error("Config JSON salt is missing.")]
    SaltMissing,

    /// Segment index out of range.
    #[error("Segment reference is invalid.")]
    SegmentReferenceInvalid,

    /// Referenced segment has no name.
    #[error("Segment name is missing.")]
    SegmentNameMissing,

    /// Prerequisite flag does not exist.
    #[error("Prerequisite flag is missing or invalid.")]
    PrerequisiteKeyInvalid,

    /// Comparison value type differs from the prerequisite flag's type.
    #[error("Type mismatch between comparison value '{value}' and prerequisite flag '{key}'.")]
    PrerequisiteTypeMismatch {
        /// Prerequisite flag key.
        key: String,
        /// Comparison value.
        value: String,
    },

    /// Prerequisite flags depend on each other.
    #[error("Circular dependency detected between the following depending flags: {0}.")]
    CircularDependency(String),

    /// Percentage options don't cover the `0..100` range.
    #[error("Sum of percentage option percentages is less than 100.")]
    PercentageSumInvalid,

    /// A matching targeting rule serves neither a value nor percentage options.
    #[error("Targeting rule THEN part is missing or invalid.")]
    TargetingRuleValueMissing,
}

impl EvaluationError {
    /// Return `true` if the error is caused by missing or unusable user data rather than a broken
    /// flag definition.
    pub fn is_contextual(&self) -> bool {
        matches!(
            self,
            EvaluationError::UserMissing
                | EvaluationError::AttributeMissing(_)
                | EvaluationError::AttributeInvalid { .. }
        )
    }
}
