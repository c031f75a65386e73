use crate::{model::Setting, User};

/// State of the evaluation of a single flag. Prerequisite flags get their own context but share
/// the list of visited keys with their dependents.
pub(super) struct EvaluationContext<'a, 'v> {
    pub key: &'a str,
    pub setting: &'a Setting,
    pub user: Option<&'a User>,
    /// Keys of the flags on the current prerequisite path.
    pub visited_keys: &'v mut Vec<&'a str>,
    user_missing_logged: bool,
    percentage_attribute_missing_logged: bool,
}

impl<'a, 'v> EvaluationContext<'a, 'v> {
    pub fn new(
        key: &'a str,
        setting: &'a Setting,
        user: Option<&'a User>,
        visited_keys: &'v mut Vec<&'a str>,
    ) -> Self {
        EvaluationContext {
            key,
            setting,
            user,
            visited_keys,
            user_missing_logged: false,
            percentage_attribute_missing_logged: false,
        }
    }

    /// Warn about the missing user object, at most once per flag.
    pub fn log_user_missing(&mut self) {
        if self.user_missing_logged {
            return;
        }
        self.user_missing_logged = true;
        log::warn!(target: "configcat", event_id = 3001;
            "Cannot evaluate targeting rules and % options for setting '{}' (User Object is missing). You should pass a User Object to the evaluation methods like `get_value()` in order to make targeting work properly. Read more: https://configcat.com/docs/advanced/user-object/",
            self.key);
    }

    /// Warn about the missing percentage attribute, at most once per flag.
    pub fn log_percentage_attribute_missing(&mut self, attribute: &str) {
        if self.percentage_attribute_missing_logged {
            return;
        }
        self.percentage_attribute_missing_logged = true;
        log::warn!(target: "configcat", event_id = 3003;
            "Cannot evaluate % options for setting '{}' (the User.{attribute} attribute is missing). You should set the User.{attribute} attribute in order to make targeting work properly. Read more: https://configcat.com/docs/advanced/user-object/",
            self.key);
    }
}
