//! Built-in rules

pub mod prefer_double_literals;
pub mod unsafe_html;

use crate::rule::Rule;

/// Every built-in rule, in registration order
pub fn builtin_rules() -> Vec<Rule> {
    vec![unsafe_html::rule(), prefer_double_literals::rule()]
}
