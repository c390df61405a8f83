//! Context for evaluating guard predicates during a plan walk

use crate::core::condition::{Guard, GuardExpr, GuardInputs, GuardSyntaxError};
use crate::core::step::Setting;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Values for guard operands the plan cannot interpret itself
///
/// An executor that knows the run's event, ref and secrets would answer
/// `github.ref == 'refs/heads/main'` for real. A simulated walk looks the
/// expression up here instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardContext {
    /// Expression text (normalised spacing) to value
    pub assumptions: HashMap<String, bool>,

    /// Value used for expressions not in `assumptions`
    pub default_value: bool,
}

impl GuardContext {
    pub fn new(default_value: bool) -> Self {
        Self {
            assumptions: HashMap::new(),
            default_value,
        }
    }

    pub fn assume(&mut self, expression: impl Into<String>, value: bool) {
        self.assumptions.insert(expression.into(), value);
    }

    /// Record an assumption written as expression source, normalised the
    /// way guards store their operands
    pub fn assume_source(&mut self, source: &str, value: bool) -> Result<(), GuardSyntaxError> {
        let key = match Guard::parse(source)?.expr() {
            Some(GuardExpr::Opaque(text)) => text.clone(),
            _ => source.trim().to_string(),
        };
        self.assume(key, value);
        Ok(())
    }

    pub fn resolve(&self, expression: &str) -> bool {
        self.assumptions
            .get(expression)
            .copied()
            .unwrap_or(self.default_value)
    }

    /// Value of a boolean setting such as `continue-on-error`. An
    /// expression is answered like a guard operand.
    pub fn flag(&self, setting: &Setting<bool>) -> bool {
        match setting {
            Setting::Value(value) => *value,
            Setting::Expression(source) => match Guard::parse(source) {
                Ok(guard) => guard.evaluate(&self.with_status(false, false)),
                Err(_) => self.default_value,
            },
        }
    }

    /// Bind prior-outcome facts to this context for one guard evaluation
    pub fn with_status(&self, failed: bool, cancelled: bool) -> StatusView<'_> {
        StatusView {
            context: self,
            failed,
            cancelled,
        }
    }
}

/// A `GuardContext` plus the outcome of whatever ran before
pub struct StatusView<'a> {
    context: &'a GuardContext,
    failed: bool,
    cancelled: bool,
}

impl GuardInputs for StatusView<'_> {
    fn failed(&self) -> bool {
        self.failed
    }

    fn cancelled(&self) -> bool {
        self.cancelled
    }

    fn resolve(&self, expression: &str) -> bool {
        self.context.resolve(expression)
    }
}
