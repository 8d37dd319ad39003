use crate::value::Value;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EvaluationError {
    message: String,
}

impl EvaluationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Domain-specific check attached to schemas through the `validate` keyword.
///
/// The engine calls [`Evaluator::evaluate`] once for every node it visits
/// that declares the keyword, passing the keyword's payload untouched and
/// the path from the instance root to the value under that node. It calls
/// synchronously and holds no lock while doing so; an evaluator shared
/// across threads must be safe for concurrent calls on its own.
pub trait Evaluator {
    fn evaluate(&self, expression: &Value, field_path: &[String]) -> Result<(), EvaluationError>;
}

impl<F> Evaluator for F
where
    F: Fn(&Value, &[String]) -> Result<(), EvaluationError>,
{
    fn evaluate(&self, expression: &Value, field_path: &[String]) -> Result<(), EvaluationError> {
        self(expression, field_path)
    }
}

/// Accepts everything. Used when no evaluator is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopEvaluator;

impl Evaluator for NoopEvaluator {
    fn evaluate(&self, _: &Value, _: &[String]) -> Result<(), EvaluationError> {
        Ok(())
    }
}
