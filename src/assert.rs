//! General-purpose assertion steps, built purely atop the [`Step`]
//! abstraction. Nothing here depends on HTTP.
//!
//! Each constructor returns a [`NamedStep`] whose evaluation is deferred
//! until a sequence runs it.

use std::any::type_name;
use std::fmt::Debug;

use serde::Serialize;

use crate::diff::{pretty_diff, text_diff};
use crate::error::StepError;
use crate::step::{NamedStep, Step};

/// Step that succeeds iff `value` is `None`.
pub fn expect_none<T>(value: Option<T>) -> NamedStep
where
    T: Debug + 'static,
{
    NamedStep::new("expect_none", move || match &value {
        None => Ok(()),
        Some(actual) => Err(StepError::Mismatch(format!(
            "expected None, got {actual:?}"
        ))),
    })
}

/// Step that succeeds iff the two values are structurally equal, compared as
/// serialized JSON rather than by identity. The failure message names both
/// values and their types.
pub fn expect_deep_equal<A, B>(actual: A, expected: B) -> NamedStep
where
    A: Serialize + 'static,
    B: Serialize + 'static,
{
    NamedStep::new("expect_deep_equal", move || {
        let have = serde_json::to_value(&actual)?;
        let want = serde_json::to_value(&expected)?;
        if have != want {
            return Err(StepError::Mismatch(format!(
                "expected {have} ({}), got {want} ({})",
                type_name::<A>(),
                type_name::<B>()
            )));
        }
        Ok(())
    })
}

/// Step that succeeds iff the two strings are equal; the failure message
/// carries an inline character diff.
pub fn expect_diff_equal(actual: impl Into<String>, expected: impl Into<String>) -> NamedStep {
    let actual = actual.into();
    let expected = expected.into();
    NamedStep::new("expect_diff_equal", move || {
        if actual != expected {
            return Err(StepError::Mismatch(format!(
                "expected equal strings, got diff: {}",
                text_diff(&expected, &actual)
            )));
        }
        Ok(())
    })
}

/// Step that succeeds iff a structural pretty-printer judges the two values
/// equal; the failure message carries a line diff with `-` marking what was
/// present and `+` what was wanted.
pub fn expect_pretty_equal<A, B>(actual: A, expected: B) -> NamedStep
where
    A: Serialize + 'static,
    B: Serialize + 'static,
{
    NamedStep::new("expect_pretty_equal", move || {
        let diff = pretty_diff(&actual, &expected)?;
        if !diff.is_empty() {
            return Err(StepError::Mismatch(format!(
                "expected equal values, got diff (-have +want):\n{diff}"
            )));
        }
        Ok(())
    })
}

/// Step that inverts another step: it succeeds iff the wrapped step fails.
/// The wrapped step's side effects still happen, exactly once per run.
pub fn expect_error(step: impl Step + 'static) -> NamedStep {
    let name = format!("expect_error({})", step.label().unwrap_or("step"));
    let mut step = step;
    NamedStep::new(name, move || match step.go() {
        Err(_) => Ok(()),
        Ok(()) => Err(StepError::Mismatch(
            "expected the step to fail, but it succeeded".to_owned(),
        )),
    })
}

/// First failure among a sequence of optional failure reasons, if any.
/// Combines independent precondition checks into one signal.
pub fn any_error<I>(reasons: I) -> Option<StepError>
where
    I: IntoIterator<Item = Option<StepError>>,
{
    reasons.into_iter().flatten().next()
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::step::step;

    fn message(step: &mut NamedStep) -> String {
        step.go().unwrap_err().to_string()
    }

    #[test]
    fn none_check() {
        assert!(expect_none::<i32>(None).go().is_ok());
        assert_eq!(
            message(&mut expect_none(Some(42))),
            "expected None, got 42"
        );
    }

    #[test]
    fn deep_equal_names_values_and_types() {
        assert!(expect_deep_equal("a", "a").go().is_ok());
        let text = message(&mut expect_deep_equal("a", "b"));
        assert_eq!(text, "expected \"a\" (&str), got \"b\" (&str)");
    }

    #[test]
    fn deep_equal_is_structural() {
        assert!(expect_deep_equal(vec![1, 2, 3], vec![1, 2, 3]).go().is_ok());
        assert!(expect_deep_equal(vec![1, 2, 3], vec![1, 2]).go().is_err());
    }

    #[test]
    fn diff_equal_output_is_deterministic() {
        assert!(expect_diff_equal("a", "a").go().is_ok());
        assert_eq!(
            message(&mut expect_diff_equal("a", "b")),
            "expected equal strings, got diff: [-b][+a]"
        );
    }

    #[test]
    fn pretty_equal_marks_have_and_want() {
        assert!(expect_pretty_equal("a", "a").go().is_ok());
        assert_eq!(
            message(&mut expect_pretty_equal("a", "b")),
            "expected equal values, got diff (-have +want):\n-\"a\"\n+\"b\""
        );
    }

    #[test]
    fn expect_error_inverts_and_runs_side_effects_once() {
        let runs = Rc::new(Cell::new(0));
        let effect = Rc::clone(&runs);
        let mut inverted = expect_error(step(move || {
            effect.set(effect.get() + 1);
            Err(StepError::Mismatch("planned".to_owned()))
        }));
        assert!(inverted.go().is_ok());
        assert_eq!(runs.get(), 1);

        let mut not_inverted = expect_error(step(|| Ok(())));
        assert!(not_inverted.go().is_err());
    }

    #[test]
    fn any_error_returns_first_failure() {
        assert!(any_error([None::<StepError>, None]).is_none());
        let found = any_error([
            None,
            Some(StepError::Mismatch("first".to_owned())),
            Some(StepError::Mismatch("second".to_owned())),
        ]);
        assert_eq!(found.map(|e| e.to_string()), Some("first".into()));
    }
}
