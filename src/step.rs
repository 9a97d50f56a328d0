//! The step execution model: a `Step` is a single, possibly-failing unit of
//! test action, and sequences compose steps with short-circuit-on-failure.

use std::fmt;

use crate::error::StepError;

/// A single, possibly-failing unit of test action.
///
/// Sequences and producers hold other `Step`s through [`BoxStep`], so steps
/// nest without limit.
pub trait Step {
    /// Perform the action. `Ok(())` means the step succeeded.
    fn go(&mut self) -> Result<(), StepError>;

    /// Display label used only for diagnostics; execution semantics never
    /// depend on it.
    fn label(&self) -> Option<&str> {
        None
    }
}

/// A boxed step, the unit sequences are built from.
pub type BoxStep = Box<dyn Step>;

impl Step for BoxStep {
    fn go(&mut self) -> Result<(), StepError> {
        (**self).go()
    }

    fn label(&self) -> Option<&str> {
        (**self).label()
    }
}

/// Plain function step wrapping any `FnMut() -> Result<(), StepError>`.
pub struct StepFn<F>(pub F);

impl<F> Step for StepFn<F>
where
    F: FnMut() -> Result<(), StepError>,
{
    fn go(&mut self) -> Result<(), StepError> {
        (self.0)()
    }
}

/// Wrap a closure as a step.
pub fn step<F>(action: F) -> StepFn<F>
where
    F: FnMut() -> Result<(), StepError>,
{
    StepFn(action)
}

/// A step carrying a human-readable label for diagnostics.
pub struct NamedStep {
    name: String,
    action: Box<dyn FnMut() -> Result<(), StepError>>,
}

impl NamedStep {
    pub fn new(
        name: impl Into<String>,
        action: impl FnMut() -> Result<(), StepError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            action: Box::new(action),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Step for NamedStep {
    fn go(&mut self) -> Result<(), StepError> {
        (self.action)()
    }

    fn label(&self) -> Option<&str> {
        Some(&self.name)
    }
}

impl fmt::Display for NamedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A step that defers construction of its underlying step until execution.
///
/// The factory is invoked exactly once per execution, at execution time, and
/// the produced step runs immediately. This lets a later step close over
/// state mutated by earlier steps in the same sequence.
pub struct StepProducer<F> {
    factory: F,
}

impl<F> StepProducer<F>
where
    F: FnMut() -> BoxStep,
{
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

impl<F> Step for StepProducer<F>
where
    F: FnMut() -> BoxStep,
{
    fn go(&mut self) -> Result<(), StepError> {
        let mut produced = (self.factory)();
        produced.go()
    }

    fn label(&self) -> Option<&str> {
        Some("step_producer")
    }
}

/// Result of running a sequence: the executed prefix and the error, if any.
///
/// The prefix always includes the failing step, so on failure the last
/// element of `achieved` is the step that failed. On full success `achieved`
/// is the whole input sequence.
pub struct RunResult<'a> {
    pub achieved: &'a [BoxStep],
    pub error: Option<StepError>,
}

impl RunResult<'_> {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Diagnostic rendering: the achieved step labels followed by the error.
    pub fn summary(&self) -> String {
        match &self.error {
            Some(error) => format!(
                "achieved steps: {}; error: {error}",
                describe_steps(self.achieved)
            ),
            None => format!("achieved steps: {}", describe_steps(self.achieved)),
        }
    }
}

fn describe_steps(steps: &[BoxStep]) -> String {
    let labels: Vec<&str> = steps
        .iter()
        .map(|step| step.label().unwrap_or("(unnamed step)"))
        .collect();
    format!("[{}]", labels.join(", "))
}

/// The surrounding test framework's failure sink. Receiving a message marks
/// the test failed; implementations are expected to halt the test.
pub trait Harness {
    fn fatal(&self, message: &str);
}

/// Harness that panics with the failure message, which is how a Rust test
/// marks itself failed and halts.
pub struct PanicHarness;

impl Harness for PanicHarness {
    fn fatal(&self, message: &str) {
        panic!("{message}");
    }
}

/// An ordered, pre-built sequence of steps, executed strictly in order with
/// short-circuit on the first failure. A `Steps` is itself a [`Step`].
#[derive(Default)]
pub struct Steps {
    steps: Vec<BoxStep>,
}

impl Steps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: impl Step + 'static) {
        self.steps.push(Box::new(step));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn as_slice(&self) -> &[BoxStep] {
        &self.steps
    }

    /// Execute the steps in order, stopping at the first failure. An empty
    /// sequence succeeds trivially.
    pub fn run(&mut self) -> RunResult<'_> {
        for index in 0..self.steps.len() {
            if let Err(error) = self.steps[index].go() {
                log::debug!(
                    "step {} failed: {error}",
                    self.steps[index].label().unwrap_or("(unnamed step)")
                );
                return RunResult {
                    achieved: &self.steps[..=index],
                    error: Some(error),
                };
            }
            log::debug!(
                "step {} ok",
                self.steps[index].label().unwrap_or("(unnamed step)")
            );
        }
        RunResult {
            achieved: &self.steps,
            error: None,
        }
    }

    /// Run the sequence and, if a harness is supplied and a step failed,
    /// signal the harness with the achieved steps and the error. Without a
    /// harness the result is returned for custom handling.
    pub fn run_and_report(&mut self, harness: Option<&dyn Harness>) -> RunResult<'_> {
        let result = self.run();
        if let (Some(harness), Some(_)) = (harness, &result.error) {
            harness.fatal(&result.summary());
        }
        result
    }

    /// Run under a panicking harness; the usual entry point inside `#[test]`
    /// functions.
    pub fn test(&mut self) {
        self.run_and_report(Some(&PanicHarness));
    }
}

impl From<Vec<BoxStep>> for Steps {
    fn from(steps: Vec<BoxStep>) -> Self {
        Self { steps }
    }
}

impl Step for Steps {
    fn go(&mut self) -> Result<(), StepError> {
        match self.run().error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn label(&self) -> Option<&str> {
        Some("steps")
    }
}

/// A lazily-produced sequence: steps are pulled from an iterator one at a
/// time, so a step's identity may depend on state mutated by the steps run
/// before it.
pub struct LazySteps<I> {
    source: I,
}

impl<I> LazySteps<I>
where
    I: Iterator<Item = BoxStep>,
{
    pub fn new<S>(source: S) -> Self
    where
        S: IntoIterator<Item = BoxStep, IntoIter = I>,
    {
        Self {
            source: source.into_iter(),
        }
    }

    /// Pull and execute steps until the source is exhausted or a step
    /// fails. Returns the executed prefix (owned, including any failing
    /// step) and the error, if any.
    pub fn run(mut self) -> (Steps, Option<StepError>) {
        let mut achieved: Vec<BoxStep> = Vec::new();
        for mut step in self.source.by_ref() {
            let outcome = step.go();
            achieved.push(step);
            if let Err(error) = outcome {
                return (Steps::from(achieved), Some(error));
            }
        }
        (Steps::from(achieved), None)
    }

    /// Counterpart of [`Steps::run_and_report`] for lazy sequences.
    pub fn run_and_report(self, harness: Option<&dyn Harness>) -> (Steps, Option<StepError>) {
        let (achieved, error) = self.run();
        if let (Some(harness), Some(error)) = (harness, &error) {
            harness.fatal(&format!(
                "achieved steps: {}; error: {error}",
                describe_steps(achieved.as_slice())
            ));
        }
        (achieved, error)
    }

    pub fn test(self) {
        self.run_and_report(Some(&PanicHarness));
    }
}

impl<I> Step for LazySteps<I>
where
    I: Iterator<Item = BoxStep>,
{
    fn go(&mut self) -> Result<(), StepError> {
        for mut step in self.source.by_ref() {
            step.go()?;
        }
        Ok(())
    }

    fn label(&self) -> Option<&str> {
        Some("lazy_steps")
    }
}

/// Build a [`Steps`] sequence from a comma-separated list of steps, boxing
/// each one.
#[macro_export]
macro_rules! steps {
    ($($step:expr),* $(,)?) => {
        $crate::Steps::from(vec![$(Box::new($step) as $crate::BoxStep),*])
    };
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;

    fn counting_step(counter: &Rc<Cell<usize>>) -> impl Step + use<> {
        let counter = Rc::clone(counter);
        step(move || {
            counter.set(counter.get() + 1);
            Ok(())
        })
    }

    fn failing_step(message: &str) -> NamedStep {
        let message = message.to_owned();
        NamedStep::new("failing", move || {
            Err(StepError::Mismatch(message.clone()))
        })
    }

    #[test]
    fn empty_sequence_succeeds() {
        let mut steps = Steps::new();
        let result = steps.run();
        assert!(result.is_success());
        assert!(result.achieved.is_empty());
    }

    #[test]
    fn full_success_returns_whole_sequence() {
        let counter = Rc::new(Cell::new(0));
        let mut steps = steps![
            counting_step(&counter),
            counting_step(&counter),
            counting_step(&counter),
        ];
        let result = steps.run();
        assert!(result.is_success());
        assert_eq!(result.achieved.len(), 3);
        assert_eq!(counter.get(), 3);
    }

    #[test]
    fn failure_stops_execution_and_includes_failing_step() {
        let counter = Rc::new(Cell::new(0));
        let mut steps = steps![
            counting_step(&counter),
            counting_step(&counter),
            failing_step("boom"),
            counting_step(&counter),
        ];
        let result = steps.run();
        assert_eq!(result.achieved.len(), 3);
        assert_eq!(result.achieved.last().and_then(|s| s.label()), Some("failing"));
        assert_eq!(result.error.as_ref().map(ToString::to_string), Some("boom".into()));
        // the step after the failure never ran
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn sequences_nest_as_steps() {
        let counter = Rc::new(Cell::new(0));
        let inner = steps![counting_step(&counter), counting_step(&counter)];
        let mut outer = steps![counting_step(&counter), inner];
        assert!(outer.run().is_success());
        assert_eq!(counter.get(), 3);
    }

    #[test]
    fn producer_factory_runs_only_at_execution_time() {
        let invoked = Rc::new(Cell::new(0));
        let factory_flag = Rc::clone(&invoked);
        let mut producer = StepProducer::new(move || {
            factory_flag.set(factory_flag.get() + 1);
            Box::new(step(|| Ok(()))) as BoxStep
        });
        assert_eq!(invoked.get(), 0);
        producer.go().unwrap();
        assert_eq!(invoked.get(), 1);
        producer.go().unwrap();
        assert_eq!(invoked.get(), 2);
    }

    #[test]
    fn lazy_steps_see_state_from_earlier_steps() {
        let value = Rc::new(RefCell::new(String::new()));
        let writer = Rc::clone(&value);
        let reader = Rc::clone(&value);
        let source: Vec<BoxStep> = vec![
            Box::new(step(move || {
                *writer.borrow_mut() = "foo".to_owned();
                Ok(())
            })),
            Box::new(StepProducer::new(move || {
                let current = reader.borrow().clone();
                Box::new(step(move || {
                    if current == "foo" {
                        Ok(())
                    } else {
                        Err(StepError::Mismatch(format!("unexpected value: {current}")))
                    }
                })) as BoxStep
            })),
        ];
        let (achieved, error) = LazySteps::new(source).run();
        assert!(error.is_none());
        assert_eq!(achieved.len(), 2);
    }

    #[test]
    fn lazy_steps_short_circuit() {
        let counter = Rc::new(Cell::new(0));
        let source: Vec<BoxStep> = vec![
            Box::new(failing_step("first")),
            Box::new(counting_step(&counter)),
        ];
        let (achieved, error) = LazySteps::new(source).run();
        assert_eq!(achieved.len(), 1);
        assert_eq!(error.map(|e| e.to_string()), Some("first".into()));
        assert_eq!(counter.get(), 0);
    }

    struct Recording(RefCell<Option<String>>);

    impl Harness for Recording {
        fn fatal(&self, message: &str) {
            *self.0.borrow_mut() = Some(message.to_owned());
        }
    }

    #[test]
    fn report_includes_achieved_steps_and_error() {
        let harness = Recording(RefCell::new(None));
        let mut steps = steps![
            NamedStep::new("first", || Ok(())),
            failing_step("went wrong"),
        ];
        steps.run_and_report(Some(&harness));
        let message = harness.0.borrow().clone().unwrap();
        assert_eq!(
            message,
            "achieved steps: [first, failing]; error: went wrong"
        );
    }

    #[test]
    fn report_without_harness_returns_result() {
        let mut steps = steps![failing_step("quiet")];
        let result = steps.run_and_report(None);
        assert_eq!(result.achieved.len(), 1);
        assert!(!result.is_success());
    }

    #[test]
    #[should_panic(expected = "quiet")]
    fn panic_harness_panics_with_summary() {
        steps![failing_step("quiet")].test();
    }
}
