//! The dataset wizard as a state machine.
//!
//! [`WorkflowState`] holds one session's choices. Whether the session may
//! move forward is a pure function of that state ([`can_advance`]), so the
//! gating rules are testable without any I/O. [`WorkflowController`] drives
//! the same state against a [`crate::service::ForgeService`].

pub mod controller;

pub use controller::WorkflowController;

use serde::Serialize;

use crate::datasource::Document;
use crate::generator::Dataset;

/// Wizard steps, numbered 1 to 5.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "u8")]
pub enum Step {
    #[default]
    SelectDataSource = 1,
    SelectLlm = 2,
    ConfigureGenerator = 3,
    Generating = 4,
    Preview = 5,
}

impl Step {
    pub const FIRST: Step = Step::SelectDataSource;
    pub const LAST: Step = Step::Preview;

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(n: u8) -> Option<Step> {
        match n {
            1 => Some(Self::SelectDataSource),
            2 => Some(Self::SelectLlm),
            3 => Some(Self::ConfigureGenerator),
            4 => Some(Self::Generating),
            5 => Some(Self::Preview),
            _ => None,
        }
    }

    fn next(self) -> Option<Step> {
        Self::from_number(self.number() + 1)
    }

    fn previous(self) -> Option<Step> {
        self.number().checked_sub(1).and_then(Self::from_number)
    }
}

impl From<Step> for u8 {
    fn from(step: Step) -> u8 {
        step.number()
    }
}

/// One wizard session. Holds instance ids only, never instances.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkflowState {
    pub step: Step,
    pub active_data_source: Option<String>,
    pub active_llm: Option<String>,
    pub active_generator: Option<String>,
    pub documents: Vec<Document>,
    pub generated_dataset: Option<Dataset>,
    pub error: Option<String>,
}

/// Derived view of a state for progress display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub step: Step,
    pub can_advance: bool,
    pub percent: u8,
}

/// Whether the precondition for leaving the current step holds.
///
/// Step 5 never advances; a new run starts with [`WorkflowState::reset`].
pub fn can_advance(state: &WorkflowState) -> bool {
    match state.step {
        Step::SelectDataSource => state.active_data_source.is_some() && !state.documents.is_empty(),
        Step::SelectLlm => state.active_llm.is_some(),
        Step::ConfigureGenerator => state.active_generator.is_some(),
        Step::Generating => state.generated_dataset.is_some(),
        Step::Preview => false,
    }
}

pub fn progress(state: &WorkflowState) -> Progress {
    let done = u16::from(state.step.number() - Step::FIRST.number());
    let total = u16::from(Step::LAST.number() - Step::FIRST.number());
    Progress {
        step: state.step,
        can_advance: can_advance(state),
        percent: (done * 100 / total) as u8,
    }
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves one step forward if [`can_advance`] holds. Leaves the state
    /// untouched otherwise. Leaving step 3 is [`begin_generation`](Self::begin_generation).
    pub fn advance(&mut self) -> bool {
        if self.step == Step::ConfigureGenerator {
            return self.begin_generation();
        }
        if !can_advance(self) {
            return false;
        }
        match self.step.next() {
            Some(next) => {
                self.step = next;
                true
            }
            None => false,
        }
    }

    /// Moves one step back, never below step 1. Collected data is kept.
    pub fn back(&mut self) -> bool {
        match self.step.previous() {
            Some(previous) => {
                self.step = previous;
                true
            }
            None => false,
        }
    }

    /// Clears everything and returns to step 1. Instances are left alone.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn select_data_source(&mut self, instance_id: impl Into<String>, documents: Vec<Document>) {
        self.active_data_source = Some(instance_id.into());
        self.documents = documents;
        self.error = None;
    }

    pub fn select_llm(&mut self, instance_id: impl Into<String>) {
        self.active_llm = Some(instance_id.into());
        self.error = None;
    }

    pub fn select_generator(&mut self, instance_id: impl Into<String>) {
        self.active_generator = Some(instance_id.into());
        self.error = None;
    }

    /// Enters step 4 from step 3. Returns false, changing nothing, when not
    /// at step 3 or no generator is selected.
    pub fn begin_generation(&mut self) -> bool {
        if self.step != Step::ConfigureGenerator || !can_advance(self) {
            return false;
        }
        self.step = Step::Generating;
        self.generated_dataset = None;
        self.error = None;
        true
    }

    /// Records the outcome of a generation started with
    /// [`begin_generation`](Self::begin_generation). Success moves to step 5;
    /// failure stays at step 4 with the error set.
    pub fn finish_generation(&mut self, outcome: Result<Dataset, String>) {
        if self.step != Step::Generating {
            return;
        }
        match outcome {
            Ok(dataset) => {
                self.generated_dataset = Some(dataset);
                self.error = None;
                self.step = Step::Preview;
            }
            Err(message) => {
                self.error = Some(message);
            }
        }
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }
}
