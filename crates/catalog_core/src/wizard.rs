use std::fmt;

/// One required input applied while a wizard step is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepInput {
    /// Click the first visible control whose label matches any candidate.
    Choose(Vec<String>),
    /// Fill a form control.
    Fill { selector: String, value: String },
    /// Toggle a checkbox or switch.
    Toggle(String),
}

/// A single wizard step: a bounded state transition with its own completion
/// signal. Inputs are configured per deployment, not discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSpec {
    /// Ordinal position, 1-based.
    pub index: u8,
    /// Element that must be present before the step's inputs are applied.
    pub anchor: String,
    pub inputs: Vec<StepInput>,
    /// Label candidates for the advance control ("Next", "Continue", ...).
    pub advance: Vec<String>,
    /// Element whose presence marks the step as completed. On the final step
    /// this is the table-view anchor.
    pub completion: String,
}

/// The fixed sequence of configuration steps between login and the table
/// view, validated so step-skipping is structurally impossible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardPlan {
    steps: Vec<StepSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    Empty,
    /// Step indices must be exactly 1..=n in order.
    NonSequential { position: usize, found: u8 },
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::Empty => write!(f, "wizard plan has no steps"),
            PlanError::NonSequential { position, found } => {
                write!(
                    f,
                    "wizard step at position {position} has index {found}, expected {}",
                    position + 1
                )
            }
        }
    }
}

impl std::error::Error for PlanError {}

impl WizardPlan {
    pub fn new(steps: Vec<StepSpec>) -> Result<Self, PlanError> {
        if steps.is_empty() {
            return Err(PlanError::Empty);
        }
        for (position, step) in steps.iter().enumerate() {
            if usize::from(step.index) != position + 1 {
                return Err(PlanError::NonSequential {
                    position,
                    found: step.index,
                });
            }
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[StepSpec] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Tracks which step may run next. The page remains the source of truth for
/// step state; the cursor only enforces ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardCursor {
    expected: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardStateError {
    pub expected: u8,
    pub attempted: u8,
}

impl fmt::Display for WizardStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "wizard step {} attempted while step {} is pending",
            self.attempted, self.expected
        )
    }
}

impl std::error::Error for WizardStateError {}

impl WizardCursor {
    pub fn new() -> Self {
        Self { expected: 1 }
    }

    /// The index of the next step that must complete.
    pub fn expected(&self) -> u8 {
        self.expected
    }

    /// Records completion of a step. Rejects any step other than the one
    /// whose predecessor's completion marker was already observed.
    pub fn complete(&mut self, index: u8) -> Result<(), WizardStateError> {
        if index != self.expected {
            return Err(WizardStateError {
                expected: self.expected,
                attempted: index,
            });
        }
        self.expected += 1;
        Ok(())
    }

    /// True once every step of `plan` has completed in order.
    pub fn is_terminal(&self, plan: &WizardPlan) -> bool {
        usize::from(self.expected) > plan.len()
    }
}

impl Default for WizardCursor {
    fn default() -> Self {
        Self::new()
    }
}
