use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::answers::{AnswerSet, AnswerValue, StepKey};
use crate::domain::price_table::{PriceTable, PriceTableError, SelectionMode};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardKind {
    PricingSimulator,
    AuditRequest,
}

impl WizardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PricingSimulator => "pricing_simulator",
            Self::AuditRequest => "audit_request",
        }
    }
}

impl std::fmt::Display for WizardKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WizardKind {
    type Err = DefinitionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pricing_simulator" | "pricing" => Ok(Self::PricingSimulator),
            "audit_request" | "audit" => Ok(Self::AuditRequest),
            other => Err(DefinitionError::UnknownKind(other.to_owned())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOption {
    pub key: String,
    pub label: String,
}

impl StepOption {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self { key: key.into(), label: label.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    Text {
        #[serde(default)]
        optional: bool,
    },
    SingleSelect {
        options: Vec<StepOption>,
    },
    MultiSelect {
        options: Vec<StepOption>,
        #[serde(default)]
        required: bool,
    },
    Numeric {
        min: i64,
        max: i64,
        default: i64,
    },
    Contact,
}

impl StepKind {
    pub fn options(&self) -> &[StepOption] {
        match self {
            Self::SingleSelect { options } | Self::MultiSelect { options, .. } => options,
            _ => &[],
        }
    }

    /// Whether `value` has the shape this step collects.
    pub fn accepts(&self, value: &AnswerValue) -> bool {
        matches!(
            (self, value),
            (Self::Text { .. }, AnswerValue::Text(_))
                | (Self::SingleSelect { .. }, AnswerValue::Choice(_))
                | (Self::MultiSelect { .. }, AnswerValue::Choices(_))
                | (Self::Numeric { .. }, AnswerValue::Number(_))
                | (Self::Contact, AnswerValue::Contact(_))
        )
    }

    pub fn expected_shape(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::SingleSelect { .. } => "choice",
            Self::MultiSelect { .. } => "choices",
            Self::Numeric { .. } => "number",
            Self::Contact => "contact",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub key: StepKey,
    pub title: String,
    #[serde(flatten)]
    pub kind: StepKind,
}

impl StepDefinition {
    pub fn new(key: impl Into<StepKey>, title: impl Into<String>, kind: StepKind) -> Self {
        Self { key: key.into(), title: title.into(), kind }
    }

    pub fn is_complete(&self, answer: Option<&AnswerValue>) -> bool {
        match (&self.kind, answer) {
            (StepKind::Text { optional: true }, _) => true,
            (StepKind::Text { optional: false }, Some(AnswerValue::Text(text))) => {
                !text.trim().is_empty()
            }
            (StepKind::SingleSelect { .. }, Some(AnswerValue::Choice(choice))) => {
                !choice.trim().is_empty()
            }
            (StepKind::MultiSelect { required: false, .. }, _) => true,
            (StepKind::MultiSelect { required: true, .. }, Some(AnswerValue::Choices(choices))) => {
                !choices.is_empty()
            }
            (StepKind::Numeric { .. }, _) => true,
            (StepKind::Contact, Some(AnswerValue::Contact(contact))) => contact.is_complete(),
            _ => false,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("unknown wizard kind `{0}` (expected pricing_simulator|audit_request)")]
    UnknownKind(String),
    #[error("wizard must declare at least one step")]
    NoSteps,
    #[error("step `{0}` is declared more than once")]
    DuplicateStep(StepKey),
    #[error("step `{step}` declares option `{option}` more than once")]
    DuplicateOption { step: StepKey, option: String },
    #[error("numeric step `{0}` requires min <= default <= max")]
    InvalidNumericRange(StepKey),
    #[error("wizard must end with exactly one contact step")]
    ContactStepNotLast,
    #[error("price group `{0}` does not match any step")]
    UnknownPricedStep(StepKey),
    #[error("price group `{step}` expects a {expected} step")]
    PricedStepShape { step: StepKey, expected: &'static str },
    #[error("price rule `{rule}` is not an option of step `{step}`")]
    UnknownRuleOption { step: StepKey, rule: String },
    #[error(transparent)]
    PriceTable(#[from] PriceTableError),
    #[error("could not parse wizard definition: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize)]
struct WizardDefinitionSpec {
    kind: WizardKind,
    steps: Vec<StepDefinition>,
    price_table: PriceTable,
}

/// A validated, immutable wizard: ordered steps plus the price table that
/// prices them. Loaded once and shared by every session of that wizard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WizardDefinitionSpec")]
pub struct WizardDefinition {
    kind: WizardKind,
    steps: Vec<StepDefinition>,
    price_table: PriceTable,
}

impl TryFrom<WizardDefinitionSpec> for WizardDefinition {
    type Error = DefinitionError;

    fn try_from(spec: WizardDefinitionSpec) -> Result<Self, Self::Error> {
        Self::new(spec.kind, spec.steps, spec.price_table)
    }
}

impl WizardDefinition {
    pub fn new(
        kind: WizardKind,
        steps: Vec<StepDefinition>,
        price_table: PriceTable,
    ) -> Result<Self, DefinitionError> {
        validate_steps(&steps)?;
        validate_price_table(&steps, &price_table)?;
        Ok(Self { kind, steps, price_table })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, DefinitionError> {
        toml::from_str(raw).map_err(|error| DefinitionError::Parse(error.to_string()))
    }

    pub fn kind(&self) -> WizardKind {
        self.kind
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn step(&self, index: usize) -> Option<&StepDefinition> {
        self.steps.get(index)
    }

    pub fn step_by_key(&self, key: &StepKey) -> Option<&StepDefinition> {
        self.steps.iter().find(|step| &step.key == key)
    }

    pub fn last_step_index(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    pub fn contact_step(&self) -> &StepDefinition {
        &self.steps[self.last_step_index()]
    }

    pub fn price_table(&self) -> &PriceTable {
        &self.price_table
    }

    /// Numeric steps start at their default and multi-select steps at an empty
    /// selection; every other step starts unanswered.
    pub fn default_answers(&self) -> AnswerSet {
        let mut answers = AnswerSet::new();
        for step in &self.steps {
            match &step.kind {
                StepKind::Numeric { default, .. } => {
                    answers.insert(step.key.clone(), AnswerValue::Number(*default));
                }
                StepKind::MultiSelect { .. } => {
                    answers.insert(step.key.clone(), AnswerValue::Choices(BTreeSet::new()));
                }
                _ => {}
            }
        }
        answers
    }

    pub fn is_step_complete(&self, index: usize, answers: &AnswerSet) -> bool {
        self.steps.get(index).is_some_and(|step| step.is_complete(answers.get(&step.key)))
    }
}

fn validate_steps(steps: &[StepDefinition]) -> Result<(), DefinitionError> {
    if steps.is_empty() {
        return Err(DefinitionError::NoSteps);
    }

    let mut seen: HashSet<&StepKey> = HashSet::new();
    for step in steps {
        if !seen.insert(&step.key) {
            return Err(DefinitionError::DuplicateStep(step.key.clone()));
        }

        let mut options: HashSet<&str> = HashSet::new();
        for option in step.kind.options() {
            if !options.insert(option.key.as_str()) {
                return Err(DefinitionError::DuplicateOption {
                    step: step.key.clone(),
                    option: option.key.clone(),
                });
            }
        }

        if let StepKind::Numeric { min, max, default } = step.kind {
            if !(min <= default && default <= max) {
                return Err(DefinitionError::InvalidNumericRange(step.key.clone()));
            }
        }
    }

    let contact_steps = steps.iter().filter(|step| step.kind == StepKind::Contact).count();
    let ends_with_contact = steps.last().is_some_and(|step| step.kind == StepKind::Contact);
    if contact_steps != 1 || !ends_with_contact {
        return Err(DefinitionError::ContactStepNotLast);
    }

    Ok(())
}

fn validate_price_table(
    steps: &[StepDefinition],
    table: &PriceTable,
) -> Result<(), DefinitionError> {
    let find = |key: &StepKey| {
        steps
            .iter()
            .find(|step| &step.key == key)
            .ok_or_else(|| DefinitionError::UnknownPricedStep(key.clone()))
    };

    for group in table.groups() {
        let step = find(&group.step_key)?;
        let shape_matches = matches!(
            (&step.kind, group.selection_mode),
            (StepKind::SingleSelect { .. }, SelectionMode::Single)
                | (StepKind::MultiSelect { .. }, SelectionMode::Multiple)
        );
        if !shape_matches {
            let expected = match group.selection_mode {
                SelectionMode::Single => "single_select",
                SelectionMode::Multiple => "multi_select",
            };
            return Err(DefinitionError::PricedStepShape { step: step.key.clone(), expected });
        }

        for rule in &group.rules {
            if !step.kind.options().iter().any(|option| option.key == rule.key) {
                return Err(DefinitionError::UnknownRuleOption {
                    step: step.key.clone(),
                    rule: rule.key.clone(),
                });
            }
        }
    }

    if let Some(unit) = table.unit_pricing() {
        let step = find(&unit.step_key)?;
        if !matches!(step.kind, StepKind::Numeric { .. }) {
            return Err(DefinitionError::PricedStepShape {
                step: step.key.clone(),
                expected: "numeric",
            });
        }
    }

    Ok(())
}
