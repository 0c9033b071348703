use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::answers::StepKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    Single,
    Multiple,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRule {
    pub key: String,
    pub label: String,
    pub delta_amount: i64,
}

impl PriceRule {
    pub fn new(key: impl Into<String>, label: impl Into<String>, delta_amount: i64) -> Self {
        Self { key: key.into(), label: label.into(), delta_amount }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRuleGroup {
    pub step_key: StepKey,
    pub selection_mode: SelectionMode,
    pub rules: Vec<PriceRule>,
}

impl PriceRuleGroup {
    pub fn single(step_key: impl Into<StepKey>, rules: Vec<PriceRule>) -> Self {
        Self { step_key: step_key.into(), selection_mode: SelectionMode::Single, rules }
    }

    pub fn multiple(step_key: impl Into<StepKey>, rules: Vec<PriceRule>) -> Self {
        Self { step_key: step_key.into(), selection_mode: SelectionMode::Multiple, rules }
    }

    pub fn rule(&self, key: &str) -> Option<&PriceRule> {
        self.rules.iter().find(|rule| rule.key == key)
    }
}

/// Linear overage pricing for a numeric step: every unit above
/// `included_threshold` costs `per_unit_amount`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPricing {
    pub step_key: StepKey,
    pub included_threshold: i64,
    pub per_unit_amount: i64,
}

impl UnitPricing {
    pub fn overage(&self, answered: i64) -> i64 {
        answered.saturating_sub(self.included_threshold).max(0).saturating_mul(self.per_unit_amount)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PriceTableError {
    #[error("base_price must be non-negative, got {0}")]
    NegativeBasePrice(i64),
    #[error("price_floor must be non-negative, got {0}")]
    NegativeFloor(i64),
    #[error("price group for step `{0}` is declared more than once")]
    DuplicateGroup(StepKey),
    #[error("price group `{step_key}` declares rule `{rule_key}` more than once")]
    DuplicateRule { step_key: StepKey, rule_key: String },
    #[error("price group `{0}` contains a rule with an empty key")]
    EmptyRuleKey(StepKey),
    #[error("unit pricing for `{0}` must have a non-negative included threshold")]
    NegativeThreshold(StepKey),
}

#[derive(Debug, Deserialize)]
struct PriceTableSpec {
    #[serde(default)]
    base_price: i64,
    #[serde(default)]
    price_floor: i64,
    #[serde(default)]
    groups: Vec<PriceRuleGroup>,
    #[serde(default)]
    unit_pricing: Option<UnitPricing>,
}

/// Immutable price configuration for one wizard. Only obtainable through
/// [`PriceTable::new`], which rejects malformed tables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PriceTableSpec")]
pub struct PriceTable {
    base_price: i64,
    price_floor: i64,
    groups: Vec<PriceRuleGroup>,
    unit_pricing: Option<UnitPricing>,
}

impl TryFrom<PriceTableSpec> for PriceTable {
    type Error = PriceTableError;

    fn try_from(spec: PriceTableSpec) -> Result<Self, Self::Error> {
        Self::new(spec.base_price, spec.price_floor, spec.groups, spec.unit_pricing)
    }
}

impl PriceTable {
    pub fn new(
        base_price: i64,
        price_floor: i64,
        groups: Vec<PriceRuleGroup>,
        unit_pricing: Option<UnitPricing>,
    ) -> Result<Self, PriceTableError> {
        if base_price < 0 {
            return Err(PriceTableError::NegativeBasePrice(base_price));
        }
        if price_floor < 0 {
            return Err(PriceTableError::NegativeFloor(price_floor));
        }

        let mut seen_groups: HashSet<&StepKey> = HashSet::new();
        for group in &groups {
            if !seen_groups.insert(&group.step_key) {
                return Err(PriceTableError::DuplicateGroup(group.step_key.clone()));
            }

            let mut seen_rules: HashSet<&str> = HashSet::new();
            for rule in &group.rules {
                if rule.key.trim().is_empty() {
                    return Err(PriceTableError::EmptyRuleKey(group.step_key.clone()));
                }
                if !seen_rules.insert(rule.key.as_str()) {
                    return Err(PriceTableError::DuplicateRule {
                        step_key: group.step_key.clone(),
                        rule_key: rule.key.clone(),
                    });
                }
            }
        }

        if let Some(unit) = &unit_pricing {
            if seen_groups.contains(&unit.step_key) {
                return Err(PriceTableError::DuplicateGroup(unit.step_key.clone()));
            }
            if unit.included_threshold < 0 {
                return Err(PriceTableError::NegativeThreshold(unit.step_key.clone()));
            }
        }

        Ok(Self { base_price, price_floor, groups, unit_pricing })
    }

    /// A table with no priced steps at all.
    pub fn flat(base_price: i64) -> Result<Self, PriceTableError> {
        Self::new(base_price, 0, Vec::new(), None)
    }

    pub fn base_price(&self) -> i64 {
        self.base_price
    }

    pub fn price_floor(&self) -> i64 {
        self.price_floor
    }

    pub fn groups(&self) -> &[PriceRuleGroup] {
        &self.groups
    }

    pub fn unit_pricing(&self) -> Option<&UnitPricing> {
        self.unit_pricing.as_ref()
    }

    pub fn group(&self, step_key: &StepKey) -> Option<&PriceRuleGroup> {
        self.groups.iter().find(|group| &group.step_key == step_key)
    }
}
