use serde::{Deserialize, Serialize};

use crate::domain::answers::{AnswerSet, StepKey};
use crate::domain::price_table::{PriceRuleGroup, PriceTable, SelectionMode};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStage {
    Base,
    Option,
    UnitOverage,
    Floor,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLine {
    pub stage: QuoteStage,
    pub step_key: Option<StepKey>,
    pub detail: String,
    pub amount: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteBreakdown {
    pub lines: Vec<QuoteLine>,
    /// Sum of base price and every applied delta, before the floor.
    pub subtotal: i64,
    pub floor_applied: bool,
    pub total: i64,
}

pub trait QuoteEngine: Send + Sync {
    fn price(&self, table: &PriceTable, answers: &AnswerSet) -> QuoteBreakdown;

    fn total(&self, table: &PriceTable, answers: &AnswerSet) -> i64 {
        self.price(table, answers).total
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicQuoteEngine;

impl QuoteEngine for DeterministicQuoteEngine {
    fn price(&self, table: &PriceTable, answers: &AnswerSet) -> QuoteBreakdown {
        price_with_trace(table, answers)
    }

    fn total(&self, table: &PriceTable, answers: &AnswerSet) -> i64 {
        compute_price(table, answers)
    }
}

/// Missing or unrecognized answers contribute nothing, so a partial answer set
/// always yields a price.
pub fn compute_price(table: &PriceTable, answers: &AnswerSet) -> i64 {
    let mut running = table.base_price();

    for group in table.groups() {
        running = running.saturating_add(group_delta(group, answers));
    }

    if let Some(unit) = table.unit_pricing() {
        if let Some(value) = answers.number(&unit.step_key) {
            running = running.saturating_add(unit.overage(value));
        }
    }

    running.max(table.price_floor())
}

pub fn price_with_trace(table: &PriceTable, answers: &AnswerSet) -> QuoteBreakdown {
    let mut lines = vec![QuoteLine {
        stage: QuoteStage::Base,
        step_key: None,
        detail: "base price".to_owned(),
        amount: table.base_price(),
    }];

    for group in table.groups() {
        match group.selection_mode {
            SelectionMode::Single => {
                let Some(selected) = answers.choice(&group.step_key) else { continue };
                if let Some(rule) = group.rule(selected) {
                    lines.push(option_line(&group.step_key, &rule.label, rule.delta_amount));
                }
            }
            SelectionMode::Multiple => {
                let Some(selected) = answers.choices(&group.step_key) else { continue };
                for rule in group.rules.iter().filter(|rule| selected.contains(&rule.key)) {
                    lines.push(option_line(&group.step_key, &rule.label, rule.delta_amount));
                }
            }
        }
    }

    if let Some(unit) = table.unit_pricing() {
        if let Some(value) = answers.number(&unit.step_key) {
            let overage = unit.overage(value);
            if overage != 0 {
                lines.push(QuoteLine {
                    stage: QuoteStage::UnitOverage,
                    step_key: Some(unit.step_key.clone()),
                    detail: format!(
                        "{} x {} above {} included",
                        value - unit.included_threshold,
                        unit.per_unit_amount,
                        unit.included_threshold
                    ),
                    amount: overage,
                });
            }
        }
    }

    let subtotal = lines.iter().fold(0i64, |sum, line| sum.saturating_add(line.amount));
    let floor_applied = subtotal < table.price_floor();
    let total = subtotal.max(table.price_floor());

    if floor_applied {
        lines.push(QuoteLine {
            stage: QuoteStage::Floor,
            step_key: None,
            detail: format!("minimum price {}", table.price_floor()),
            amount: total.saturating_sub(subtotal),
        });
    }

    QuoteBreakdown { lines, subtotal, floor_applied, total }
}

fn group_delta(group: &PriceRuleGroup, answers: &AnswerSet) -> i64 {
    match group.selection_mode {
        SelectionMode::Single => answers
            .choice(&group.step_key)
            .and_then(|selected| group.rule(selected))
            .map_or(0, |rule| rule.delta_amount),
        SelectionMode::Multiple => answers.choices(&group.step_key).map_or(0, |selected| {
            group
                .rules
                .iter()
                .filter(|rule| selected.contains(&rule.key))
                .fold(0i64, |sum, rule| sum.saturating_add(rule.delta_amount))
        }),
    }
}

fn option_line(step_key: &StepKey, label: &str, amount: i64) -> QuoteLine {
    QuoteLine {
        stage: QuoteStage::Option,
        step_key: Some(step_key.clone()),
        detail: label.to_owned(),
        amount,
    }
}
