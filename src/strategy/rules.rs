//! Declarative rule definitions
//!
//! Strategies can be expressed as JSON documents: named indicator
//! declarations plus boolean condition groups for entries and exits.
//! Definitions are validated once at instantiation; evaluation is a
//! table lookup per condition afterwards.

use crate::data::Kline;
use crate::indicators::{IndicatorCache, IndicatorSpec, IndicatorValue};
use crate::strategy::MarketRegime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Fields every kline contributes to the value table.
pub const PRICE_FIELDS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// Rule definition errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("invalid rule definition: {0}")]
    InvalidDefinition(String),
}

/// Logical combinator for a condition group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicOp {
    And,
    Or,
}

/// Comparison operator between two operands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "crosses_above")]
    CrossesAbove,
    #[serde(rename = "crosses_below")]
    CrossesBelow,
}

impl Comparison {
    /// True when the comparison needs previous-kline values.
    pub fn is_cross(&self) -> bool {
        matches!(self, Self::CrossesAbove | Self::CrossesBelow)
    }
}

/// One side of a comparison: a literal or a value-table field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Value(Decimal),
    Field(String),
}

/// A single comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub left: Operand,
    pub comparison: Comparison,
    pub right: Operand,
}

/// Conditions joined by one logical operator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionGroup {
    pub operator: LogicOp,
    pub conditions: Vec<Condition>,
}

/// Entry and exit rule groups
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default, alias = "entryLong")]
    pub entry_long: Option<ConditionGroup>,
    #[serde(default, alias = "entryShort")]
    pub entry_short: Option<ConditionGroup>,
    #[serde(default, alias = "exitLong")]
    pub exit_long: Option<ConditionGroup>,
    #[serde(default, alias = "exitShort")]
    pub exit_short: Option<ConditionGroup>,
}

/// Sizing and exit parameters of a rule strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Fixed quantity per entry; zero lets the host size the position
    #[serde(default)]
    pub qty: Decimal,
    /// Confidence attached to emitted signals
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default, alias = "takeProfitPct")]
    pub take_profit_pct: Option<Decimal>,
    #[serde(default, alias = "stopLossPct")]
    pub stop_loss_pct: Option<Decimal>,
}

fn default_confidence() -> f64 {
    0.7
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            qty: Decimal::ZERO,
            confidence: default_confidence(),
            take_profit_pct: None,
            stop_loss_pct: None,
        }
    }
}

/// A complete declarative strategy definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub name: String,
    #[serde(default)]
    pub indicators: Vec<IndicatorSpec>,
    pub rules: RuleSet,
    #[serde(default)]
    pub config: RuleConfig,
    #[serde(default, alias = "targetRegimes")]
    pub target_regimes: Vec<MarketRegime>,
}

/// Resolved field values for one kline
pub type ValueTable = BTreeMap<String, Decimal>;

impl RuleDefinition {
    /// Validate structure, field references, and parameters. Called once
    /// at strategy instantiation.
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.name.trim().is_empty() {
            return Err(RuleError::InvalidDefinition("name is empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.config.confidence) {
            return Err(RuleError::InvalidDefinition(format!(
                "confidence {} outside [0, 1]",
                self.config.confidence
            )));
        }

        let mut ids = HashSet::new();
        for spec in &self.indicators {
            if !ids.insert(spec.id.as_str()) {
                return Err(RuleError::InvalidDefinition(format!(
                    "duplicate indicator id {:?}",
                    spec.id
                )));
            }
            spec.kind.validate().map_err(RuleError::InvalidDefinition)?;
        }

        let groups = [
            ("entry_long", &self.rules.entry_long),
            ("entry_short", &self.rules.entry_short),
            ("exit_long", &self.rules.exit_long),
            ("exit_short", &self.rules.exit_short),
        ];
        if groups.iter().all(|(_, g)| g.is_none()) {
            return Err(RuleError::InvalidDefinition(
                "no rule groups defined".to_string(),
            ));
        }
        for (label, group) in groups {
            let Some(group) = group else { continue };
            if group.conditions.is_empty() {
                return Err(RuleError::InvalidDefinition(format!(
                    "{label} group has no conditions"
                )));
            }
            for condition in &group.conditions {
                self.check_operand(label, &condition.left)?;
                self.check_operand(label, &condition.right)?;
            }
        }
        Ok(())
    }

    fn check_operand(&self, label: &str, operand: &Operand) -> Result<(), RuleError> {
        let Operand::Field(field) = operand else {
            return Ok(());
        };
        if PRICE_FIELDS.contains(&field.as_str()) {
            return Ok(());
        }
        let (id, sub) = match field.split_once('.') {
            Some((id, sub)) => (id, Some(sub)),
            None => (field.as_str(), None),
        };
        let Some(spec) = self.indicators.iter().find(|s| s.id == id) else {
            return Err(RuleError::InvalidDefinition(format!(
                "{label} references unknown field {field:?}"
            )));
        };
        let sub_fields = spec.kind.sub_fields();
        match sub {
            None if sub_fields.is_empty() => Ok(()),
            None => Err(RuleError::InvalidDefinition(format!(
                "{label}: indicator {id:?} needs a sub-field ({sub_fields:?})"
            ))),
            Some(sub) if sub_fields.contains(&sub) => Ok(()),
            Some(sub) => Err(RuleError::InvalidDefinition(format!(
                "{label}: indicator {id:?} has no sub-field {sub:?}"
            ))),
        }
    }
}

/// Resolve all declared indicators plus kline price fields into one
/// value table. Returns `None` if any indicator is still warming up.
pub fn build_value_table(
    specs: &[IndicatorSpec],
    kline: &Kline,
    cache: &IndicatorCache,
) -> Option<ValueTable> {
    let mut table = ValueTable::new();
    table.insert("open".to_string(), kline.open);
    table.insert("high".to_string(), kline.high);
    table.insert("low".to_string(), kline.low);
    table.insert("close".to_string(), kline.close);
    table.insert("volume".to_string(), kline.volume);

    for spec in specs {
        match cache.get(&kline.symbol, &spec.kind)? {
            IndicatorValue::Scalar(value) => {
                table.insert(spec.id.clone(), value);
            }
            IndicatorValue::Fields(fields) => {
                for (sub, value) in fields {
                    table.insert(format!("{}.{}", spec.id, sub), value);
                }
            }
        }
    }
    Some(table)
}

fn resolve(operand: &Operand, table: &ValueTable) -> Option<Decimal> {
    match operand {
        Operand::Value(value) => Some(*value),
        Operand::Field(field) => table.get(field).copied(),
    }
}

impl Condition {
    /// Evaluate against the current table (and previous table for
    /// crosses). Unresolvable operands evaluate to false.
    pub fn evaluate(&self, table: &ValueTable, prev: Option<&ValueTable>) -> bool {
        let (Some(left), Some(right)) = (resolve(&self.left, table), resolve(&self.right, table))
        else {
            return false;
        };
        match self.comparison {
            Comparison::GreaterThan => left > right,
            Comparison::LessThan => left < right,
            Comparison::GreaterOrEqual => left >= right,
            Comparison::LessOrEqual => left <= right,
            Comparison::CrossesAbove | Comparison::CrossesBelow => {
                let Some(prev) = prev else { return false };
                let (Some(prev_left), Some(prev_right)) =
                    (resolve(&self.left, prev), resolve(&self.right, prev))
                else {
                    return false;
                };
                match self.comparison {
                    Comparison::CrossesAbove => prev_left <= prev_right && left > right,
                    _ => prev_left >= prev_right && left < right,
                }
            }
        }
    }
}

impl ConditionGroup {
    /// Evaluate all conditions under the group operator.
    pub fn evaluate(&self, table: &ValueTable, prev: Option<&ValueTable>) -> bool {
        match self.operator {
            LogicOp::And => self.conditions.iter().all(|c| c.evaluate(table, prev)),
            LogicOp::Or => self.conditions.iter().any(|c| c.evaluate(table, prev)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorKind;
    use std::str::FromStr;

    fn table(pairs: &[(&str, &str)]) -> ValueTable {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Decimal::from_str(v).unwrap()))
            .collect()
    }

    fn condition(left: &str, cmp: Comparison, right: Operand) -> Condition {
        Condition {
            left: Operand::Field(left.to_string()),
            comparison: cmp,
            right,
        }
    }

    #[test]
    fn test_simple_comparisons() {
        let t = table(&[("rsi14", "25")]);
        let c = condition(
            "rsi14",
            Comparison::LessThan,
            Operand::Value(Decimal::from(30)),
        );
        assert!(c.evaluate(&t, None));
        let c = condition(
            "rsi14",
            Comparison::GreaterOrEqual,
            Operand::Value(Decimal::from(30)),
        );
        assert!(!c.evaluate(&t, None));
    }

    #[test]
    fn test_crosses_above_needs_prior_state() {
        let c = condition(
            "fast",
            Comparison::CrossesAbove,
            Operand::Field("slow".to_string()),
        );
        let now = table(&[("fast", "11"), ("slow", "10")]);
        // no previous table: never a cross
        assert!(!c.evaluate(&now, None));
        // was below, now above: cross
        let prev = table(&[("fast", "9"), ("slow", "10")]);
        assert!(c.evaluate(&now, Some(&prev)));
        // was already above: no cross
        let prev = table(&[("fast", "10.5"), ("slow", "10")]);
        assert!(!c.evaluate(&now, Some(&prev)));
        // touch counts as "was at or below"
        let prev = table(&[("fast", "10"), ("slow", "10")]);
        assert!(c.evaluate(&now, Some(&prev)));
    }

    #[test]
    fn test_crosses_below() {
        let c = condition(
            "close",
            Comparison::CrossesBelow,
            Operand::Field("sma20".to_string()),
        );
        let prev = table(&[("close", "101"), ("sma20", "100")]);
        let now = table(&[("close", "99"), ("sma20", "100")]);
        assert!(c.evaluate(&now, Some(&prev)));
        assert!(!c.evaluate(&prev, Some(&now)));
    }

    #[test]
    fn test_unresolved_operand_is_false() {
        let t = table(&[("close", "100")]);
        let c = condition(
            "missing",
            Comparison::GreaterThan,
            Operand::Value(Decimal::ZERO),
        );
        assert!(!c.evaluate(&t, None));
    }

    #[test]
    fn test_group_operators() {
        let t = table(&[("a", "1"), ("b", "2")]);
        let lt = |f: &str, v: i64| {
            condition(f, Comparison::LessThan, Operand::Value(Decimal::from(v)))
        };
        let and = ConditionGroup {
            operator: LogicOp::And,
            conditions: vec![lt("a", 2), lt("b", 2)],
        };
        assert!(!and.evaluate(&t, None));
        let or = ConditionGroup {
            operator: LogicOp::Or,
            conditions: vec![lt("a", 2), lt("b", 2)],
        };
        assert!(or.evaluate(&t, None));
    }

    #[test]
    fn test_definition_parses_from_json() {
        let json = r#"{
            "name": "rsi_dip",
            "indicators": [
                {"id": "rsi14", "type": "rsi", "period": 14},
                {"id": "macd", "type": "macd", "fast": 12, "slow": 26, "signal": 9}
            ],
            "rules": {
                "entryLong": {
                    "operator": "and",
                    "conditions": [
                        {"left": "rsi14", "comparison": "<", "right": 30},
                        {"left": "macd.histogram", "comparison": ">", "right": 0}
                    ]
                },
                "exitLong": {
                    "operator": "or",
                    "conditions": [
                        {"left": "rsi14", "comparison": ">", "right": 70}
                    ]
                }
            },
            "config": {"confidence": 0.8, "takeProfitPct": 3, "stopLossPct": 1.5}
        }"#;
        let definition: RuleDefinition = serde_json::from_str(json).unwrap();
        assert!(definition.validate().is_ok());
        assert_eq!(definition.indicators.len(), 2);
        assert_eq!(definition.config.confidence, 0.8);
        // numeric literals land as Value operands, fields as Field
        let entry = definition.rules.entry_long.as_ref().unwrap();
        assert_eq!(entry.conditions[0].right, Operand::Value(Decimal::from(30)));
        assert_eq!(
            entry.conditions[1].left,
            Operand::Field("macd.histogram".to_string())
        );
    }

    #[test]
    fn test_validation_rejects_bad_references() {
        let mut definition = RuleDefinition {
            name: "bad".to_string(),
            indicators: vec![IndicatorSpec {
                id: "rsi14".to_string(),
                kind: IndicatorKind::Rsi { period: 14 },
            }],
            rules: RuleSet {
                entry_long: Some(ConditionGroup {
                    operator: LogicOp::And,
                    conditions: vec![condition(
                        "nope",
                        Comparison::GreaterThan,
                        Operand::Value(Decimal::ZERO),
                    )],
                }),
                ..RuleSet::default()
            },
            config: RuleConfig::default(),
            target_regimes: Vec::new(),
        };
        assert!(definition.validate().is_err());

        // scalar indicator referenced with a sub-field
        definition.rules.entry_long = Some(ConditionGroup {
            operator: LogicOp::And,
            conditions: vec![condition(
                "rsi14.k",
                Comparison::GreaterThan,
                Operand::Value(Decimal::ZERO),
            )],
        });
        assert!(definition.validate().is_err());

        // empty group
        definition.rules.entry_long = Some(ConditionGroup {
            operator: LogicOp::And,
            conditions: Vec::new(),
        });
        assert!(definition.validate().is_err());

        // no groups at all
        definition.rules = RuleSet::default();
        assert!(definition.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_duplicate_ids_and_bad_confidence() {
        let spec = IndicatorSpec {
            id: "x".to_string(),
            kind: IndicatorKind::Ema { period: 9 },
        };
        let mut definition = RuleDefinition {
            name: "dup".to_string(),
            indicators: vec![spec.clone(), spec],
            rules: RuleSet {
                entry_long: Some(ConditionGroup {
                    operator: LogicOp::And,
                    conditions: vec![condition(
                        "x",
                        Comparison::GreaterThan,
                        Operand::Value(Decimal::ZERO),
                    )],
                }),
                ..RuleSet::default()
            },
            config: RuleConfig::default(),
            target_regimes: Vec::new(),
        };
        assert!(definition.validate().is_err());

        definition.indicators.pop();
        definition.config.confidence = 1.5;
        assert!(definition.validate().is_err());
    }
}
