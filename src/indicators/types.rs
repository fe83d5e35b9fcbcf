//! Indicator identity and value types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Indicator type plus parameters, used as the cache key for one computation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndicatorKind {
    Rsi { period: usize },
    Ema { period: usize },
    Sma { period: usize },
    Macd { fast: usize, slow: usize, signal: usize },
    BollingerBands { period: usize, std_dev: Decimal },
    Atr { period: usize },
    Adx { period: usize },
    Stochastic { period: usize, smooth: usize },
    Vwap { period: usize },
    Keltner { period: usize, multiplier: Decimal },
}

impl IndicatorKind {
    /// Minimum number of closed klines before the indicator produces a value.
    pub fn warm_up(&self) -> usize {
        match self {
            Self::Rsi { period } => period + 1,
            Self::Ema { period } | Self::Sma { period } => *period,
            Self::Macd { slow, signal, .. } => slow + signal,
            Self::BollingerBands { period, .. } => *period,
            Self::Atr { period } => period + 1,
            Self::Adx { period } => 2 * period,
            Self::Stochastic { period, smooth } => period + 2 * smooth,
            Self::Vwap { period } => *period,
            Self::Keltner { period, .. } => *period,
        }
    }

    /// Named sub-fields for object-shaped results; empty for scalars.
    pub fn sub_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Macd { .. } => &["macd", "signal", "histogram"],
            Self::BollingerBands { .. } | Self::Keltner { .. } => &["upper", "middle", "lower"],
            Self::Stochastic { .. } => &["k", "d"],
            _ => &[],
        }
    }

    /// Check parameter sanity. Performed once at strategy instantiation so
    /// the cache never has to cope with unbuildable kinds.
    pub fn validate(&self) -> Result<(), String> {
        let ok = match self {
            Self::Rsi { period }
            | Self::Ema { period }
            | Self::Sma { period }
            | Self::Atr { period }
            | Self::Adx { period }
            | Self::Vwap { period } => *period > 0,
            Self::Macd { fast, slow, signal } => *fast > 0 && *signal > 0 && fast < slow,
            Self::BollingerBands { period, std_dev } => *period > 0 && *std_dev > Decimal::ZERO,
            Self::Stochastic { period, smooth } => *period > 0 && *smooth > 0,
            Self::Keltner { period, multiplier } => *period > 0 && *multiplier > Decimal::ZERO,
        };
        if ok {
            Ok(())
        } else {
            Err(format!("invalid indicator parameters: {self:?}"))
        }
    }
}

/// Named indicator declaration inside a strategy definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSpec {
    /// Identifier referenced by rule conditions (e.g., "rsi14", "macd.histogram")
    pub id: String,
    #[serde(flatten)]
    pub kind: IndicatorKind,
}

/// A computed indicator value: scalar or named-field record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndicatorValue {
    Scalar(Decimal),
    Fields(BTreeMap<String, Decimal>),
}

impl IndicatorValue {
    /// Scalar value, if this is a scalar.
    pub fn scalar(&self) -> Option<Decimal> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::Fields(_) => None,
        }
    }

    /// Named sub-field value, if present.
    pub fn field(&self, name: &str) -> Option<Decimal> {
        match self {
            Self::Scalar(_) => None,
            Self::Fields(fields) => fields.get(name).copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_kind_validation() {
        assert!(IndicatorKind::Rsi { period: 14 }.validate().is_ok());
        assert!(IndicatorKind::Rsi { period: 0 }.validate().is_err());
        assert!(IndicatorKind::Macd {
            fast: 26,
            slow: 12,
            signal: 9
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_spec_json_shape() {
        let json = r#"{"id":"rsi14","type":"rsi","period":14}"#;
        let spec: IndicatorSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.id, "rsi14");
        assert_eq!(spec.kind, IndicatorKind::Rsi { period: 14 });
    }

    #[test]
    fn test_value_field_access() {
        let mut fields = BTreeMap::new();
        fields.insert("upper".to_string(), Decimal::from_str("101.5").unwrap());
        let value = IndicatorValue::Fields(fields);
        assert_eq!(value.field("upper"), Some(Decimal::from_str("101.5").unwrap()));
        assert_eq!(value.field("lower"), None);
        assert_eq!(value.scalar(), None);
    }
}
