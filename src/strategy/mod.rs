//! Strategy contract, rule DSL, built-in strategies, and registry

pub mod base;
pub mod ema_cross;
pub mod registry;
pub mod rule_strategy;
pub mod rules;
pub mod signal;
pub mod state;

pub use base::{MarketRegime, Strategy, StrategyMetadata};
pub use ema_cross::{EmaCrossParams, EmaCrossStrategy};
pub use registry::{DefinitionStore, MemoryDefinitionStore, StrategyRegistry};
pub use rule_strategy::RuleStrategy;
pub use rules::{
    Comparison, Condition, ConditionGroup, LogicOp, Operand, RuleConfig, RuleDefinition,
    RuleError, RuleSet, ValueTable,
};
pub use signal::{Signal, SignalAction};
pub use state::{StateKey, StateStore, StrategyState};
