//! Session history persistence
//!
//! The store is an injected collaborator; the default in-memory
//! implementation backs backtests and tests. A database-backed store can
//! implement the same trait without touching the engine.

use crate::portfolio::{EquityPoint, TradeRecord};
use crate::risk::RiskEvent;
use crate::strategy::Signal;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Persistence errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error("unknown session: {0}")]
    UnknownSession(String),
}

/// Everything recorded for one session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionHistory {
    pub signals: Vec<Signal>,
    pub trades: Vec<TradeRecord>,
    pub risk_events: Vec<RiskEvent>,
    pub equity_curve: Vec<EquityPoint>,
}

/// Append-only store of session artifacts
#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn append_signal(&self, session: &str, signal: Signal) -> Result<(), StoreError>;
    async fn append_trade(&self, session: &str, trade: TradeRecord) -> Result<(), StoreError>;
    async fn append_risk_event(&self, session: &str, event: RiskEvent) -> Result<(), StoreError>;
    async fn append_equity_point(
        &self,
        session: &str,
        point: EquityPoint,
    ) -> Result<(), StoreError>;
    async fn session_history(&self, session: &str) -> Result<SessionHistory, StoreError>;
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, SessionHistory>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TradeStore for MemoryStore {
    async fn append_signal(&self, session: &str, signal: Signal) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .entry(session.to_string())
            .or_default()
            .signals
            .push(signal);
        Ok(())
    }

    async fn append_trade(&self, session: &str, trade: TradeRecord) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .entry(session.to_string())
            .or_default()
            .trades
            .push(trade);
        Ok(())
    }

    async fn append_risk_event(&self, session: &str, event: RiskEvent) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .entry(session.to_string())
            .or_default()
            .risk_events
            .push(event);
        Ok(())
    }

    async fn append_equity_point(
        &self,
        session: &str,
        point: EquityPoint,
    ) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .entry(session.to_string())
            .or_default()
            .equity_curve
            .push(point);
        Ok(())
    }

    async fn session_history(&self, session: &str) -> Result<SessionHistory, StoreError> {
        self.sessions
            .read()
            .await
            .get(session)
            .cloned()
            .ok_or_else(|| StoreError::UnknownSession(session.to_string()))
    }
}
