// In crates/core-types/src/order.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::types::{Side, Symbol};

/// Engine-generated identifier of one trading decision.
///
/// Built from the symbol, the timestamp of the newest price point that produced
/// the signal, and the side, so re-evaluating the same window yields the same id.
/// Also sent to the exchange as the client order id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DecisionId(pub String);

impl DecisionId {
    pub fn for_decision(symbol: &Symbol, observed_at: DateTime<Utc>, side: Side) -> Self {
        let side_tag = match side {
            Side::Buy => 'B',
            Side::Sell => 'S',
        };
        Self(format!(
            "{}-{}-{}",
            symbol.0,
            observed_at.timestamp_millis(),
            side_tag
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the engine intends to submit. Written to the tracker before the exchange call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub decision_id: DecisionId,
    pub pair: Symbol,
    pub side: Side,
    pub quantity: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a tracked order.
///
/// `Submitted -> {Confirmed | Failed | Unknown}`, `Unknown -> {Confirmed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Submitted,
    Confirmed,
    Failed,
    Unknown,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Submitted => "Submitted",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Failed => "Failed",
            OrderStatus::Unknown => "Unknown",
        }
    }

    /// Submitted and Unknown block new orders for the same pair.
    pub fn is_unresolved(&self) -> bool {
        matches!(self, OrderStatus::Submitted | OrderStatus::Unknown)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Submitted, Confirmed)
                | (Submitted, Failed)
                | (Submitted, Unknown)
                | (Unknown, Confirmed)
                | (Unknown, Failed)
        )
    }

    pub fn ensure_transition(&self, next: OrderStatus) -> Result<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(Error::IllegalTransition {
                from: *self,
                to: next,
            })
        }
    }

    /// The states a record must be in to move to `next`.
    pub fn predecessors(next: OrderStatus) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match next {
            Submitted => &[],
            Unknown => &[Submitted],
            Confirmed | Failed => &[Submitted, Unknown],
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Submitted" => Ok(OrderStatus::Submitted),
            "Confirmed" => Ok(OrderStatus::Confirmed),
            "Failed" => Ok(OrderStatus::Failed),
            "Unknown" => Ok(OrderStatus::Unknown),
            other => Err(Error::UnknownVariant {
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderOutcome {
    pub decision_id: DecisionId,
    pub exchange_order_id: Option<String>,
    pub status: OrderStatus,
    pub last_checked_at: DateTime<Utc>,
}

/// One durable row of the execution tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub intent: OrderIntent,
    pub outcome: OrderOutcome,
    pub reconciliation_attempts: u32,
    pub escalated: bool,
}

impl OrderRecord {
    pub fn decision_id(&self) -> &DecisionId {
        &self.intent.decision_id
    }

    pub fn status(&self) -> OrderStatus {
        self.outcome.status
    }
}

/// How to look an order up at the exchange during reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderQuery {
    ByExchangeId {
        pair: Symbol,
        exchange_order_id: String,
    },
    ByWindow {
        pair: Symbol,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

/// Exchange-side order state, reduced to what reconciliation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeOrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
}

impl ExchangeOrderStatus {
    /// The tracked status this exchange state resolves to.
    pub fn resolved_status(&self) -> OrderStatus {
        match self {
            ExchangeOrderStatus::New
            | ExchangeOrderStatus::PartiallyFilled
            | ExchangeOrderStatus::Filled => OrderStatus::Confirmed,
            ExchangeOrderStatus::Canceled
            | ExchangeOrderStatus::Rejected
            | ExchangeOrderStatus::Expired => OrderStatus::Failed,
        }
    }
}

/// An order as reported by the exchange's order history.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeOrder {
    pub exchange_order_id: String,
    pub client_order_id: Option<String>,
    pub pair: Symbol,
    pub side: Side,
    pub quantity: Decimal,
    pub status: ExchangeOrderStatus,
    pub created_at: DateTime<Utc>,
}
