//! Core domain types for the execution engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order lifecycle status.
///
/// Transitions are monotonic per the state machine in the order processor;
/// `Confirmed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Routing,
    Building,
    Submitted,
    Confirmed,
    Failed,
}

impl OrderStatus {
    /// Whether this status is a sink: no further transitions are legal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Failed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Routing => write!(f, "routing"),
            OrderStatus::Building => write!(f, "building"),
            OrderStatus::Submitted => write!(f, "submitted"),
            OrderStatus::Confirmed => write!(f, "confirmed"),
            OrderStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Order type. Only market orders are executable today; `Limit` and
/// `Sniper` are reserved for the trigger-order hook and rejected at intake.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    #[default]
    Market,
    Limit,
    Sniper,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "market"),
            OrderType::Limit => write!(f, "limit"),
            OrderType::Sniper => write!(f, "sniper"),
        }
    }
}

/// An execution venue (DEX) the router can select.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Raydium,
    Meteora,
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Venue::Raydium => write!(f, "raydium"),
            Venue::Meteora => write!(f, "meteora"),
        }
    }
}

/// A normalized token pair as handed to the router and venue drivers.
///
/// Both addresses are post-normalization (wrapped equivalents); the order
/// record keeps the original addresses the caller submitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub token_in: String,
    pub token_out: String,
}

impl TokenPair {
    pub fn new(token_in: impl Into<String>, token_out: impl Into<String>) -> Self {
        Self {
            token_in: token_in.into(),
            token_out: token_out.into(),
        }
    }
}

impl fmt::Display for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.token_in, self.token_out)
    }
}

/// The central order record. Owned exclusively by the order store; every
/// other component refers to orders by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub status: OrderStatus,
    /// Original input token address, as submitted by the caller.
    pub token_in: String,
    /// Original output token address, as submitted by the caller.
    pub token_out: String,
    pub amount_in: Decimal,
    pub slippage: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_out: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<Venue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// A venue's answer to a quote request. Ephemeral; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub venue: Venue,
    pub pair: TokenPair,
    pub amount_in: Decimal,
    pub amount_out: Decimal,
    pub unit_price: Decimal,
    pub fee_rate: Decimal,
    pub price_impact: Decimal,
    pub at: DateTime<Utc>,
}

impl Quote {
    /// The ranking key used by the router: output discounted by impact.
    pub fn effective_output(&self) -> Decimal {
        self.amount_out * (Decimal::ONE - self.price_impact)
    }
}

/// The router's ranked verdict for one order. Emitted as side data on the
/// routing edge of the state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    pub order_id: String,
    pub quotes: Vec<Quote>,
    pub selected: Venue,
    pub rationale: String,
    /// Effective-output gap between the winner and the runner-up, in
    /// percent. Zero when only one venue quoted.
    pub price_gap_pct: Decimal,
    pub at: DateTime<Utc>,
}

/// Wrap/unwrap bookkeeping attached to a swap that touched the native asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrapMetadata {
    pub wrapped_in: bool,
    pub unwrapped_out: bool,
    pub wrap_amount: Decimal,
}

/// Result of a swap call against a venue driver. Ephemeral.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapResult {
    pub tx_ref: String,
    pub executed_price: Decimal,
    pub amount_out: Decimal,
    pub realized_slippage: Decimal,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrap: Option<WrapMetadata>,
}

/// One edge of the order state machine, as persisted to the update log and
/// broadcast to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionEvent {
    pub order_id: String,
    pub status: OrderStatus,
    pub message: String,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TransitionEvent {
    pub fn new(order_id: impl Into<String>, status: OrderStatus, message: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            status,
            message: message.into(),
            at: Utc::now(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_terminal_statuses() {
        assert!(OrderStatus::Confirmed.is_terminal());
        assert!(OrderStatus::Failed.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Submitted.is_terminal());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Routing).unwrap(),
            "\"routing\""
        );
        assert_eq!(
            serde_json::from_str::<OrderStatus>("\"confirmed\"").unwrap(),
            OrderStatus::Confirmed
        );
    }

    #[test]
    fn test_effective_output_discounts_impact() {
        let quote = Quote {
            venue: Venue::Raydium,
            pair: TokenPair::new("A", "B"),
            amount_in: dec!(10),
            amount_out: dec!(100),
            unit_price: dec!(10),
            fee_rate: dec!(0.0025),
            price_impact: dec!(0.02),
            at: Utc::now(),
        };
        assert_eq!(quote.effective_output(), dec!(98.00));
    }

    #[test]
    fn test_order_type_defaults_to_market() {
        #[derive(serde::Deserialize)]
        struct Probe {
            #[serde(rename = "type", default)]
            order_type: OrderType,
        }
        let probe: Probe = serde_json::from_str("{}").unwrap();
        assert_eq!(probe.order_type, OrderType::Market);
    }
}
