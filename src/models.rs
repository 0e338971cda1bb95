//! Domain enums shared across services and handlers: the order state
//! machine and the subscription plans with their server-authoritative
//! price table.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

use crate::errors::ServiceError;

/// Order lifecycle status.
///
/// `pending → paid → deploying → completed`, with `failed` reachable
/// from every in-flight state and `refunded` only by admin action from
/// `paid` or `failed`. `completed` and `refunded` are terminal.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Deploying,
    Completed,
    Failed,
    Refunded,
}

impl OrderStatus {
    pub fn parse(value: &str) -> Result<Self, ServiceError> {
        value
            .parse()
            .map_err(|_| ServiceError::InvalidStatus(format!("unknown order status: {value}")))
    }

    /// Legal edges of the state machine. The free-plan path collapses
    /// `paid → completed` without a deploying hop because there is no
    /// external wait.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Paid)
                | (Pending, Failed)
                | (Paid, Deploying)
                | (Paid, Completed)
                | (Paid, Failed)
                | (Paid, Refunded)
                | (Deploying, Completed)
                | (Deploying, Failed)
                | (Failed, Paid)
                | (Failed, Refunded)
        )
    }

    pub fn can_retry_deploy(self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Failed)
    }

    pub fn can_refund(self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Failed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Refunded)
    }
}

/// Subscription plan selected at checkout. The price is derived from
/// the plan on the server; client-supplied amounts are never read.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PlanType {
    #[default]
    Free,
    Pro,
    Enterprise,
}

impl PlanType {
    /// Fixed price table, in RM. Must stay in sync with the
    /// user-facing pricing page.
    pub fn price(self) -> Decimal {
        match self {
            PlanType::Free => dec!(19),
            PlanType::Pro => dec!(59),
            PlanType::Enterprise => dec!(99),
        }
    }

    pub fn is_premium(self) -> bool {
        !matches!(self, PlanType::Free)
    }
}
