//! # Timeouts
//!
//! Per-operation poll deadlines. A `Timeouts` value is built once when the
//! engine is constructed and is only ever read afterwards.

use super::duration::serde_duration;
use crate::constants::{
    DATACENTER_CREATE_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS, NETWORK_TIMEOUT_SECS,
    NODE_POOL_TIMEOUT_SECS,
};
use crate::resource::{Operation, ResourceKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Deadline budget for each lifecycle operation
///
/// `create`, `update` and `delete` override the budget for their operation,
/// `default` applies to every operation without an override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeouts {
    #[serde(
        default,
        with = "serde_duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub create: Option<Duration>,
    #[serde(
        default,
        with = "serde_duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub update: Option<Duration>,
    #[serde(
        default,
        with = "serde_duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub delete: Option<Duration>,
    #[serde(with = "serde_duration")]
    pub default: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

impl Timeouts {
    /// Timeouts where every operation uses `default`
    #[must_use]
    pub fn new(default: Duration) -> Self {
        Self {
            create: None,
            update: None,
            delete: None,
            default,
        }
    }

    #[must_use]
    pub fn with_create(mut self, budget: Duration) -> Self {
        self.create = Some(budget);
        self
    }

    #[must_use]
    pub fn with_update(mut self, budget: Duration) -> Self {
        self.update = Some(budget);
        self
    }

    #[must_use]
    pub fn with_delete(mut self, budget: Duration) -> Self {
        self.delete = Some(budget);
        self
    }

    /// Built-in budgets for a resource kind
    #[must_use]
    pub fn for_kind(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Datacenter => Self::default()
                .with_create(Duration::from_secs(DATACENTER_CREATE_TIMEOUT_SECS)),
            ResourceKind::Lan
            | ResourceKind::NatGateway
            | ResourceKind::NatGatewayRule
            | ResourceKind::IpFailover => Self::new(Duration::from_secs(NETWORK_TIMEOUT_SECS)),
            ResourceKind::NodePool => Self::new(Duration::from_secs(NODE_POOL_TIMEOUT_SECS)),
        }
    }

    /// Layer configured overrides on top of these budgets
    #[must_use]
    pub fn overridden_by(self, overrides: &TimeoutOverrides) -> Self {
        Self {
            create: overrides.create.or(self.create),
            update: overrides.update.or(self.update),
            delete: overrides.delete.or(self.delete),
            default: overrides.default.unwrap_or(self.default),
        }
    }

    /// Budget for one lifecycle operation
    #[must_use]
    pub fn budget(&self, operation: Operation) -> Duration {
        let specific = match operation {
            Operation::Create => self.create,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        };
        specific.unwrap_or(self.default)
    }
}

/// Timeout overrides supplied through configuration
///
/// Unlike `Timeouts`, every field is optional: unset fields keep the
/// resource kind's built-in budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutOverrides {
    #[serde(
        default,
        with = "serde_duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub create: Option<Duration>,
    #[serde(
        default,
        with = "serde_duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub update: Option<Duration>,
    #[serde(
        default,
        with = "serde_duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub delete: Option<Duration>,
    #[serde(
        default,
        with = "serde_duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<Duration>,
}
