//! Mock supplier delivery simulation.
//!
//! Stands in for a real supplier integration: predicts, per order line, how
//! much the supplier will actually ship, plus one delivery delay per order.

use serde::{Deserialize, Serialize};

use procure_catalog::ProductId;

use crate::random::RandomSource;

/// Simulated delivery outcome for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    NotAvailable,
    Partial,
    Complete,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::NotAvailable => "NOT_AVAILABLE",
            DeliveryStatus::Partial => "PARTIAL",
            DeliveryStatus::Complete => "COMPLETE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NOT_AVAILABLE" => Some(DeliveryStatus::NotAvailable),
            "PARTIAL" => Some(DeliveryStatus::Partial),
            "COMPLETE" => Some(DeliveryStatus::Complete),
            _ => None,
        }
    }
}

/// Probabilities and ranges driving the simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationPolicy {
    /// Draws below this are `NotAvailable`.
    pub not_available_below: f64,
    /// Draws in `[not_available_below, partial_below)` are `Partial`.
    pub partial_below: f64,
    /// Fraction range `[lo, hi)` of the requested quantity shipped on a partial delivery.
    pub partial_ratio: (f64, f64),
    /// Probability that the whole order is delayed.
    pub delay_probability: f64,
    /// Delays are drawn uniformly from `1..=max_delay_days`.
    pub max_delay_days: u32,
}

impl Default for SimulationPolicy {
    fn default() -> Self {
        Self {
            not_available_below: 0.10,
            partial_below: 0.30,
            partial_ratio: (0.5, 0.9),
            delay_probability: 0.3,
            max_delay_days: 5,
        }
    }
}

/// Simulated result for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineOutcome {
    pub product_id: ProductId,
    pub requested_quantity: i64,
    pub received_quantity: i64,
    pub status: DeliveryStatus,
}

impl LineOutcome {
    /// Human-readable summary shown to operators.
    pub fn message(&self) -> String {
        match self.status {
            DeliveryStatus::NotAvailable => "Product not available from supplier".to_string(),
            DeliveryStatus::Partial => format!(
                "Partial delivery: {} of {} units",
                self.received_quantity, self.requested_quantity
            ),
            DeliveryStatus::Complete => {
                format!("Complete delivery: {} units", self.received_quantity)
            }
        }
    }
}

/// Result for a whole order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySimulation {
    pub delay_days: u32,
    pub outcomes: Vec<LineOutcome>,
}

/// Runs the simulation against a [`SimulationPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DeliverySimulator {
    policy: SimulationPolicy,
}

impl DeliverySimulator {
    pub fn new(policy: SimulationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SimulationPolicy {
        &self.policy
    }

    /// Simulate an order given `(product, requested quantity)` pairs.
    ///
    /// The delay is drawn first, then one independent draw per line.
    pub fn simulate(
        &self,
        lines: &[(ProductId, i64)],
        rng: &mut dyn RandomSource,
    ) -> DeliverySimulation {
        let delay_days = if rng.chance(self.policy.delay_probability) {
            rng.int_inclusive(1, self.policy.max_delay_days.max(1))
        } else {
            0
        };

        let outcomes = lines
            .iter()
            .map(|&(product_id, requested)| self.simulate_line(product_id, requested, rng))
            .collect();

        DeliverySimulation {
            delay_days,
            outcomes,
        }
    }

    fn simulate_line(
        &self,
        product_id: ProductId,
        requested: i64,
        rng: &mut dyn RandomSource,
    ) -> LineOutcome {
        let s = rng.next_unit();
        let (received_quantity, status) = if s < self.policy.not_available_below {
            (0, DeliveryStatus::NotAvailable)
        } else if s < self.policy.partial_below {
            let (lo, hi) = self.policy.partial_ratio;
            let ratio = rng.uniform(lo, hi);
            let shipped = ((requested as f64) * ratio).floor() as i64;
            let shipped = shipped.clamp(0, requested.saturating_sub(1).max(0));
            if shipped == 0 {
                // A single unit cannot ship partially.
                (0, DeliveryStatus::NotAvailable)
            } else {
                (shipped, DeliveryStatus::Partial)
            }
        } else {
            (requested, DeliveryStatus::Complete)
        };

        LineOutcome {
            product_id,
            requested_quantity: requested,
            received_quantity,
            status,
        }
    }
}
