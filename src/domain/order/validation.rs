use std::fmt;

use rust_decimal::Decimal;

use super::value_objects::OrderStatus;

/// Why an order total was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    AmountTooLow,
    AmountTooHigh,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::AmountTooLow => f.write_str("amount too low"),
            RejectReason::AmountTooHigh => f.write_str("amount too high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Confirmed,
    Failed(RejectReason),
}

impl Verdict {
    pub fn status(&self) -> OrderStatus {
        match self {
            Verdict::Confirmed => OrderStatus::Confirmed,
            Verdict::Failed(_) => OrderStatus::Failed,
        }
    }
}

/// Sanity bounds on an order total. Both bounds are inclusive.
#[derive(Debug, Clone, Copy)]
pub struct ValidationPolicy {
    min_amount: Decimal,
    max_amount: Decimal,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            min_amount: Decimal::ONE_HUNDRED,
            max_amount: Decimal::from(50_000),
        }
    }
}

impl ValidationPolicy {
    pub fn evaluate(&self, total_amount: Decimal) -> Verdict {
        if total_amount < self.min_amount {
            Verdict::Failed(RejectReason::AmountTooLow)
        } else if total_amount > self.max_amount {
            Verdict::Failed(RejectReason::AmountTooHigh)
        } else {
            Verdict::Confirmed
        }
    }
}
