// ============================================================================
// Order Store - persistence port for orders and their line items
// ============================================================================
//
// `PgOrderStore` is the production implementation. `InMemoryOrderStore`
// follows the same contract and backs the pipeline scenarios in tests.
//
// ============================================================================

mod memory;
mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::order::{Order, OrderError, OrderStatus};

pub use memory::InMemoryOrderStore;
pub use postgres::{connect, migrate, PgOrderStore};

/// Result of a conditional status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The order was in the expected state and now carries `version`.
    Applied { version: i32 },
    /// The order had already left the expected state; nothing was written.
    Skipped { current: OrderStatus },
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert the header and every item row in one transaction.
    async fn create(&self, order: &Order) -> Result<(), OrderError>;

    /// Header and items are read separately, outside a transaction. A status
    /// update landing between the two reads is visible in the header only.
    async fn get(&self, order_id: Uuid) -> Result<Order, OrderError>;

    /// Set the status unconditionally, bump `version`, refresh `updated_at`.
    ///
    /// No expected version is checked: two concurrent calls both increment
    /// the version and whichever lands last decides the stored status.
    async fn update_status(&self, order_id: Uuid, status: OrderStatus) -> Result<(), OrderError>;

    /// Like `update_status`, but only when the stored status equals `from`.
    async fn transition_status(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Transition, OrderError>;

    /// Most recent `limit` orders of a user, newest first.
    async fn list(&self, user_id: &str, limit: i64) -> Result<Vec<Order>, OrderError>;
}
