// ============================================================================
// Order Domain - Business Logic for Order Aggregate
// ============================================================================
//
// - Value objects (OrderItem, NewOrderItem, OrderStatus)
// - Events (OrderCreated, OrderConfirmed, OrderFailed)
// - Commands (CreateOrder)
// - Errors (OrderError enum)
// - Aggregate (Order)
// - Validation policy applied by the processor
// - Command Handler (OrderCommandHandler)
//
// ============================================================================

pub mod aggregate;
pub mod command_handler;
pub mod commands;
pub mod errors;
pub mod events;
pub mod validation;
pub mod value_objects;

// Re-export for convenience
pub use aggregate::*;
pub use command_handler::*;
pub use commands::*;
pub use errors::*;
pub use events::*;
pub use validation::*;
pub use value_objects::*;
