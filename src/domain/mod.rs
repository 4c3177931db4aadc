// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Order-specific types and rules. Storage and the event bus are reached only
// through the ports in `store` and `messaging`.
//
// ============================================================================

pub mod order;
