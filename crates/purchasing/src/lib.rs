//! Purchasing domain module (supplier purchase orders).
//!
//! This crate contains business rules for purchase orders, supplier price
//! variance and the delivery simulation, implemented purely as deterministic
//! domain logic (no IO, no HTTP, no storage). Randomness is always supplied
//! by the caller through [`RandomSource`].

pub mod order;
pub mod pricing;
pub mod random;
pub mod simulation;

pub use order::{
    Cancel, ConfirmDelivery, ConfirmedLine, DeliveryConfirmed, DeliverySimulated, OrderCancelled,
    OrderPlaced, PlaceOrder, PricedLine, PurchaseOrder, PurchaseOrderCommand, PurchaseOrderEvent,
    PurchaseOrderId, PurchaseOrderLine, PurchaseOrderSnapshot, PurchaseOrderStatus, ReceivedLine,
    RecordSimulation,
};
pub use pricing::PricingPolicy;
pub use random::{RandomSource, RngSource, ScriptedSource};
pub use simulation::{
    DeliverySimulation, DeliverySimulator, DeliveryStatus, LineOutcome, SimulationPolicy,
};
