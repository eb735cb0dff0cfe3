//! Infrastructure layer: store ports and adapters, configuration, and the
//! purchase order engine that composes them.

pub mod config;
pub mod engine;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use engine::{
    EngineError, InvoiceLineReport, InvoiceReport, NewOrderLine, OrderLineReport,
    PurchaseOrderEngine, PurchaseOrderReport,
};
pub use store::{
    CatalogStore, DeliveryCommit, DynStore, InMemoryStore, PostgresStore, ProcurementStore,
    PurchasingStore, StoreError,
};
