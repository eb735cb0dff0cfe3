//! Invoicing domain module.
//!
//! Derives supplier invoices from confirmed purchase order deliveries. Pure
//! domain logic (no IO, no HTTP, no storage).

pub mod invoice;

pub use invoice::{
    Invoice, InvoiceCommand, InvoiceEvent, InvoiceId, InvoiceIssued, InvoiceLine, InvoiceSnapshot,
    InvoiceStatus, IssueInvoice,
};
