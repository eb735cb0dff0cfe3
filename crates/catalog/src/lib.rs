//! Catalog records consumed by purchasing (products and suppliers).
//!
//! The catalog is owned elsewhere; this crate only models what purchasing
//! reads from it plus the stock counter it increments on delivery.

pub mod product;
pub mod supplier;

pub use product::{Product, ProductId, ProductStatus};
pub use supplier::{Supplier, SupplierId, SupplierStatus};
