use std::sync::Arc;

use rust_decimal::Decimal;

use procure_catalog::{Product, ProductId, Supplier, SupplierId};
use procure_core::DomainError;
use procure_infra::{
    AppConfig, DynStore, InMemoryStore, PostgresStore, PurchaseOrderEngine, StoreError,
};
use procure_purchasing::{RandomSource, RngSource};

pub type Engine = PurchaseOrderEngine<DynStore>;

/// Everything a handler needs, shared behind an `Arc`.
pub struct AppServices {
    pub engine: Engine,
}

impl AppServices {
    pub fn new(store: DynStore, rng: impl RandomSource + 'static) -> Self {
        Self {
            engine: PurchaseOrderEngine::new(store, rng),
        }
    }

    pub fn in_memory(store: Arc<InMemoryStore>, rng: impl RandomSource + 'static) -> Self {
        Self::new(store, rng)
    }
}

pub async fn build_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    let rng = match config.simulation_seed {
        Some(seed) => {
            tracing::info!(seed, "using seeded simulation");
            RngSource::seeded(seed)
        }
        None => RngSource::from_entropy(),
    };

    match config.database_url.as_deref() {
        Some(url) if config.use_persistent_stores => {
            let store = PostgresStore::connect(url).await?;
            store.migrate().await?;
            tracing::info!("using postgres stores");
            Ok(AppServices::new(Arc::new(store), rng))
        }
        _ => {
            let store = Arc::new(InMemoryStore::new());
            seed_demo_catalog(&store)?;
            tracing::info!("using in-memory stores");
            Ok(AppServices::in_memory(store, rng))
        }
    }
}

/// In-memory mode starts with a small catalog so orders can be placed
/// without an external database. Ids are logged at startup.
fn seed_demo_catalog(store: &InMemoryStore) -> Result<(), StoreError> {
    let domain = |e: DomainError| StoreError::Backend(e.to_string());

    let supplier = Supplier::new(SupplierId::generate(), "Demo Supplier")
        .map_err(domain)?
        .with_contact_email("orders@demo-supplier.test");
    tracing::info!(supplier_id = %supplier.id, name = %supplier.name, "seeded supplier");
    store.insert_supplier(supplier)?;

    let products = [
        ("Steel bolts (box of 100)", Decimal::new(1250, 2)),
        ("Copper wire 50m", Decimal::new(4999, 2)),
        ("Bench grinder", Decimal::new(18900, 2)),
    ];
    for (name, unit_cost) in products {
        let product = Product::new(ProductId::generate(), name, 0, unit_cost).map_err(domain)?;
        tracing::info!(product_id = %product.id, name = %product.name, "seeded product");
        store.insert_product(product)?;
    }
    Ok(())
}
