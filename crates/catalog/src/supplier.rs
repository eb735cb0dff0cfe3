use serde::{Deserialize, Serialize};

use procure_core::{DomainError, DomainResult, typed_id};

typed_id!(
    /// Supplier (provider) identifier.
    SupplierId
);

/// Supplier status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupplierStatus {
    Active,
    Inactive,
}

impl SupplierStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupplierStatus::Active => "active",
            SupplierStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "active" => Ok(SupplierStatus::Active),
            "inactive" => Ok(SupplierStatus::Inactive),
            other => Err(DomainError::validation(format!("unknown supplier status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub contact_email: Option<String>,
    pub status: SupplierStatus,
}

impl Supplier {
    pub fn new(id: SupplierId, name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("supplier name cannot be empty"));
        }
        Ok(Self {
            id,
            name,
            contact_email: None,
            status: SupplierStatus::Active,
        })
    }

    pub fn with_contact_email(mut self, email: impl Into<String>) -> Self {
        self.contact_email = Some(email.into());
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == SupplierStatus::Active
    }

    pub fn deactivate(&mut self) {
        self.status = SupplierStatus::Inactive;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deactivated_supplier_is_not_active() {
        let mut supplier = Supplier::new(SupplierId::generate(), "Acme Supply")
            .unwrap()
            .with_contact_email("orders@acme.test");
        assert!(supplier.is_active());
        supplier.deactivate();
        assert!(!supplier.is_active());
        assert_eq!(supplier.contact_email.as_deref(), Some("orders@acme.test"));
    }

    #[test]
    fn blank_name_is_rejected() {
        assert!(Supplier::new(SupplierId::generate(), "").is_err());
    }
}
