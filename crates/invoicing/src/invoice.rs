use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use procure_catalog::{ProductId, SupplierId};
use procure_core::{Aggregate, AggregateRoot, DomainError, Event, Money, money, typed_id};
use procure_purchasing::{DeliveryConfirmed, PurchaseOrderId};

typed_id!(
    /// Invoice identifier.
    InvoiceId
);

/// Invoice status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InvoiceStatus {
    Completed,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Completed => "COMPLETED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "COMPLETED" => Ok(InvoiceStatus::Completed),
            other => Err(DomainError::validation(format!("unknown invoice status '{other}'"))),
        }
    }
}

/// Invoice line derived from a confirmed purchase order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub line_no: u32,
    pub product_id: ProductId,
    /// Quantity ordered, kept for variance reporting.
    pub requested_quantity: i64,
    pub received_quantity: i64,
    /// Finalized purchase order price.
    pub unit_price: Money,
}

impl InvoiceLine {
    pub fn subtotal(&self) -> Result<Money, DomainError> {
        money::line_amount(self.unit_price, self.received_quantity)
    }

    /// `received - requested`; negative when the supplier shipped short.
    pub fn variance(&self) -> i64 {
        self.received_quantity - self.requested_quantity
    }
}

/// Persistent shape of an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSnapshot {
    pub id: InvoiceId,
    pub purchase_order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub issued_at: DateTime<Utc>,
    pub status: InvoiceStatus,
    pub lines: Vec<InvoiceLine>,
    pub total_amount: Money,
    pub version: u64,
}

/// Aggregate root: Invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    id: InvoiceId,
    purchase_order_id: Option<PurchaseOrderId>,
    supplier_id: Option<SupplierId>,
    issued_at: Option<DateTime<Utc>>,
    status: InvoiceStatus,
    lines: Vec<InvoiceLine>,
    total_amount: Money,
    version: u64,
    created: bool,
}

impl Invoice {
    /// Create an empty, not-yet-issued aggregate instance.
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            purchase_order_id: None,
            supplier_id: None,
            issued_at: None,
            status: InvoiceStatus::Completed,
            lines: Vec::new(),
            total_amount: Decimal::ZERO,
            version: 0,
            created: false,
        }
    }

    /// Issue a new invoice in one step.
    pub fn issue(cmd: IssueInvoice) -> Result<Self, DomainError> {
        let mut invoice = Self::empty(cmd.invoice_id);
        invoice.execute(&InvoiceCommand::IssueInvoice(cmd))?;
        Ok(invoice)
    }

    /// Issue the invoice for a confirmed delivery.
    pub fn from_confirmation(confirmed: &DeliveryConfirmed) -> Result<Self, DomainError> {
        let lines = confirmed
            .lines
            .iter()
            .enumerate()
            .map(|(idx, l)| InvoiceLine {
                line_no: idx as u32 + 1,
                product_id: l.product_id,
                requested_quantity: l.requested_quantity,
                received_quantity: l.received_quantity,
                unit_price: l.unit_price,
            })
            .collect();

        Self::issue(IssueInvoice {
            invoice_id: InvoiceId::new(confirmed.invoice_id),
            purchase_order_id: confirmed.order_id,
            supplier_id: confirmed.supplier_id,
            lines,
            occurred_at: confirmed.occurred_at,
        })
    }

    pub fn restore(snapshot: InvoiceSnapshot) -> Self {
        Self {
            id: snapshot.id,
            purchase_order_id: Some(snapshot.purchase_order_id),
            supplier_id: Some(snapshot.supplier_id),
            issued_at: Some(snapshot.issued_at),
            status: snapshot.status,
            lines: snapshot.lines,
            total_amount: snapshot.total_amount,
            version: snapshot.version,
            created: true,
        }
    }

    pub fn snapshot(&self) -> Option<InvoiceSnapshot> {
        Some(InvoiceSnapshot {
            id: self.id,
            purchase_order_id: self.purchase_order_id?,
            supplier_id: self.supplier_id?,
            issued_at: self.issued_at?,
            status: self.status,
            lines: self.lines.clone(),
            total_amount: self.total_amount,
            version: self.version,
        })
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn purchase_order_id(&self) -> Option<PurchaseOrderId> {
        self.purchase_order_id
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn lines(&self) -> &[InvoiceLine] {
        &self.lines
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: IssueInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueInvoice {
    pub invoice_id: InvoiceId,
    pub purchase_order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub lines: Vec<InvoiceLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    IssueInvoice(IssueInvoice),
}

/// Event: InvoiceIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceIssued {
    pub invoice_id: InvoiceId,
    pub purchase_order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub lines: Vec<InvoiceLine>,
    pub total_amount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceIssued(InvoiceIssued),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceIssued(_) => "invoicing.invoice.issued",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceIssued(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceIssued(e) => {
                self.id = e.invoice_id;
                self.purchase_order_id = Some(e.purchase_order_id);
                self.supplier_id = Some(e.supplier_id);
                self.issued_at = Some(e.occurred_at);
                self.lines = e.lines.clone();
                self.total_amount = e.total_amount;
                self.status = InvoiceStatus::Completed;
                self.created = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::IssueInvoice(cmd) => self.handle_issue(cmd),
        }
    }
}

impl Invoice {
    fn handle_issue(&self, cmd: &IssueInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("invoice already exists"));
        }
        if self.id != cmd.invoice_id {
            return Err(DomainError::invariant("invoice_id mismatch"));
        }

        if cmd.lines.is_empty() {
            return Err(DomainError::validation("cannot issue invoice without lines"));
        }

        let mut total = Decimal::ZERO;
        for line in &cmd.lines {
            if line.received_quantity < 0 {
                return Err(DomainError::validation(
                    "invoice line quantity cannot be negative",
                ));
            }
            money::ensure_positive_price(line.unit_price, "invoice line unit_price")?;
            total = total
                .checked_add(line.subtotal()?)
                .ok_or_else(|| DomainError::invariant("invoice total overflow"))?;
        }

        Ok(vec![InvoiceEvent::InvoiceIssued(InvoiceIssued {
            invoice_id: cmd.invoice_id,
            purchase_order_id: cmd.purchase_order_id,
            supplier_id: cmd.supplier_id,
            lines: cmd.lines.clone(),
            total_amount: total,
            occurred_at: cmd.occurred_at,
        })])
    }
}
