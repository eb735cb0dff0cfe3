use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procure_catalog::{ProductId, SupplierId};
use procure_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Event, Money, money, typed_id};

use crate::simulation::{DeliverySimulation, DeliveryStatus, LineOutcome};

typed_id!(
    /// Purchase order identifier.
    PurchaseOrderId
);

/// Purchase order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PurchaseOrderStatus {
    Pending,
    Completed,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Pending => "PENDING",
            PurchaseOrderStatus::Completed => "COMPLETED",
            PurchaseOrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "PENDING" => Ok(PurchaseOrderStatus::Pending),
            "COMPLETED" => Ok(PurchaseOrderStatus::Completed),
            "CANCELLED" => Ok(PurchaseOrderStatus::Cancelled),
            other => Err(DomainError::validation(format!(
                "unknown purchase order status '{other}'"
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PurchaseOrderStatus::Pending)
    }
}

/// A line as submitted, with the supplier's finalized price already resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub requested_quantity: i64,
    pub requested_unit_price: Money,
    /// Price quoted by the supplier at order time.
    pub unit_price: Money,
}

/// Purchase order line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub requested_quantity: i64,
    pub requested_unit_price: Money,
    /// Finalized at creation; used for both simulation and invoicing.
    pub unit_price: Money,
    /// Filled once by the delivery simulation.
    pub simulated_quantity: Option<i64>,
    pub simulated_status: Option<DeliveryStatus>,
}

impl PurchaseOrderLine {
    pub fn outcome(&self) -> Option<LineOutcome> {
        Some(LineOutcome {
            product_id: self.product_id,
            requested_quantity: self.requested_quantity,
            received_quantity: self.simulated_quantity?,
            status: self.simulated_status?,
        })
    }
}

/// Operator-confirmed quantity for one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedLine {
    pub product_id: ProductId,
    pub received_quantity: i64,
}

/// A confirmed line joined with the order line it refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub requested_quantity: i64,
    pub received_quantity: i64,
    pub unit_price: Money,
}

/// Persistent shape of a purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderSnapshot {
    pub id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub ordered_at: DateTime<Utc>,
    pub status: PurchaseOrderStatus,
    pub lines: Vec<PurchaseOrderLine>,
    pub expected_delay_days: Option<u32>,
    pub invoice_id: Option<AggregateId>,
    pub version: u64,
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    supplier_id: Option<SupplierId>,
    ordered_at: Option<DateTime<Utc>>,
    status: PurchaseOrderStatus,
    lines: Vec<PurchaseOrderLine>,
    expected_delay_days: Option<u32>,
    invoice_id: Option<AggregateId>,
    version: u64,
    created: bool,
}

impl PurchaseOrder {
    /// Create an empty, not-yet-placed aggregate instance.
    pub fn empty(id: PurchaseOrderId) -> Self {
        Self {
            id,
            supplier_id: None,
            ordered_at: None,
            status: PurchaseOrderStatus::Pending,
            lines: Vec::new(),
            expected_delay_days: None,
            invoice_id: None,
            version: 0,
            created: false,
        }
    }

    /// Rebuild a stored order.
    pub fn restore(snapshot: PurchaseOrderSnapshot) -> Self {
        Self {
            id: snapshot.id,
            supplier_id: Some(snapshot.supplier_id),
            ordered_at: Some(snapshot.ordered_at),
            status: snapshot.status,
            lines: snapshot.lines,
            expected_delay_days: snapshot.expected_delay_days,
            invoice_id: snapshot.invoice_id,
            version: snapshot.version,
            created: true,
        }
    }

    /// Persistent shape; `None` until the order has been placed.
    pub fn snapshot(&self) -> Option<PurchaseOrderSnapshot> {
        Some(PurchaseOrderSnapshot {
            id: self.id,
            supplier_id: self.supplier_id?,
            ordered_at: self.ordered_at?,
            status: self.status,
            lines: self.lines.clone(),
            expected_delay_days: self.expected_delay_days,
            invoice_id: self.invoice_id,
            version: self.version,
        })
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn is_placed(&self) -> bool {
        self.created
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn ordered_at(&self) -> Option<DateTime<Utc>> {
        self.ordered_at
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[PurchaseOrderLine] {
        &self.lines
    }

    pub fn expected_delay_days(&self) -> Option<u32> {
        self.expected_delay_days
    }

    pub fn invoice_id(&self) -> Option<AggregateId> {
        self.invoice_id
    }

    pub fn line_for(&self, product_id: ProductId) -> Option<&PurchaseOrderLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    pub fn is_simulated(&self) -> bool {
        self.expected_delay_days.is_some()
    }

    /// Stored simulation results, in line order.
    pub fn simulation(&self) -> Option<DeliverySimulation> {
        let delay_days = self.expected_delay_days?;
        let outcomes = self
            .lines
            .iter()
            .map(PurchaseOrderLine::outcome)
            .collect::<Option<Vec<_>>>()?;
        Some(DeliverySimulation {
            delay_days,
            outcomes,
        })
    }

    /// `(product, requested quantity)` pairs fed to the simulator.
    pub fn simulation_input(&self) -> Vec<(ProductId, i64)> {
        self.lines
            .iter()
            .map(|l| (l.product_id, l.requested_quantity))
            .collect()
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub lines: Vec<PricedLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordSimulation (once, right after placing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSimulation {
    pub order_id: PurchaseOrderId,
    pub simulation: DeliverySimulation,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmDelivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmDelivery {
    pub order_id: PurchaseOrderId,
    /// Id the caller reserves for the invoice issued from this confirmation.
    pub invoice_id: AggregateId,
    pub lines: Vec<ReceivedLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Cancel (only while pending).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancel {
    pub order_id: PurchaseOrderId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    PlaceOrder(PlaceOrder),
    RecordSimulation(RecordSimulation),
    ConfirmDelivery(ConfirmDelivery),
    Cancel(Cancel),
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub lines: Vec<PurchaseOrderLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeliverySimulated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySimulated {
    pub order_id: PurchaseOrderId,
    pub simulation: DeliverySimulation,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeliveryConfirmed.
///
/// Carries everything the invoice generator and the stock ledger need:
/// the confirmed quantities joined with the finalized unit prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryConfirmed {
    pub order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub invoice_id: AggregateId,
    pub lines: Vec<ConfirmedLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: PurchaseOrderId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    OrderPlaced(OrderPlaced),
    DeliverySimulated(DeliverySimulated),
    DeliveryConfirmed(DeliveryConfirmed),
    OrderCancelled(OrderCancelled),
}

impl Event for PurchaseOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseOrderEvent::OrderPlaced(_) => "purchasing.order.placed",
            PurchaseOrderEvent::DeliverySimulated(_) => "purchasing.order.delivery_simulated",
            PurchaseOrderEvent::DeliveryConfirmed(_) => "purchasing.order.delivery_confirmed",
            PurchaseOrderEvent::OrderCancelled(_) => "purchasing.order.cancelled",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseOrderEvent::OrderPlaced(e) => e.occurred_at,
            PurchaseOrderEvent::DeliverySimulated(e) => e.occurred_at,
            PurchaseOrderEvent::DeliveryConfirmed(e) => e.occurred_at,
            PurchaseOrderEvent::OrderCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.supplier_id = Some(e.supplier_id);
                self.ordered_at = Some(e.occurred_at);
                self.status = PurchaseOrderStatus::Pending;
                self.lines = e.lines.clone();
                self.expected_delay_days = None;
                self.invoice_id = None;
                self.created = true;
            }
            PurchaseOrderEvent::DeliverySimulated(e) => {
                for (line, outcome) in self.lines.iter_mut().zip(&e.simulation.outcomes) {
                    line.simulated_quantity = Some(outcome.received_quantity);
                    line.simulated_status = Some(outcome.status);
                }
                self.expected_delay_days = Some(e.simulation.delay_days);
            }
            PurchaseOrderEvent::DeliveryConfirmed(e) => {
                self.invoice_id = Some(e.invoice_id);
                self.status = PurchaseOrderStatus::Completed;
            }
            PurchaseOrderEvent::OrderCancelled(_) => {
                self.status = PurchaseOrderStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseOrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            PurchaseOrderCommand::RecordSimulation(cmd) => self.handle_record_simulation(cmd),
            PurchaseOrderCommand::ConfirmDelivery(cmd) => self.handle_confirm(cmd),
            PurchaseOrderCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl PurchaseOrder {
    fn ensure_placed(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("purchase order {}", self.id)));
        }
        Ok(())
    }

    fn ensure_order_id(&self, order_id: PurchaseOrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_pending(&self) -> Result<(), DomainError> {
        if self.status != PurchaseOrderStatus::Pending {
            return Err(DomainError::conflict(format!(
                "purchase order {} is {}",
                self.id,
                self.status.as_str()
            )));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase order already exists"));
        }
        self.ensure_order_id(cmd.order_id)?;

        if cmd.lines.is_empty() {
            return Err(DomainError::validation(
                "purchase order must have at least one line",
            ));
        }

        let mut seen = HashSet::with_capacity(cmd.lines.len());
        for line in &cmd.lines {
            if line.requested_quantity <= 0 {
                return Err(DomainError::validation("requested quantity must be positive"));
            }
            money::ensure_positive_price(line.requested_unit_price, "purchase price")?;
            money::ensure_cents(line.requested_unit_price, "purchase price")?;
            money::ensure_positive_price(line.unit_price, "finalized unit price")?;
            if !seen.insert(line.product_id) {
                return Err(DomainError::validation(format!(
                    "product {} appears more than once",
                    line.product_id
                )));
            }
        }

        let lines = cmd
            .lines
            .iter()
            .enumerate()
            .map(|(idx, l)| PurchaseOrderLine {
                line_no: idx as u32 + 1,
                product_id: l.product_id,
                requested_quantity: l.requested_quantity,
                requested_unit_price: money::round_money(l.requested_unit_price),
                unit_price: l.unit_price,
                simulated_quantity: None,
                simulated_status: None,
            })
            .collect();

        Ok(vec![PurchaseOrderEvent::OrderPlaced(OrderPlaced {
            order_id: cmd.order_id,
            supplier_id: cmd.supplier_id,
            lines,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_simulation(
        &self,
        cmd: &RecordSimulation,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_placed()?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_pending()?;

        if self.is_simulated() {
            return Err(DomainError::conflict("delivery simulation already recorded"));
        }

        let outcomes = &cmd.simulation.outcomes;
        if outcomes.len() != self.lines.len() {
            return Err(DomainError::invariant(
                "simulation must cover every order line",
            ));
        }
        for (line, outcome) in self.lines.iter().zip(outcomes) {
            if line.product_id != outcome.product_id {
                return Err(DomainError::invariant("simulation lines out of order"));
            }
            if outcome.received_quantity < 0 || outcome.received_quantity > line.requested_quantity {
                return Err(DomainError::invariant(
                    "simulated quantity must be within the requested quantity",
                ));
            }
        }

        Ok(vec![PurchaseOrderEvent::DeliverySimulated(DeliverySimulated {
            order_id: cmd.order_id,
            simulation: cmd.simulation.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &ConfirmDelivery) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_placed()?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_pending()?;

        if cmd.lines.is_empty() {
            return Err(DomainError::validation(
                "delivery confirmation must have at least one line",
            ));
        }

        let supplier_id = self
            .supplier_id
            .ok_or_else(|| DomainError::invariant("supplier must be set"))?;

        let mut seen = HashSet::with_capacity(cmd.lines.len());
        let mut confirmed = Vec::with_capacity(cmd.lines.len());
        for received in &cmd.lines {
            if received.received_quantity <= 0 {
                return Err(DomainError::validation("received quantity must be positive"));
            }
            if !seen.insert(received.product_id) {
                return Err(DomainError::validation(format!(
                    "product {} confirmed more than once",
                    received.product_id
                )));
            }
            let line = self.line_for(received.product_id).ok_or_else(|| {
                DomainError::not_found(format!(
                    "product {} is not part of purchase order {}",
                    received.product_id, self.id
                ))
            })?;
            confirmed.push(ConfirmedLine {
                line_no: line.line_no,
                product_id: line.product_id,
                requested_quantity: line.requested_quantity,
                received_quantity: received.received_quantity,
                unit_price: line.unit_price,
            });
        }

        Ok(vec![PurchaseOrderEvent::DeliveryConfirmed(DeliveryConfirmed {
            order_id: cmd.order_id,
            supplier_id,
            invoice_id: cmd.invoice_id,
            lines: confirmed,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &Cancel) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_placed()?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_pending()?;

        Ok(vec![PurchaseOrderEvent::OrderCancelled(OrderCancelled {
            order_id: cmd.order_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{DeliverySimulator, LineOutcome};
    use crate::random::ScriptedSource;
    use rust_decimal::Decimal;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn priced(product_id: ProductId, qty: i64, price: &str) -> PricedLine {
        PricedLine {
            product_id,
            requested_quantity: qty,
            requested_unit_price: dec(price),
            unit_price: dec(price),
        }
    }

    fn placed_order(lines: Vec<PricedLine>) -> PurchaseOrder {
        let order_id = PurchaseOrderId::generate();
        let mut order = PurchaseOrder::empty(order_id);
        order
            .execute(&PurchaseOrderCommand::PlaceOrder(PlaceOrder {
                order_id,
                supplier_id: SupplierId::generate(),
                lines,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        order
    }

    fn simulated_order(lines: Vec<PricedLine>) -> PurchaseOrder {
        let mut order = placed_order(lines);
        let simulation = DeliverySimulator::default()
            .simulate(&order.simulation_input(), &mut ScriptedSource::new([0.9, 0.5]));
        order
            .execute(&PurchaseOrderCommand::RecordSimulation(RecordSimulation {
                order_id: order.id_typed(),
                simulation,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        order
    }

    fn confirm_cmd(order: &PurchaseOrder, lines: Vec<ReceivedLine>) -> PurchaseOrderCommand {
        PurchaseOrderCommand::ConfirmDelivery(ConfirmDelivery {
            order_id: order.id_typed(),
            invoice_id: AggregateId::new(),
            lines,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn place_order_numbers_lines_and_stays_pending() {
        let a = ProductId::generate();
        let b = ProductId::generate();
        let order = placed_order(vec![priced(a, 10, "100.00"), priced(b, 2, "3.50")]);

        assert!(order.is_placed());
        assert_eq!(order.status(), PurchaseOrderStatus::Pending);
        assert_eq!(order.lines().len(), 2);
        assert_eq!(order.lines()[0].line_no, 1);
        assert_eq!(order.lines()[1].line_no, 2);
        assert_eq!(order.version(), 1);
        assert!(order.simulation().is_none());
    }

    #[test]
    fn place_order_stores_requested_price_in_cents() {
        let p = ProductId::generate();
        let order = placed_order(vec![priced(p, 1, "12.5")]);
        assert_eq!(order.lines()[0].requested_unit_price.to_string(), "12.50");
    }

    #[test]
    fn place_order_rejects_empty_and_invalid_lines() {
        let order_id = PurchaseOrderId::generate();
        let order = PurchaseOrder::empty(order_id);
        let cmd = |lines| {
            PurchaseOrderCommand::PlaceOrder(PlaceOrder {
                order_id,
                supplier_id: SupplierId::generate(),
                lines,
                occurred_at: Utc::now(),
            })
        };

        let p = ProductId::generate();
        for lines in [
            vec![],
            vec![priced(p, 0, "1.00")],
            vec![priced(p, 1, "0.00")],
            vec![priced(p, 1, "10.005")],
            vec![priced(p, 1, "1.00"), priced(p, 2, "1.00")],
        ] {
            let err = order.handle(&cmd(lines)).unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)), "got {err:?}");
        }
    }

    #[test]
    fn recorded_simulation_is_stored_on_lines() {
        let order = simulated_order(vec![priced(ProductId::generate(), 10, "100.00")]);

        let sim = order.simulation().unwrap();
        assert_eq!(sim.delay_days, 0);
        assert_eq!(sim.outcomes[0].status, DeliveryStatus::Complete);
        assert_eq!(order.lines()[0].simulated_quantity, Some(10));
        assert_eq!(order.version(), 2);
    }

    #[test]
    fn simulation_can_only_be_recorded_once() {
        let order = simulated_order(vec![priced(ProductId::generate(), 10, "100.00")]);
        let cmd = PurchaseOrderCommand::RecordSimulation(RecordSimulation {
            order_id: order.id_typed(),
            simulation: order.simulation().unwrap(),
            occurred_at: Utc::now(),
        });
        assert!(matches!(order.handle(&cmd), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn simulation_with_impossible_quantity_is_rejected() {
        let product_id = ProductId::generate();
        let order = placed_order(vec![priced(product_id, 5, "1.00")]);
        let cmd = PurchaseOrderCommand::RecordSimulation(RecordSimulation {
            order_id: order.id_typed(),
            simulation: DeliverySimulation {
                delay_days: 0,
                outcomes: vec![LineOutcome {
                    product_id,
                    requested_quantity: 5,
                    received_quantity: 6,
                    status: DeliveryStatus::Complete,
                }],
            },
            occurred_at: Utc::now(),
        });
        assert!(matches!(order.handle(&cmd), Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn confirm_joins_finalized_prices_and_completes() {
        let product_id = ProductId::generate();
        let mut order = simulated_order(vec![PricedLine {
            product_id,
            requested_quantity: 10,
            requested_unit_price: dec("100.00"),
            unit_price: dec("97.35"),
        }]);

        let events = order
            .execute(&confirm_cmd(
                &order,
                vec![ReceivedLine {
                    product_id,
                    received_quantity: 8,
                }],
            ))
            .unwrap();

        match &events[0] {
            PurchaseOrderEvent::DeliveryConfirmed(e) => {
                assert_eq!(e.lines.len(), 1);
                assert_eq!(e.lines[0].unit_price, dec("97.35"));
                assert_eq!(e.lines[0].requested_quantity, 10);
                assert_eq!(e.lines[0].received_quantity, 8);
                assert_eq!(order.invoice_id(), Some(e.invoice_id));
            }
            other => panic!("Expected DeliveryConfirmed event, got {other:?}"),
        }
        assert_eq!(order.status(), PurchaseOrderStatus::Completed);
    }

    #[test]
    fn confirm_of_foreign_product_is_not_found() {
        let order = simulated_order(vec![priced(ProductId::generate(), 10, "1.00")]);
        let err = order
            .handle(&confirm_cmd(
                &order,
                vec![ReceivedLine {
                    product_id: ProductId::generate(),
                    received_quantity: 1,
                }],
            ))
            .unwrap_err();
        match err {
            DomainError::NotFound(msg) if msg.contains("is not part of purchase order") => {}
            other => panic!("Expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn second_confirmation_conflicts() {
        let product_id = ProductId::generate();
        let mut order = simulated_order(vec![priced(product_id, 3, "1.00")]);
        let lines = vec![ReceivedLine {
            product_id,
            received_quantity: 3,
        }];
        order.execute(&confirm_cmd(&order, lines.clone())).unwrap();

        let err = order.handle(&confirm_cmd(&order, lines)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn confirm_rejects_non_positive_and_duplicate_quantities() {
        let product_id = ProductId::generate();
        let order = simulated_order(vec![priced(product_id, 3, "1.00")]);

        let negative = vec![ReceivedLine {
            product_id,
            received_quantity: -1,
        }];
        let zero = vec![ReceivedLine {
            product_id,
            received_quantity: 0,
        }];
        let duplicate = vec![
            ReceivedLine {
                product_id,
                received_quantity: 1,
            },
            ReceivedLine {
                product_id,
                received_quantity: 2,
            },
        ];
        for lines in [vec![], negative, zero, duplicate] {
            let err = order.handle(&confirm_cmd(&order, lines)).unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)), "got {err:?}");
        }
    }

    #[test]
    fn cancelled_order_cannot_be_confirmed() {
        let product_id = ProductId::generate();
        let mut order = simulated_order(vec![priced(product_id, 3, "1.00")]);
        order
            .execute(&PurchaseOrderCommand::Cancel(Cancel {
                order_id: order.id_typed(),
                reason: Some("supplier closed".to_string()),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        assert_eq!(order.status(), PurchaseOrderStatus::Cancelled);
        assert!(order.status().is_terminal());

        let err = order
            .handle(&confirm_cmd(
                &order,
                vec![ReceivedLine {
                    product_id,
                    received_quantity: 3,
                }],
            ))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn commands_on_unplaced_order_are_not_found() {
        let order = PurchaseOrder::empty(PurchaseOrderId::generate());
        let err = order
            .handle(&PurchaseOrderCommand::Cancel(Cancel {
                order_id: order.id_typed(),
                reason: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn snapshot_restores_identical_aggregate() {
        let order = simulated_order(vec![priced(ProductId::generate(), 4, "2.25")]);
        let restored = PurchaseOrder::restore(order.snapshot().unwrap());
        assert_eq!(restored, order);
        assert!(PurchaseOrder::empty(PurchaseOrderId::generate()).snapshot().is_none());
    }
}
