use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockwise_core::{
    DomainError, DomainResult, Entity, LocationId, PartyId, ProductId, PurchaseOrderId, ReceiptId,
};
use stockwise_events::Event;

/// Purchase order status lifecycle.
///
/// DRAFT → SENT → {PARTIAL → RECEIVED} | CANCELLED; cancellation is blocked
/// once RECEIVED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseOrderStatus {
    Draft,
    Sent,
    Partial,
    Received,
    Cancelled,
}

/// Order line: ordered vs. received so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderItem {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity_ordered: i64,
    pub quantity_received: i64,
}

impl PurchaseOrderItem {
    /// Quantity still outstanding for this line.
    pub fn quantity_pending(&self) -> i64 {
        self.quantity_ordered - self.quantity_received
    }
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    supplier_id: PartyId,
    status: PurchaseOrderStatus,
    items: Vec<PurchaseOrderItem>,
    created_at: DateTime<Utc>,
}

impl Entity for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> PurchaseOrderId {
        self.id
    }
}

impl PurchaseOrder {
    pub fn new(supplier_id: PartyId, created_at: DateTime<Utc>) -> Self {
        Self {
            id: PurchaseOrderId::new(),
            supplier_id,
            status: PurchaseOrderStatus::Draft,
            items: Vec::new(),
            created_at,
        }
    }

    pub fn supplier_id(&self) -> PartyId {
        self.supplier_id
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn items(&self) -> &[PurchaseOrderItem] {
        &self.items
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn item(&self, line_no: u32) -> Option<&PurchaseOrderItem> {
        self.items.iter().find(|i| i.line_no == line_no)
    }

    /// True when every line's pending quantity is zero.
    pub fn is_complete(&self) -> bool {
        self.items.iter().all(|i| i.quantity_pending() == 0)
    }

    /// Add a line. Only DRAFT orders are editable.
    pub fn add_item(&mut self, product_id: ProductId, quantity_ordered: i64) -> DomainResult<u32> {
        if self.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::rule(
                "cannot modify purchase order once it is sent",
            ));
        }
        if quantity_ordered <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        let line_no = (self.items.len() as u32) + 1;
        self.items.push(PurchaseOrderItem {
            line_no,
            product_id,
            quantity_ordered,
            quantity_received: 0,
        });
        Ok(line_no)
    }

    pub(crate) fn mark_sent(&mut self) -> DomainResult<()> {
        if self.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::rule(
                "only draft purchase orders can be sent",
            ));
        }
        if self.items.is_empty() {
            return Err(DomainError::validation(
                "cannot send purchase order without items",
            ));
        }
        self.status = PurchaseOrderStatus::Sent;
        Ok(())
    }

    pub(crate) fn mark_cancelled(&mut self) -> DomainResult<()> {
        match self.status {
            PurchaseOrderStatus::Received => Err(DomainError::rule(
                "received purchase orders cannot be cancelled",
            )),
            PurchaseOrderStatus::Cancelled => {
                Err(DomainError::rule("purchase order is already cancelled"))
            }
            _ => {
                self.status = PurchaseOrderStatus::Cancelled;
                Ok(())
            }
        }
    }

    pub(crate) fn ensure_receivable(&self) -> DomainResult<()> {
        match self.status {
            PurchaseOrderStatus::Cancelled => Err(DomainError::rule(
                "cannot receive against a cancelled purchase order",
            )),
            PurchaseOrderStatus::Received => Err(DomainError::rule(
                "purchase order is already fully received",
            )),
            _ => Ok(()),
        }
    }

    /// Record a received quantity against one line.
    ///
    /// Fails with a rule violation naming the limit if the quantity exceeds
    /// the line's pending quantity.
    pub(crate) fn receive_line(&mut self, line_no: u32, quantity: i64) -> DomainResult<ProductId> {
        if quantity <= 0 {
            return Err(DomainError::validation(
                "received quantity must be positive",
            ));
        }

        let item = self
            .items
            .iter_mut()
            .find(|i| i.line_no == line_no)
            .ok_or_else(|| DomainError::not_found(format!("purchase order line {line_no}")))?;

        let pending = item.quantity_pending();
        if quantity > pending {
            return Err(DomainError::rule(format!(
                "line {line_no}: cannot receive {quantity}, only {pending} pending"
            )));
        }

        item.quantity_received += quantity;
        Ok(item.product_id)
    }

    /// Recompute the status after a receipt.
    pub(crate) fn refresh_status(&mut self) {
        self.status = if self.is_complete() {
            PurchaseOrderStatus::Received
        } else {
            PurchaseOrderStatus::Partial
        };
    }
}

/// Append-only receiving event: one receipt per `receive` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub id: ReceiptId,
    pub order_id: PurchaseOrderId,
    pub items: Vec<PurchaseReceiptItem>,
    pub received_at: DateTime<Utc>,
}

impl Entity for PurchaseReceipt {
    type Id = ReceiptId;

    fn id(&self) -> ReceiptId {
        self.id
    }
}

/// One received line, with enough data for downstream IN-movement creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceiptItem {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    pub location_id: Option<LocationId>,
    pub lot_number: Option<String>,
}

/// Event: goods were received against a purchase order.
///
/// Carries the received lines so a listener can create the IN movements
/// without re-reading the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderReceived {
    pub order_id: PurchaseOrderId,
    pub receipt_id: ReceiptId,
    pub is_complete: bool,
    pub items: Vec<PurchaseReceiptItem>,
    pub occurred_at: DateTime<Utc>,
}

impl Event for PurchaseOrderReceived {
    fn event_type(&self) -> &'static str {
        "purchasing.order.received"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Persistence consumed by the purchasing service.
pub trait PurchaseRepository: Send + Sync {
    fn insert_purchase_order(&self, order: PurchaseOrder) -> DomainResult<()>;
    fn purchase_order(&self, id: PurchaseOrderId) -> Option<PurchaseOrder>;
    fn update_purchase_order(&self, order: PurchaseOrder) -> DomainResult<()>;

    /// Receipts are append-only; there is no update or delete.
    fn insert_receipt(&self, receipt: PurchaseReceipt) -> DomainResult<()>;
    fn receipts_for_order(&self, order_id: PurchaseOrderId) -> Vec<PurchaseReceipt>;
}
