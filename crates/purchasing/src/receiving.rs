//! Receiving workflow + the listener that turns receipts into IN movements.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use stockwise_core::{
    DomainError, DomainResult, LocationId, PartyId, ProductId, PurchaseOrderId, ReceiptId,
    UnitOfWork,
};
use stockwise_events::EventDispatcher;
use stockwise_ledger::{
    MovementLedger, MovementRepository, MovementType, NewMovement, ReferenceType,
};

use crate::order::{
    PurchaseOrder, PurchaseOrderReceived, PurchaseReceipt, PurchaseReceiptItem, PurchaseRepository,
};

/// One line of a `receive` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveLine {
    pub line_no: u32,
    pub quantity: i64,
    pub location_id: Option<LocationId>,
    pub lot_number: Option<String>,
}

/// Command handlers for the purchase order lifecycle.
#[derive(Debug)]
pub struct PurchasingService<S> {
    store: Arc<S>,
    dispatcher: Arc<EventDispatcher>,
}

impl<S> PurchasingService<S>
where
    S: PurchaseRepository + UnitOfWork + 'static,
{
    pub fn new(store: Arc<S>, dispatcher: Arc<EventDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    pub fn create(&self, supplier_id: PartyId) -> DomainResult<PurchaseOrder> {
        self.store.run(|| {
            let order = PurchaseOrder::new(supplier_id, Utc::now());
            self.store.insert_purchase_order(order.clone())?;
            Ok(order)
        })
    }

    pub fn add_item(
        &self,
        order_id: PurchaseOrderId,
        product_id: ProductId,
        quantity_ordered: i64,
    ) -> DomainResult<u32> {
        self.store.run(|| {
            let mut order = self.load(order_id)?;
            let line_no = order.add_item(product_id, quantity_ordered)?;
            self.store.update_purchase_order(order)?;
            Ok(line_no)
        })
    }

    pub fn send(&self, order_id: PurchaseOrderId) -> DomainResult<()> {
        self.store.run(|| {
            let mut order = self.load(order_id)?;
            order.mark_sent()?;
            self.store.update_purchase_order(order)?;

            tracing::info!(order_id = %order_id, "purchase order sent");

            Ok(())
        })
    }

    /// Receive goods against order lines (partial or complete).
    ///
    /// Creates one append-only receipt, updates each line's received
    /// quantity (rejecting anything over the pending quantity), recomputes
    /// the order status and publishes [`PurchaseOrderReceived`]. The IN
    /// movements are created by the [`ReceiptStockHandler`] subscriber,
    /// synchronously, inside this unit of work.
    pub fn receive(
        &self,
        order_id: PurchaseOrderId,
        lines: Vec<ReceiveLine>,
    ) -> DomainResult<PurchaseReceipt> {
        self.store.run(|| {
            if lines.is_empty() {
                return Err(DomainError::validation(
                    "receipt must have at least one line",
                ));
            }

            let mut order = self.load(order_id)?;
            order.ensure_receivable()?;

            let now = Utc::now();
            let mut received = Vec::with_capacity(lines.len());

            for line in &lines {
                let product_id = order.receive_line(line.line_no, line.quantity)?;
                received.push(PurchaseReceiptItem {
                    line_no: line.line_no,
                    product_id,
                    quantity: line.quantity,
                    location_id: line.location_id,
                    lot_number: line.lot_number.clone(),
                });
            }

            order.refresh_status();
            let is_complete = order.is_complete();

            let receipt = PurchaseReceipt {
                id: ReceiptId::new(),
                order_id,
                items: received,
                received_at: now,
            };
            self.store.insert_receipt(receipt.clone())?;
            self.store.update_purchase_order(order)?;

            tracing::info!(
                order_id = %order_id,
                receipt_id = %receipt.id,
                is_complete,
                "purchase order received"
            );

            self.dispatcher.publish(&PurchaseOrderReceived {
                order_id,
                receipt_id: receipt.id,
                is_complete,
                items: receipt.items.clone(),
                occurred_at: now,
            })?;

            Ok(receipt)
        })
    }

    pub fn cancel(&self, order_id: PurchaseOrderId) -> DomainResult<()> {
        self.store.run(|| {
            let mut order = self.load(order_id)?;
            order.mark_cancelled()?;
            self.store.update_purchase_order(order)?;

            tracing::info!(order_id = %order_id, "purchase order cancelled");

            Ok(())
        })
    }

    pub fn get(&self, order_id: PurchaseOrderId) -> Option<PurchaseOrder> {
        self.store.purchase_order(order_id)
    }

    pub fn receipts(&self, order_id: PurchaseOrderId) -> Vec<PurchaseReceipt> {
        self.store.receipts_for_order(order_id)
    }

    fn load(&self, order_id: PurchaseOrderId) -> DomainResult<PurchaseOrder> {
        self.store
            .purchase_order(order_id)
            .ok_or_else(|| DomainError::not_found("purchase order"))
    }
}

/// Subscriber that appends one IN movement per received line.
///
/// This is the only path from receiving to stock: purchasing never writes
/// stock rows or movements directly, it publishes and this listener appends
/// through the ledger on the same call stack.
pub struct ReceiptStockHandler;

impl ReceiptStockHandler {
    pub fn attach<S>(dispatcher: &Arc<EventDispatcher>, ledger: MovementLedger<S>) -> DomainResult<()>
    where
        S: MovementRepository + 'static,
    {
        dispatcher.subscribe(move |event: &PurchaseOrderReceived| {
            for item in &event.items {
                ledger.append(
                    NewMovement::new(
                        item.product_id,
                        item.quantity,
                        MovementType::In,
                        item.location_id,
                        event.occurred_at,
                    )
                    .with_reference(ReferenceType::Purchase, event.order_id.into())
                    .with_reason(format!("purchase receipt {}", event.receipt_id)),
                )?;
            }
            Ok(())
        })
    }
}
