use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockwise_core::{
    DomainError, DomainResult, Entity, LocationId, ProductId, TransferId, UnitOfWork,
};
use stockwise_events::{Event, EventDispatcher};
use stockwise_ledger::{
    MovementLedger, MovementRepository, MovementType, NewMovement, ReferenceType, StockRepository,
};

/// Stock transfer status lifecycle.
///
/// DRAFT → CONFIRMED → RECEIVED (terminal); DRAFT|CONFIRMED → CANCELLED
/// (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Draft,
    Confirmed,
    Received,
    Cancelled,
}

/// Transfer line: product and quantity to move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransferItem {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Two-location move with a reserve-then-commit protocol.
///
/// Confirming places a reservation hold at the source; receiving releases
/// the hold and writes the OUT/IN movement pair; cancelling a confirmed
/// transfer releases the hold without moving anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransfer {
    id: TransferId,
    source_location_id: LocationId,
    destination_location_id: LocationId,
    status: TransferStatus,
    items: Vec<StockTransferItem>,
    created_at: DateTime<Utc>,
}

impl Entity for StockTransfer {
    type Id = TransferId;

    fn id(&self) -> TransferId {
        self.id
    }
}

impl StockTransfer {
    pub fn new(
        source_location_id: LocationId,
        destination_location_id: LocationId,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if source_location_id == destination_location_id {
            return Err(DomainError::rule(
                "source and destination locations must differ",
            ));
        }
        Ok(Self {
            id: TransferId::new(),
            source_location_id,
            destination_location_id,
            status: TransferStatus::Draft,
            items: Vec::new(),
            created_at,
        })
    }

    pub fn source_location_id(&self) -> LocationId {
        self.source_location_id
    }

    pub fn destination_location_id(&self) -> LocationId {
        self.destination_location_id
    }

    pub fn status(&self) -> TransferStatus {
        self.status
    }

    pub fn items(&self) -> &[StockTransferItem] {
        &self.items
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Add a line. Only DRAFT transfers are editable.
    pub fn add_item(&mut self, product_id: ProductId, quantity: i64) -> DomainResult<u32> {
        if self.status != TransferStatus::Draft {
            return Err(DomainError::rule(
                "cannot modify transfer once it is confirmed",
            ));
        }
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        let line_no = (self.items.len() as u32) + 1;
        self.items.push(StockTransferItem {
            line_no,
            product_id,
            quantity,
        });
        Ok(line_no)
    }

    pub(crate) fn mark_confirmed(&mut self) -> DomainResult<()> {
        if self.status != TransferStatus::Draft {
            return Err(DomainError::rule("only draft transfers can be confirmed"));
        }
        if self.items.is_empty() {
            return Err(DomainError::validation(
                "cannot confirm transfer without items",
            ));
        }
        self.status = TransferStatus::Confirmed;
        Ok(())
    }

    pub(crate) fn mark_received(&mut self) -> DomainResult<()> {
        if self.status != TransferStatus::Confirmed {
            return Err(DomainError::rule(
                "only confirmed transfers can be received",
            ));
        }
        self.status = TransferStatus::Received;
        Ok(())
    }

    /// Cancel. Returns whether the transfer was confirmed (and therefore
    /// holds reservations the caller must release).
    pub(crate) fn mark_cancelled(&mut self) -> DomainResult<bool> {
        match self.status {
            TransferStatus::Draft => {
                self.status = TransferStatus::Cancelled;
                Ok(false)
            }
            TransferStatus::Confirmed => {
                self.status = TransferStatus::Cancelled;
                Ok(true)
            }
            TransferStatus::Received => {
                Err(DomainError::rule("received transfers cannot be cancelled"))
            }
            TransferStatus::Cancelled => {
                Err(DomainError::rule("transfer is already cancelled"))
            }
        }
    }
}

/// Event: transfer confirmed; reservations are in place at the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfirmed {
    pub transfer_id: TransferId,
    pub occurred_at: DateTime<Utc>,
}

impl Event for TransferConfirmed {
    fn event_type(&self) -> &'static str {
        "inventory.transfer.confirmed"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Event: transfer received; the OUT/IN movement pair has been appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceived {
    pub transfer_id: TransferId,
    pub occurred_at: DateTime<Utc>,
}

impl Event for TransferReceived {
    fn event_type(&self) -> &'static str {
        "inventory.transfer.received"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Event: transfer cancelled. `was_confirmed` tells subscribers whether
/// reservations were released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCancelled {
    pub transfer_id: TransferId,
    pub was_confirmed: bool,
    pub occurred_at: DateTime<Utc>,
}

impl Event for TransferCancelled {
    fn event_type(&self) -> &'static str {
        "inventory.transfer.cancelled"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Persistence consumed by the transfer service.
pub trait TransferRepository: Send + Sync {
    fn insert_transfer(&self, transfer: StockTransfer) -> DomainResult<()>;
    fn transfer(&self, id: TransferId) -> Option<StockTransfer>;
    fn update_transfer(&self, transfer: StockTransfer) -> DomainResult<()>;
}

/// Command handlers for the transfer state machine.
#[derive(Debug)]
pub struct TransferService<S> {
    store: Arc<S>,
    dispatcher: Arc<EventDispatcher>,
    ledger: MovementLedger<S>,
}

impl<S> TransferService<S>
where
    S: TransferRepository + StockRepository + MovementRepository + UnitOfWork + 'static,
{
    pub fn new(store: Arc<S>, dispatcher: Arc<EventDispatcher>) -> Self {
        let ledger = MovementLedger::new(Arc::clone(&store), Arc::clone(&dispatcher));
        Self {
            store,
            dispatcher,
            ledger,
        }
    }

    pub fn create(
        &self,
        source_location_id: LocationId,
        destination_location_id: LocationId,
    ) -> DomainResult<StockTransfer> {
        self.store.run(|| {
            let transfer =
                StockTransfer::new(source_location_id, destination_location_id, Utc::now())?;
            self.store.insert_transfer(transfer.clone())?;
            Ok(transfer)
        })
    }

    pub fn add_item(
        &self,
        transfer_id: TransferId,
        product_id: ProductId,
        quantity: i64,
    ) -> DomainResult<u32> {
        self.store.run(|| {
            let mut transfer = self.load(transfer_id)?;
            let line_no = transfer.add_item(product_id, quantity)?;
            self.store.update_transfer(transfer)?;
            Ok(line_no)
        })
    }

    /// Confirm: validate every item against available stock at the source,
    /// then place all reservations. No stock is mutated unless all items
    /// pass.
    pub fn confirm(&self, transfer_id: TransferId) -> DomainResult<()> {
        self.store.run(|| {
            let mut transfer = self.load(transfer_id)?;
            transfer.mark_confirmed()?;

            let source = transfer.source_location_id();

            // Validation pass: total demand per product, before mutating any
            // stock. Repeated lines for one product must be covered together.
            let mut required: HashMap<ProductId, i64> = HashMap::new();
            for item in transfer.items() {
                *required.entry(item.product_id).or_insert(0) += item.quantity;
            }
            for (product_id, quantity) in required {
                let stock = self
                    .store
                    .stock_for(product_id, Some(source))
                    .ok_or_else(|| {
                        DomainError::rule(format!(
                            "no stock for product {product_id} at source location"
                        ))
                    })?;
                if stock.available() < quantity {
                    return Err(DomainError::insufficient_stock(quantity, stock.available()));
                }
            }

            // Mutation pass: re-read each row so repeated products stack.
            for item in transfer.items() {
                let mut stock = self
                    .store
                    .stock_for(item.product_id, Some(source))
                    .ok_or_else(|| DomainError::not_found("stock row"))?;
                stock.reserve(item.quantity)?;
                self.store.upsert_stock(stock)?;
            }

            self.store.update_transfer(transfer)?;

            tracing::info!(transfer_id = %transfer_id, "transfer confirmed");

            self.dispatcher.publish(&TransferConfirmed {
                transfer_id,
                occurred_at: Utc::now(),
            })
        })
    }

    /// Receive: release each reservation at the source, then append the
    /// OUT-at-source / IN-at-destination movement pair per item.
    pub fn receive(&self, transfer_id: TransferId) -> DomainResult<()> {
        self.store.run(|| {
            let mut transfer = self.load(transfer_id)?;
            transfer.mark_received()?;

            let source = transfer.source_location_id();
            let destination = transfer.destination_location_id();
            let now = Utc::now();

            for item in transfer.items() {
                let mut stock = self
                    .store
                    .stock_for(item.product_id, Some(source))
                    .ok_or_else(|| DomainError::not_found("stock row"))?;
                stock.release(item.quantity)?;
                self.store.upsert_stock(stock)?;

                self.ledger.append(
                    NewMovement::new(
                        item.product_id,
                        -item.quantity,
                        MovementType::Out,
                        Some(source),
                        now,
                    )
                    .with_reference(ReferenceType::Transfer, transfer_id.into())
                    .with_reason("transfer out"),
                )?;

                self.ledger.append(
                    NewMovement::new(
                        item.product_id,
                        item.quantity,
                        MovementType::In,
                        Some(destination),
                        now,
                    )
                    .with_reference(ReferenceType::Transfer, transfer_id.into())
                    .with_source(source)
                    .with_reason("transfer in"),
                )?;
            }

            self.store.update_transfer(transfer)?;

            tracing::info!(transfer_id = %transfer_id, "transfer received");

            self.dispatcher.publish(&TransferReceived {
                transfer_id,
                occurred_at: now,
            })
        })
    }

    /// Cancel: from CONFIRMED, release all reservations first; from DRAFT,
    /// no stock effect. RECEIVED cannot cancel.
    pub fn cancel(&self, transfer_id: TransferId) -> DomainResult<()> {
        self.store.run(|| {
            let mut transfer = self.load(transfer_id)?;
            let was_confirmed = transfer.mark_cancelled()?;

            if was_confirmed {
                let source = transfer.source_location_id();
                for item in transfer.items() {
                    let mut stock = self
                        .store
                        .stock_for(item.product_id, Some(source))
                        .ok_or_else(|| DomainError::not_found("stock row"))?;
                    stock.release(item.quantity)?;
                    self.store.upsert_stock(stock)?;
                }
            }

            self.store.update_transfer(transfer)?;

            tracing::info!(transfer_id = %transfer_id, was_confirmed, "transfer cancelled");

            self.dispatcher.publish(&TransferCancelled {
                transfer_id,
                was_confirmed,
                occurred_at: Utc::now(),
            })
        })
    }

    pub fn get(&self, transfer_id: TransferId) -> Option<StockTransfer> {
        self.store.transfer(transfer_id)
    }

    fn load(&self, transfer_id: TransferId) -> DomainResult<StockTransfer> {
        self.store
            .transfer(transfer_id)
            .ok_or_else(|| DomainError::not_found("stock transfer"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft_transfer() -> StockTransfer {
        StockTransfer::new(LocationId::new(), LocationId::new(), Utc::now()).unwrap()
    }

    #[test]
    fn source_and_destination_must_differ() {
        let location = LocationId::new();
        let err = StockTransfer::new(location, location, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Rule(_)));
    }

    #[test]
    fn items_only_mutable_while_draft() {
        let mut transfer = draft_transfer();
        transfer.add_item(ProductId::new(), 5).unwrap();
        transfer.mark_confirmed().unwrap();

        let err = transfer.add_item(ProductId::new(), 1).unwrap_err();
        assert!(matches!(err, DomainError::Rule(_)));
    }

    #[test]
    fn add_item_rejects_non_positive_quantity() {
        let mut transfer = draft_transfer();
        assert!(matches!(
            transfer.add_item(ProductId::new(), 0),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            transfer.add_item(ProductId::new(), -2),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn line_numbers_are_sequential() {
        let mut transfer = draft_transfer();
        assert_eq!(transfer.add_item(ProductId::new(), 1).unwrap(), 1);
        assert_eq!(transfer.add_item(ProductId::new(), 2).unwrap(), 2);
    }

    #[test]
    fn cannot_confirm_empty_transfer() {
        let mut transfer = draft_transfer();
        assert!(matches!(
            transfer.mark_confirmed(),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn receive_requires_confirmed() {
        let mut transfer = draft_transfer();
        transfer.add_item(ProductId::new(), 5).unwrap();

        assert!(matches!(
            transfer.mark_received(),
            Err(DomainError::Rule(_))
        ));

        transfer.mark_confirmed().unwrap();
        transfer.mark_received().unwrap();
        assert_eq!(transfer.status(), TransferStatus::Received);
    }

    #[test]
    fn cancel_reports_whether_reservations_exist() {
        let mut draft = draft_transfer();
        assert_eq!(draft.mark_cancelled().unwrap(), false);

        let mut confirmed = draft_transfer();
        confirmed.add_item(ProductId::new(), 5).unwrap();
        confirmed.mark_confirmed().unwrap();
        assert_eq!(confirmed.mark_cancelled().unwrap(), true);
    }

    #[test]
    fn received_is_terminal() {
        let mut transfer = draft_transfer();
        transfer.add_item(ProductId::new(), 5).unwrap();
        transfer.mark_confirmed().unwrap();
        transfer.mark_received().unwrap();

        assert!(matches!(
            transfer.mark_cancelled(),
            Err(DomainError::Rule(_))
        ));
        assert_eq!(transfer.status(), TransferStatus::Received);
    }
}
