//! Composition root: wires the store, dispatcher, projection, listeners and
//! services into one running engine.

use std::sync::Arc;

use uuid::Uuid;

use stockwise_core::{DomainResult, LocationId, ProductId, UnitOfWork};
use stockwise_events::EventDispatcher;
use stockwise_inventory::{AdjustmentService, TransferService};
use stockwise_ledger::{
    Movement, MovementLedger, MovementRepository, NewMovement, ReferenceType, Stock,
    StockProjection, StockRepository,
};
use stockwise_purchasing::{PurchasingService, ReceiptStockHandler};
use stockwise_sales::SaleService;

use crate::memory::MemoryStore;

/// The stock consistency engine over an in-memory store.
///
/// Construction order matters: the stock projection subscribes to
/// `MovementCreated` before any cross-aggregate listener, so by the time a
/// later subscriber runs the stock row already reflects the movement.
pub struct Engine {
    store: Arc<MemoryStore>,
    dispatcher: Arc<EventDispatcher>,
    ledger: MovementLedger<MemoryStore>,
    transfers: TransferService<MemoryStore>,
    adjustments: AdjustmentService<MemoryStore>,
    purchasing: PurchasingService<MemoryStore>,
    sales: SaleService<MemoryStore>,
}

impl Engine {
    pub fn new() -> DomainResult<Self> {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = Arc::new(EventDispatcher::new());

        // Projection first. Listener order is registration order.
        StockProjection::attach(&dispatcher, Arc::clone(&store))?;

        let ledger = MovementLedger::new(Arc::clone(&store), Arc::clone(&dispatcher));
        ReceiptStockHandler::attach(&dispatcher, ledger.clone())?;

        let transfers = TransferService::new(Arc::clone(&store), Arc::clone(&dispatcher));
        let adjustments = AdjustmentService::new(Arc::clone(&store), Arc::clone(&dispatcher));
        let purchasing = PurchasingService::new(Arc::clone(&store), Arc::clone(&dispatcher));
        let sales = SaleService::new(Arc::clone(&store), Arc::clone(&dispatcher));

        Ok(Self {
            store,
            dispatcher,
            ledger,
            transfers,
            adjustments,
            purchasing,
            sales,
        })
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    pub fn transfers(&self) -> &TransferService<MemoryStore> {
        &self.transfers
    }

    pub fn adjustments(&self) -> &AdjustmentService<MemoryStore> {
        &self.adjustments
    }

    pub fn purchasing(&self) -> &PurchasingService<MemoryStore> {
        &self.purchasing
    }

    pub fn sales(&self) -> &SaleService<MemoryStore> {
        &self.sales
    }

    /// Append one movement outside any workflow (e.g. an opening balance).
    pub fn record_movement(&self, new: NewMovement) -> DomainResult<Movement> {
        self.store.run(|| self.ledger.append(new))
    }

    pub fn stock_for(&self, product_id: ProductId, location_id: Option<LocationId>) -> Option<Stock> {
        self.store.stock_for(product_id, location_id)
    }

    pub fn stocks(&self) -> Vec<Stock> {
        self.store.stocks()
    }

    pub fn movements_for(
        &self,
        product_id: ProductId,
        location_id: Option<LocationId>,
    ) -> Vec<Movement> {
        self.store.movements_for(product_id, location_id)
    }

    pub fn movements_by_reference(
        &self,
        reference_type: ReferenceType,
        reference_id: Uuid,
    ) -> Vec<Movement> {
        self.store.movements_by_reference(reference_type, reference_id)
    }
}

