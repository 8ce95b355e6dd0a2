//! In-memory storage engine.
//!
//! One [`MemoryStore`] backs every repository trait plus the unit of work.
//! Commands serialize on a store-wide lock and roll back by snapshot, which
//! also covers the read-compute-write races a SQL engine would close with
//! row-level locks.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use uuid::Uuid;

use stockwise_core::{
    AdjustmentId, DomainResult, Entity, LocationId, ProductId, PurchaseOrderId, SaleId,
    TransferId, UnitOfWork,
};
use stockwise_inventory::{
    AdjustmentRepository, InventoryAdjustment, StockTransfer, TransferRepository,
};
use stockwise_ledger::{
    Movement, MovementRepository, ReferenceType, Stock, StockRepository,
};
use stockwise_purchasing::{PurchaseOrder, PurchaseReceipt, PurchaseRepository};
use stockwise_sales::{Sale, SaleRepository};

#[derive(Debug, Default, Clone)]
struct Tables {
    movements: Vec<Movement>,
    stocks: HashMap<(ProductId, Option<LocationId>), Stock>,
    transfers: HashMap<TransferId, StockTransfer>,
    adjustments: HashMap<AdjustmentId, InventoryAdjustment>,
    purchase_orders: HashMap<PurchaseOrderId, PurchaseOrder>,
    receipts: Vec<PurchaseReceipt>,
    sales: HashMap<SaleId, Sale>,
}

/// In-memory store implementing every repository trait and [`UnitOfWork`].
///
/// `run` takes the command lock, snapshots all tables, executes the closure
/// and restores the snapshot on error. The lock is not re-entrant; services
/// own the transaction boundary and nothing below them calls `run`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    command_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UnitOfWork for MemoryStore {
    fn run<T>(&self, work: impl FnOnce() -> DomainResult<T>) -> DomainResult<T> {
        let _guard = self.command_lock.lock().unwrap();
        let snapshot = self.tables.read().unwrap().clone();

        let result = work();
        if result.is_err() {
            *self.tables.write().unwrap() = snapshot;
        }
        result
    }
}

impl MovementRepository for MemoryStore {
    fn insert_movement(&self, movement: Movement) -> DomainResult<()> {
        self.tables.write().unwrap().movements.push(movement);
        Ok(())
    }

    fn movements_for(
        &self,
        product_id: ProductId,
        location_id: Option<LocationId>,
    ) -> Vec<Movement> {
        self.tables
            .read()
            .unwrap()
            .movements
            .iter()
            .filter(|m| m.product_id == product_id && m.location_id == location_id)
            .cloned()
            .collect()
    }

    fn movements_by_reference(
        &self,
        reference_type: ReferenceType,
        reference_id: Uuid,
    ) -> Vec<Movement> {
        self.tables
            .read()
            .unwrap()
            .movements
            .iter()
            .filter(|m| {
                m.reference_type == Some(reference_type) && m.reference_id == Some(reference_id)
            })
            .cloned()
            .collect()
    }
}

impl StockRepository for MemoryStore {
    fn stock_for(&self, product_id: ProductId, location_id: Option<LocationId>) -> Option<Stock> {
        self.tables
            .read()
            .unwrap()
            .stocks
            .get(&(product_id, location_id))
            .cloned()
    }

    fn upsert_stock(&self, stock: Stock) -> DomainResult<()> {
        self.tables
            .write()
            .unwrap()
            .stocks
            .insert((stock.product_id(), stock.location_id()), stock);
        Ok(())
    }

    fn stocks(&self) -> Vec<Stock> {
        self.tables.read().unwrap().stocks.values().cloned().collect()
    }
}

impl TransferRepository for MemoryStore {
    fn insert_transfer(&self, transfer: StockTransfer) -> DomainResult<()> {
        self.tables
            .write()
            .unwrap()
            .transfers
            .insert(transfer.id(), transfer);
        Ok(())
    }

    fn transfer(&self, id: TransferId) -> Option<StockTransfer> {
        self.tables.read().unwrap().transfers.get(&id).cloned()
    }

    fn update_transfer(&self, transfer: StockTransfer) -> DomainResult<()> {
        self.insert_transfer(transfer)
    }
}

impl AdjustmentRepository for MemoryStore {
    fn insert_adjustment(&self, adjustment: InventoryAdjustment) -> DomainResult<()> {
        self.tables
            .write()
            .unwrap()
            .adjustments
            .insert(adjustment.id(), adjustment);
        Ok(())
    }

    fn adjustment(&self, id: AdjustmentId) -> Option<InventoryAdjustment> {
        self.tables.read().unwrap().adjustments.get(&id).cloned()
    }

    fn update_adjustment(&self, adjustment: InventoryAdjustment) -> DomainResult<()> {
        self.insert_adjustment(adjustment)
    }
}

impl PurchaseRepository for MemoryStore {
    fn insert_purchase_order(&self, order: PurchaseOrder) -> DomainResult<()> {
        self.tables
            .write()
            .unwrap()
            .purchase_orders
            .insert(order.id(), order);
        Ok(())
    }

    fn purchase_order(&self, id: PurchaseOrderId) -> Option<PurchaseOrder> {
        self.tables.read().unwrap().purchase_orders.get(&id).cloned()
    }

    fn update_purchase_order(&self, order: PurchaseOrder) -> DomainResult<()> {
        self.insert_purchase_order(order)
    }

    fn insert_receipt(&self, receipt: PurchaseReceipt) -> DomainResult<()> {
        self.tables.write().unwrap().receipts.push(receipt);
        Ok(())
    }

    fn receipts_for_order(&self, order_id: PurchaseOrderId) -> Vec<PurchaseReceipt> {
        self.tables
            .read()
            .unwrap()
            .receipts
            .iter()
            .filter(|r| r.order_id == order_id)
            .cloned()
            .collect()
    }
}

impl SaleRepository for MemoryStore {
    fn insert_sale(&self, sale: Sale) -> DomainResult<()> {
        self.tables.write().unwrap().sales.insert(sale.id(), sale);
        Ok(())
    }

    fn sale(&self, id: SaleId) -> Option<Sale> {
        self.tables.read().unwrap().sales.get(&id).cloned()
    }

    fn update_sale(&self, sale: Sale) -> DomainResult<()> {
        self.insert_sale(sale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use stockwise_core::DomainError;

    #[test]
    fn failed_unit_of_work_restores_every_table() {
        let store = MemoryStore::new();
        let product = ProductId::new();

        let result: DomainResult<()> = store.run(|| {
            store.upsert_stock(Stock::new(product, None, 10))?;
            Err(DomainError::rule("boom"))
        });

        assert!(result.is_err());
        assert!(store.stock_for(product, None).is_none());
        assert!(store.stocks().is_empty());
    }

    #[test]
    fn successful_unit_of_work_keeps_writes() {
        let store = MemoryStore::new();
        let product = ProductId::new();

        store
            .run(|| store.upsert_stock(Stock::new(product, None, 10)))
            .unwrap();

        assert_eq!(store.stock_for(product, None).unwrap().quantity(), 10);
    }

    #[test]
    fn stock_rows_are_keyed_by_product_and_location() {
        let store = MemoryStore::new();
        let product = ProductId::new();
        let location = Some(LocationId::new());

        store.upsert_stock(Stock::new(product, None, 3)).unwrap();
        store.upsert_stock(Stock::new(product, location, 7)).unwrap();

        assert_eq!(store.stock_for(product, None).unwrap().quantity(), 3);
        assert_eq!(store.stock_for(product, location).unwrap().quantity(), 7);
        assert_eq!(store.stocks().len(), 2);
    }
}
