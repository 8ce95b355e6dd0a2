//! Stock projection: keeps Stock rows consistent with the movement ledger.
//!
//! Subscribes to [`MovementCreated`] and applies the movement's signed
//! quantity to the (product, location) row, creating it lazily on the first
//! movement for the pair. Runs synchronously inside the publishing command's
//! unit of work; its failure aborts that command, so the ledger and the
//! projection never silently diverge.
//!
//! Contract: after any sequence of successful operations, the sum of all
//! movements for a pair equals `Stock::quantity` for that pair. This handler
//! never touches `reserved_quantity`; reservations belong to transfers.

use std::sync::Arc;

use stockwise_core::{DomainError, DomainResult};
use stockwise_events::EventDispatcher;

use crate::movement::MovementCreated;
use crate::stock::{Stock, StockCreated, StockRepository, StockUpdated};

pub struct StockProjection;

impl StockProjection {
    /// Subscribe the projection to `MovementCreated` on `dispatcher`.
    ///
    /// Registration order matters: the composition root attaches the
    /// projection before any cross-aggregate listeners so downstream
    /// subscribers observe updated stock.
    pub fn attach<S>(dispatcher: &Arc<EventDispatcher>, store: Arc<S>) -> DomainResult<()>
    where
        S: StockRepository + 'static,
    {
        let bus = Arc::clone(dispatcher);
        dispatcher.subscribe(move |event: &MovementCreated| {
            Self::apply(store.as_ref(), &bus, event)
        })
    }

    fn apply<S>(store: &S, bus: &EventDispatcher, event: &MovementCreated) -> DomainResult<()>
    where
        S: StockRepository + ?Sized,
    {
        let movement = &event.movement;

        match store.stock_for(movement.product_id, movement.location_id) {
            None => {
                if movement.quantity < 0 {
                    // No row yet means nothing on hand; an OUT cannot be the
                    // first movement for a pair.
                    return Err(DomainError::insufficient_stock(-movement.quantity, 0));
                }
                let stock = Stock::new(movement.product_id, movement.location_id, movement.quantity);
                store.upsert_stock(stock.clone())?;

                tracing::debug!(
                    product_id = %movement.product_id,
                    quantity = movement.quantity,
                    "stock row created"
                );

                bus.publish(&StockCreated {
                    stock,
                    occurred_at: movement.occurred_at,
                })
            }
            Some(mut stock) => {
                let old_quantity = stock.apply_delta(movement.quantity)?;
                let new_quantity = stock.quantity();
                store.upsert_stock(stock.clone())?;

                tracing::debug!(
                    product_id = %movement.product_id,
                    old_quantity,
                    new_quantity,
                    "stock row updated"
                );

                bus.publish(&StockUpdated {
                    stock,
                    old_quantity,
                    new_quantity,
                    occurred_at: movement.occurred_at,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Mutex, RwLock};

    use chrono::Utc;
    use stockwise_core::{LocationId, ProductId};

    use crate::movement::{
        Movement, MovementLedger, MovementRepository, MovementType, NewMovement, ReferenceType,
    };

    /// Minimal store for exercising the projection without the full engine.
    #[derive(Default)]
    struct TestStore {
        movements: RwLock<Vec<Movement>>,
        stocks: RwLock<HashMap<(ProductId, Option<LocationId>), Stock>>,
    }

    impl MovementRepository for TestStore {
        fn insert_movement(&self, movement: Movement) -> DomainResult<()> {
            self.movements.write().unwrap().push(movement);
            Ok(())
        }

        fn movements_for(
            &self,
            product_id: ProductId,
            location_id: Option<LocationId>,
        ) -> Vec<Movement> {
            self.movements
                .read()
                .unwrap()
                .iter()
                .filter(|m| m.product_id == product_id && m.location_id == location_id)
                .cloned()
                .collect()
        }

        fn movements_by_reference(
            &self,
            reference_type: ReferenceType,
            reference_id: uuid::Uuid,
        ) -> Vec<Movement> {
            self.movements
                .read()
                .unwrap()
                .iter()
                .filter(|m| {
                    m.reference_type == Some(reference_type)
                        && m.reference_id == Some(reference_id)
                })
                .cloned()
                .collect()
        }
    }

    impl StockRepository for TestStore {
        fn stock_for(
            &self,
            product_id: ProductId,
            location_id: Option<LocationId>,
        ) -> Option<Stock> {
            self.stocks
                .read()
                .unwrap()
                .get(&(product_id, location_id))
                .cloned()
        }

        fn upsert_stock(&self, stock: Stock) -> DomainResult<()> {
            self.stocks
                .write()
                .unwrap()
                .insert((stock.product_id(), stock.location_id()), stock);
            Ok(())
        }

        fn stocks(&self) -> Vec<Stock> {
            self.stocks.read().unwrap().values().cloned().collect()
        }
    }

    fn setup() -> (Arc<EventDispatcher>, Arc<TestStore>, MovementLedger<TestStore>) {
        let dispatcher = Arc::new(EventDispatcher::new());
        let store = Arc::new(TestStore::default());
        StockProjection::attach(&dispatcher, Arc::clone(&store)).unwrap();
        let ledger = MovementLedger::new(Arc::clone(&store), Arc::clone(&dispatcher));
        (dispatcher, store, ledger)
    }

    #[test]
    fn first_inbound_movement_creates_the_stock_row() {
        let (_, store, ledger) = setup();
        let product = ProductId::new();
        let location = Some(LocationId::new());

        ledger
            .append(NewMovement::new(
                product,
                10,
                MovementType::In,
                location,
                Utc::now(),
            ))
            .unwrap();

        let stock = store.stock_for(product, location).unwrap();
        assert_eq!(stock.quantity(), 10);
        assert_eq!(stock.reserved_quantity(), 0);
    }

    #[test]
    fn in_then_out_leaves_the_ledger_sum() {
        let (_, store, ledger) = setup();
        let product = ProductId::new();
        let location = Some(LocationId::new());

        ledger
            .append(NewMovement::new(
                product,
                10,
                MovementType::In,
                location,
                Utc::now(),
            ))
            .unwrap();
        ledger
            .append(NewMovement::new(
                product,
                -3,
                MovementType::Out,
                location,
                Utc::now(),
            ))
            .unwrap();

        let stock = store.stock_for(product, location).unwrap();
        assert_eq!(stock.quantity(), 7);

        let sum: i64 = store
            .movements_for(product, location)
            .iter()
            .map(|m| m.quantity)
            .sum();
        assert_eq!(sum, stock.quantity());
    }

    #[test]
    fn overdraw_fails_with_insufficient_stock() {
        let (_, store, ledger) = setup();
        let product = ProductId::new();
        let location = Some(LocationId::new());

        ledger
            .append(NewMovement::new(
                product,
                5,
                MovementType::In,
                location,
                Utc::now(),
            ))
            .unwrap();

        let err = ledger
            .append(NewMovement::new(
                product,
                -8,
                MovementType::Out,
                location,
                Utc::now(),
            ))
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                requested: 8,
                available: 5
            }
        );
        assert_eq!(store.stock_for(product, location).unwrap().quantity(), 5);
    }

    #[test]
    fn outbound_movement_with_no_stock_row_fails() {
        let (_, store, ledger) = setup();
        let product = ProductId::new();

        let err = ledger
            .append(NewMovement::new(
                product,
                -1,
                MovementType::Out,
                None,
                Utc::now(),
            ))
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                requested: 1,
                available: 0
            }
        );
        assert!(store.stock_for(product, None).is_none());
    }

    #[test]
    fn projection_never_touches_reservations() {
        let (_, store, ledger) = setup();
        let product = ProductId::new();
        let location = Some(LocationId::new());

        ledger
            .append(NewMovement::new(
                product,
                10,
                MovementType::In,
                location,
                Utc::now(),
            ))
            .unwrap();

        let mut stock = store.stock_for(product, location).unwrap();
        stock.reserve(4).unwrap();
        store.upsert_stock(stock).unwrap();

        ledger
            .append(NewMovement::new(
                product,
                -2,
                MovementType::Out,
                location,
                Utc::now(),
            ))
            .unwrap();

        let stock = store.stock_for(product, location).unwrap();
        assert_eq!(stock.quantity(), 8);
        assert_eq!(stock.reserved_quantity(), 4);
    }

    #[test]
    fn stock_events_are_published_with_old_and_new_quantities() {
        let (dispatcher, _store, ledger) = setup();
        let updates: Arc<Mutex<Vec<(i64, i64)>>> = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&updates);
        dispatcher
            .subscribe(move |e: &StockUpdated| {
                seen.lock().unwrap().push((e.old_quantity, e.new_quantity));
                Ok(())
            })
            .unwrap();

        let product = ProductId::new();
        ledger
            .append(NewMovement::new(
                product,
                10,
                MovementType::In,
                None,
                Utc::now(),
            ))
            .unwrap();
        ledger
            .append(NewMovement::new(
                product,
                -3,
                MovementType::Out,
                None,
                Utc::now(),
            ))
            .unwrap();

        assert_eq!(*updates.lock().unwrap(), vec![(10, 7)]);
    }
}
