use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockwise_core::{DomainError, DomainResult, Entity, LocationId, ProductId, StockId};
use stockwise_events::Event;

/// Cached current quantity + reserved quantity for one (product, location)
/// pair, derived from the movement ledger.
///
/// Invariants, enforced by the mutating methods:
/// - `quantity >= 0` always
/// - `0 <= reserved_quantity <= quantity`
/// - `available = quantity - reserved_quantity`
///
/// Rows are created lazily on the first movement for a pair. `quantity` is
/// mutated only by the stock projection handler; `reserved_quantity` only by
/// transfer operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    id: StockId,
    product_id: ProductId,
    location_id: Option<LocationId>,
    quantity: i64,
    reserved_quantity: i64,
}

impl Entity for Stock {
    type Id = StockId;

    fn id(&self) -> StockId {
        self.id
    }
}

impl Stock {
    /// Create the row for a pair's first movement.
    pub fn new(product_id: ProductId, location_id: Option<LocationId>, quantity: i64) -> Self {
        Self {
            id: StockId::new(),
            product_id,
            location_id,
            quantity,
            reserved_quantity: 0,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn location_id(&self) -> Option<LocationId> {
        self.location_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn reserved_quantity(&self) -> i64 {
        self.reserved_quantity
    }

    /// Quantity not promised to an in-flight transfer.
    pub fn available(&self) -> i64 {
        self.quantity - self.reserved_quantity
    }

    /// Apply a signed movement quantity. Returns the previous quantity.
    ///
    /// Fails with `InsufficientStock` if the delta would drive the quantity
    /// negative; the row is left unchanged.
    pub fn apply_delta(&mut self, delta: i64) -> DomainResult<i64> {
        let old = self.quantity;
        let new = old + delta;
        if new < 0 {
            return Err(DomainError::insufficient_stock(-delta, old));
        }
        self.quantity = new;
        Ok(old)
    }

    /// Place a reservation hold against available stock.
    pub fn reserve(&mut self, quantity: i64) -> DomainResult<()> {
        if quantity <= 0 {
            return Err(DomainError::validation(
                "reservation quantity must be positive",
            ));
        }
        if self.available() < quantity {
            return Err(DomainError::insufficient_stock(quantity, self.available()));
        }
        self.reserved_quantity += quantity;
        Ok(())
    }

    /// Release a previously placed hold.
    ///
    /// Releasing more than is reserved is a bookkeeping bug (a reservation
    /// leak in the opposite direction) and is rejected.
    pub fn release(&mut self, quantity: i64) -> DomainResult<()> {
        if quantity <= 0 {
            return Err(DomainError::validation(
                "release quantity must be positive",
            ));
        }
        if self.reserved_quantity < quantity {
            return Err(DomainError::rule(format!(
                "cannot release {quantity}: only {} reserved",
                self.reserved_quantity
            )));
        }
        self.reserved_quantity -= quantity;
        Ok(())
    }
}

/// Event: a stock row was created by the projection (first movement for the
/// pair).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCreated {
    pub stock: Stock,
    pub occurred_at: DateTime<Utc>,
}

impl Event for StockCreated {
    fn event_type(&self) -> &'static str {
        "ledger.stock.created"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Event: a stock row's quantity changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUpdated {
    pub stock: Stock,
    pub old_quantity: i64,
    pub new_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

impl Event for StockUpdated {
    fn event_type(&self) -> &'static str {
        "ledger.stock.updated"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Persistence consumed by the projection and the transfer/sale/adjustment
/// services.
pub trait StockRepository: Send + Sync {
    fn stock_for(&self, product_id: ProductId, location_id: Option<LocationId>) -> Option<Stock>;

    fn upsert_stock(&self, stock: Stock) -> DomainResult<()>;

    /// All stock rows (diagnostics and invariant checks).
    fn stocks(&self) -> Vec<Stock>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(quantity: i64) -> Stock {
        Stock::new(ProductId::new(), Some(LocationId::new()), quantity)
    }

    #[test]
    fn apply_delta_moves_quantity_and_returns_old_value() {
        let mut s = stock(10);
        assert_eq!(s.apply_delta(-3).unwrap(), 10);
        assert_eq!(s.quantity(), 7);
        assert_eq!(s.apply_delta(5).unwrap(), 7);
        assert_eq!(s.quantity(), 12);
    }

    #[test]
    fn apply_delta_rejects_negative_result_and_leaves_row_unchanged() {
        let mut s = stock(2);
        let err = s.apply_delta(-3).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                requested: 3,
                available: 2
            }
        );
        assert_eq!(s.quantity(), 2);
    }

    #[test]
    fn reserve_is_capped_by_available_not_quantity() {
        let mut s = stock(10);
        s.reserve(6).unwrap();
        assert_eq!(s.reserved_quantity(), 6);
        assert_eq!(s.available(), 4);

        let err = s.reserve(5).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                requested: 5,
                available: 4
            }
        );
        assert_eq!(s.reserved_quantity(), 6);
    }

    #[test]
    fn release_matches_prior_reservations_exactly() {
        let mut s = stock(10);
        s.reserve(4).unwrap();
        s.release(4).unwrap();
        assert_eq!(s.reserved_quantity(), 0);

        assert!(matches!(s.release(1), Err(DomainError::Rule(_))));
    }

    #[test]
    fn reserve_and_release_reject_non_positive_quantities() {
        let mut s = stock(10);
        assert!(matches!(s.reserve(0), Err(DomainError::Validation(_))));
        assert!(matches!(s.release(-1), Err(DomainError::Validation(_))));
    }
}
