use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockwise_core::{
    AdjustmentId, DomainError, DomainResult, Entity, LocationId, ProductId, UnitOfWork,
};
use stockwise_events::{Event, EventDispatcher};
use stockwise_ledger::{
    MovementLedger, MovementRepository, MovementType, NewMovement, ReferenceType, StockRepository,
};

/// Inventory adjustment status lifecycle.
///
/// DRAFT → CONFIRMED (terminal) or DRAFT → CANCELLED (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentStatus {
    Draft,
    Confirmed,
    Cancelled,
}

/// One counted line: what the system expected vs. what was found.
///
/// `expected_quantity` is a snapshot of the stock quantity at the moment the
/// item was added to the count sheet. It is deliberately not re-read at
/// confirm time; the correcting movement records the drift between the count
/// and whatever the ledger says now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentItem {
    pub line_no: u32,
    pub product_id: ProductId,
    pub expected_quantity: i64,
    pub actual_quantity: i64,
}

impl AdjustmentItem {
    /// Signed correction: actual − expected. Derived, never stored.
    pub fn difference(&self) -> i64 {
        self.actual_quantity - self.expected_quantity
    }
}

/// Reconciles counted vs. expected quantity at one location.
///
/// The adjustment never writes stock directly: confirming emits one
/// correcting ledger entry per non-zero-difference item and lets the
/// projection do the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAdjustment {
    id: AdjustmentId,
    location_id: Option<LocationId>,
    status: AdjustmentStatus,
    items: Vec<AdjustmentItem>,
    created_at: DateTime<Utc>,
}

impl Entity for InventoryAdjustment {
    type Id = AdjustmentId;

    fn id(&self) -> AdjustmentId {
        self.id
    }
}

impl InventoryAdjustment {
    pub fn new(location_id: Option<LocationId>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: AdjustmentId::new(),
            location_id,
            status: AdjustmentStatus::Draft,
            items: Vec::new(),
            created_at,
        }
    }

    pub fn location_id(&self) -> Option<LocationId> {
        self.location_id
    }

    pub fn status(&self) -> AdjustmentStatus {
        self.status
    }

    pub fn items(&self) -> &[AdjustmentItem] {
        &self.items
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Add a counted line. Only DRAFT adjustments are editable.
    pub fn add_item(
        &mut self,
        product_id: ProductId,
        expected_quantity: i64,
        actual_quantity: i64,
    ) -> DomainResult<u32> {
        if self.status != AdjustmentStatus::Draft {
            return Err(DomainError::rule(
                "cannot modify adjustment once it is confirmed or cancelled",
            ));
        }
        if actual_quantity < 0 {
            return Err(DomainError::validation(
                "counted quantity cannot be negative",
            ));
        }

        let line_no = (self.items.len() as u32) + 1;
        self.items.push(AdjustmentItem {
            line_no,
            product_id,
            expected_quantity,
            actual_quantity,
        });
        Ok(line_no)
    }

    pub(crate) fn mark_confirmed(&mut self) -> DomainResult<()> {
        if self.status != AdjustmentStatus::Draft {
            return Err(DomainError::rule(
                "only draft adjustments can be confirmed",
            ));
        }
        self.status = AdjustmentStatus::Confirmed;
        Ok(())
    }

    /// Cancel. Only DRAFT may cancel; a draft has had no stock effect, so
    /// no compensating movements are needed.
    pub(crate) fn mark_cancelled(&mut self) -> DomainResult<()> {
        if self.status != AdjustmentStatus::Draft {
            return Err(DomainError::rule(
                "only draft adjustments can be cancelled",
            ));
        }
        self.status = AdjustmentStatus::Cancelled;
        Ok(())
    }
}

/// Event: adjustment confirmed; correcting movements have been appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentConfirmed {
    pub adjustment_id: AdjustmentId,
    /// Items whose difference was non-zero (zero-diff items are skipped).
    pub items_adjusted: u32,
    pub occurred_at: DateTime<Utc>,
}

impl Event for AdjustmentConfirmed {
    fn event_type(&self) -> &'static str {
        "inventory.adjustment.confirmed"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Persistence consumed by the adjustment service.
pub trait AdjustmentRepository: Send + Sync {
    fn insert_adjustment(&self, adjustment: InventoryAdjustment) -> DomainResult<()>;
    fn adjustment(&self, id: AdjustmentId) -> Option<InventoryAdjustment>;
    fn update_adjustment(&self, adjustment: InventoryAdjustment) -> DomainResult<()>;
}

/// Command handlers for the adjustment state machine.
#[derive(Debug)]
pub struct AdjustmentService<S> {
    store: Arc<S>,
    dispatcher: Arc<EventDispatcher>,
    ledger: MovementLedger<S>,
}

impl<S> AdjustmentService<S>
where
    S: AdjustmentRepository + StockRepository + MovementRepository + UnitOfWork + 'static,
{
    pub fn new(store: Arc<S>, dispatcher: Arc<EventDispatcher>) -> Self {
        let ledger = MovementLedger::new(Arc::clone(&store), Arc::clone(&dispatcher));
        Self {
            store,
            dispatcher,
            ledger,
        }
    }

    pub fn create(&self, location_id: Option<LocationId>) -> DomainResult<InventoryAdjustment> {
        self.store.run(|| {
            let adjustment = InventoryAdjustment::new(location_id, Utc::now());
            self.store.insert_adjustment(adjustment.clone())?;
            Ok(adjustment)
        })
    }

    /// Add a counted line. The expected quantity is snapshotted from the
    /// current stock row for (product, adjustment location), or zero if the
    /// pair has no row yet.
    pub fn add_item(
        &self,
        adjustment_id: AdjustmentId,
        product_id: ProductId,
        actual_quantity: i64,
    ) -> DomainResult<u32> {
        self.store.run(|| {
            let mut adjustment = self.load(adjustment_id)?;

            let expected_quantity = self
                .store
                .stock_for(product_id, adjustment.location_id())
                .map(|s| s.quantity())
                .unwrap_or(0);

            let line_no = adjustment.add_item(product_id, expected_quantity, actual_quantity)?;
            self.store.update_adjustment(adjustment)?;
            Ok(line_no)
        })
    }

    /// Confirm: emit one correcting movement per item with a non-zero
    /// difference (IN for surplus, OUT for shortage), tagged
    /// `reference_type = adjustment`.
    pub fn confirm(&self, adjustment_id: AdjustmentId) -> DomainResult<u32> {
        self.store.run(|| {
            let mut adjustment = self.load(adjustment_id)?;
            adjustment.mark_confirmed()?;

            let now = Utc::now();
            let mut items_adjusted = 0u32;

            for item in adjustment.items() {
                let difference = item.difference();
                if difference == 0 {
                    continue;
                }

                let movement_type = if difference > 0 {
                    MovementType::In
                } else {
                    MovementType::Out
                };

                self.ledger.append(
                    NewMovement::new(
                        item.product_id,
                        difference,
                        movement_type,
                        adjustment.location_id(),
                        now,
                    )
                    .with_reference(ReferenceType::Adjustment, adjustment_id.into())
                    .with_reason("inventory adjustment"),
                )?;

                items_adjusted += 1;
            }

            self.store.update_adjustment(adjustment)?;

            tracing::info!(adjustment_id = %adjustment_id, items_adjusted, "adjustment confirmed");

            self.dispatcher.publish(&AdjustmentConfirmed {
                adjustment_id,
                items_adjusted,
                occurred_at: now,
            })?;

            Ok(items_adjusted)
        })
    }

    pub fn cancel(&self, adjustment_id: AdjustmentId) -> DomainResult<()> {
        self.store.run(|| {
            let mut adjustment = self.load(adjustment_id)?;
            adjustment.mark_cancelled()?;
            self.store.update_adjustment(adjustment)?;

            tracing::info!(adjustment_id = %adjustment_id, "adjustment cancelled");

            Ok(())
        })
    }

    pub fn get(&self, adjustment_id: AdjustmentId) -> Option<InventoryAdjustment> {
        self.store.adjustment(adjustment_id)
    }

    fn load(&self, adjustment_id: AdjustmentId) -> DomainResult<InventoryAdjustment> {
        self.store
            .adjustment(adjustment_id)
            .ok_or_else(|| DomainError::not_found("inventory adjustment"))
    }
}
