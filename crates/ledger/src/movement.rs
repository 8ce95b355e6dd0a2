use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockwise_core::{DomainError, DomainResult, Entity, LocationId, MovementId, ProductId};
use stockwise_events::{Event, EventDispatcher};

/// Direction of a ledger movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    In,
    Out,
}

impl MovementType {
    /// Validate a signed quantity against this direction.
    ///
    /// Invariant: quantity != 0; IN requires quantity > 0; OUT requires
    /// quantity < 0.
    pub fn check_quantity(self, quantity: i64) -> DomainResult<()> {
        if quantity == 0 {
            return Err(DomainError::invalid_movement("quantity cannot be zero"));
        }
        match self {
            MovementType::In if quantity < 0 => Err(DomainError::invalid_movement(
                "inbound movement requires a positive quantity",
            )),
            MovementType::Out if quantity > 0 => Err(DomainError::invalid_movement(
                "outbound movement requires a negative quantity",
            )),
            _ => Ok(()),
        }
    }
}

/// Aggregate that caused a movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceType {
    Transfer,
    Adjustment,
    Purchase,
    Sale,
}

impl ReferenceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReferenceType::Transfer => "transfer",
            ReferenceType::Adjustment => "adjustment",
            ReferenceType::Purchase => "purchase",
            ReferenceType::Sale => "sale",
        }
    }
}

/// One append-only ledger entry: a signed quantity change for a product at a
/// location.
///
/// Movements are immutable once created. Corrections are compensating
/// entries, never edits; no update or delete operation exists anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub product_id: ProductId,
    /// Signed: positive for IN, negative for OUT.
    pub quantity: i64,
    pub movement_type: MovementType,
    pub location_id: Option<LocationId>,
    /// For transfer IN entries: the location the goods came from.
    pub source_location_id: Option<LocationId>,
    pub reference_type: Option<ReferenceType>,
    pub reference_id: Option<Uuid>,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl Entity for Movement {
    type Id = MovementId;

    fn id(&self) -> MovementId {
        self.id
    }
}

/// Input for [`MovementLedger::append`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovement {
    pub product_id: ProductId,
    pub quantity: i64,
    pub movement_type: MovementType,
    pub location_id: Option<LocationId>,
    pub source_location_id: Option<LocationId>,
    pub reference_type: Option<ReferenceType>,
    pub reference_id: Option<Uuid>,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl NewMovement {
    pub fn new(
        product_id: ProductId,
        quantity: i64,
        movement_type: MovementType,
        location_id: Option<LocationId>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            product_id,
            quantity,
            movement_type,
            location_id,
            source_location_id: None,
            reference_type: None,
            reference_id: None,
            reason: None,
            occurred_at,
        }
    }

    pub fn with_reference(mut self, reference_type: ReferenceType, reference_id: Uuid) -> Self {
        self.reference_type = Some(reference_type);
        self.reference_id = Some(reference_id);
        self
    }

    pub fn with_source(mut self, source_location_id: LocationId) -> Self {
        self.source_location_id = Some(source_location_id);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Event: a movement was appended to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementCreated {
    pub movement: Movement,
}

impl Event for MovementCreated {
    fn event_type(&self) -> &'static str {
        "ledger.movement.created"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.movement.occurred_at
    }
}

/// Persistence consumed by the ledger. The ledger is append-only, so the
/// interface has no update or delete.
pub trait MovementRepository: Send + Sync {
    fn insert_movement(&self, movement: Movement) -> DomainResult<()>;

    /// All movements for a (product, location) pair, in append order.
    fn movements_for(&self, product_id: ProductId, location_id: Option<LocationId>)
    -> Vec<Movement>;

    /// All movements caused by one aggregate, in append order.
    fn movements_by_reference(
        &self,
        reference_type: ReferenceType,
        reference_id: Uuid,
    ) -> Vec<Movement>;
}

/// The append-only movement ledger.
///
/// `append` validates the sign/direction invariant, persists the entry and
/// publishes [`MovementCreated`] synchronously: the stock projection runs on
/// this call stack before `append` returns, and its failure is the caller's
/// failure.
///
/// Callers own the unit-of-work boundary: services call `append` inside
/// [`stockwise_core::UnitOfWork::run`] so a failed multi-entry operation
/// leaves no orphan entries behind.
#[derive(Debug)]
pub struct MovementLedger<S> {
    store: Arc<S>,
    dispatcher: Arc<EventDispatcher>,
}

impl<S> Clone for MovementLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

impl<S> MovementLedger<S>
where
    S: MovementRepository,
{
    pub fn new(store: Arc<S>, dispatcher: Arc<EventDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Append one movement to the ledger.
    ///
    /// Fails with [`DomainError::InvalidMovement`] if the quantity is zero or
    /// does not match the direction. On success the entry is persisted and
    /// `MovementCreated` has been delivered to every subscriber.
    pub fn append(&self, new: NewMovement) -> DomainResult<Movement> {
        new.movement_type.check_quantity(new.quantity)?;

        let movement = Movement {
            id: MovementId::new(),
            product_id: new.product_id,
            quantity: new.quantity,
            movement_type: new.movement_type,
            location_id: new.location_id,
            source_location_id: new.source_location_id,
            reference_type: new.reference_type,
            reference_id: new.reference_id,
            reason: new.reason,
            occurred_at: new.occurred_at,
        };

        self.store.insert_movement(movement.clone())?;

        tracing::debug!(
            movement_id = %movement.id,
            product_id = %movement.product_id,
            quantity = movement.quantity,
            "movement appended"
        );

        self.dispatcher
            .publish(&MovementCreated {
                movement: movement.clone(),
            })?;

        Ok(movement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_quantity_is_rejected_for_both_directions() {
        for direction in [MovementType::In, MovementType::Out] {
            let err = direction.check_quantity(0).unwrap_err();
            assert!(matches!(err, DomainError::InvalidMovement(_)));
        }
    }

    #[test]
    fn direction_must_match_sign() {
        assert!(MovementType::In.check_quantity(10).is_ok());
        assert!(MovementType::Out.check_quantity(-3).is_ok());

        assert!(matches!(
            MovementType::In.check_quantity(-10),
            Err(DomainError::InvalidMovement(_))
        ));
        assert!(matches!(
            MovementType::Out.check_quantity(3),
            Err(DomainError::InvalidMovement(_))
        ));
    }

    #[test]
    fn new_movement_builder_sets_reference_and_source() {
        let product = ProductId::new();
        let source = LocationId::new();
        let reference = Uuid::now_v7();

        let new = NewMovement::new(product, 5, MovementType::In, None, Utc::now())
            .with_reference(ReferenceType::Transfer, reference)
            .with_source(source)
            .with_reason("transfer in");

        assert_eq!(new.reference_type, Some(ReferenceType::Transfer));
        assert_eq!(new.reference_id, Some(reference));
        assert_eq!(new.source_location_id, Some(source));
        assert_eq!(new.reason.as_deref(), Some("transfer in"));
    }

    #[test]
    fn movement_serde_round_trip() {
        let movement = Movement {
            id: MovementId::new(),
            product_id: ProductId::new(),
            quantity: -4,
            movement_type: MovementType::Out,
            location_id: Some(LocationId::new()),
            source_location_id: None,
            reference_type: Some(ReferenceType::Sale),
            reference_id: Some(Uuid::now_v7()),
            reason: Some("sale".to_string()),
            occurred_at: Utc::now(),
        };

        let json = serde_json::to_string(&movement).unwrap();
        let back: Movement = serde_json::from_str(&json).unwrap();
        assert_eq!(movement, back);
    }
}
