use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockwise_core::{
    DomainError, DomainResult, Entity, LocationId, PartyId, ProductId, SaleId, UnitOfWork,
};
use stockwise_events::{Event, EventDispatcher};
use stockwise_ledger::{
    MovementLedger, MovementRepository, MovementType, NewMovement, ReferenceType, StockRepository,
};

/// Sale status lifecycle.
///
/// DRAFT → CONFIRMED → INVOICED; DRAFT|CONFIRMED → CANCELLED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    Draft,
    Confirmed,
    Invoiced,
    Cancelled,
}

/// Sale line: product, quantity, unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleItem {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
}

/// Aggregate root: Sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    id: SaleId,
    customer_id: PartyId,
    /// Location the goods leave from.
    location_id: Option<LocationId>,
    status: SaleStatus,
    items: Vec<SaleItem>,
    created_at: DateTime<Utc>,
}

impl Entity for Sale {
    type Id = SaleId;

    fn id(&self) -> SaleId {
        self.id
    }
}

impl Sale {
    pub fn new(
        customer_id: PartyId,
        location_id: Option<LocationId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SaleId::new(),
            customer_id,
            location_id,
            status: SaleStatus::Draft,
            items: Vec::new(),
            created_at,
        }
    }

    pub fn customer_id(&self) -> PartyId {
        self.customer_id
    }

    pub fn location_id(&self) -> Option<LocationId> {
        self.location_id
    }

    pub fn status(&self) -> SaleStatus {
        self.status
    }

    pub fn items(&self) -> &[SaleItem] {
        &self.items
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Add a line. Only DRAFT sales are editable.
    pub fn add_item(
        &mut self,
        product_id: ProductId,
        quantity: i64,
        unit_price: u64,
    ) -> DomainResult<u32> {
        if self.status != SaleStatus::Draft {
            return Err(DomainError::rule(
                "cannot modify sale once it is confirmed",
            ));
        }
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        let line_no = (self.items.len() as u32) + 1;
        self.items.push(SaleItem {
            line_no,
            product_id,
            quantity,
            unit_price,
        });
        Ok(line_no)
    }

    pub(crate) fn mark_confirmed(&mut self) -> DomainResult<()> {
        if self.status != SaleStatus::Draft {
            return Err(DomainError::rule("only draft sales can be confirmed"));
        }
        if self.items.is_empty() {
            return Err(DomainError::validation("cannot confirm sale without items"));
        }
        self.status = SaleStatus::Confirmed;
        Ok(())
    }

    pub(crate) fn mark_invoiced(&mut self) -> DomainResult<()> {
        if self.status != SaleStatus::Confirmed {
            return Err(DomainError::rule("only confirmed sales can be invoiced"));
        }
        self.status = SaleStatus::Invoiced;
        Ok(())
    }

    /// Cancel. Returns whether the sale was confirmed (and therefore needs
    /// compensating IN movements).
    pub(crate) fn mark_cancelled(&mut self) -> DomainResult<bool> {
        match self.status {
            SaleStatus::Draft => {
                self.status = SaleStatus::Cancelled;
                Ok(false)
            }
            SaleStatus::Confirmed => {
                self.status = SaleStatus::Cancelled;
                Ok(true)
            }
            SaleStatus::Invoiced => {
                Err(DomainError::rule("invoiced sales cannot be cancelled"))
            }
            SaleStatus::Cancelled => Err(DomainError::rule("sale is already cancelled")),
        }
    }
}

/// Event: sale confirmed; the OUT movements have been appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleConfirmed {
    pub sale_id: SaleId,
    pub occurred_at: DateTime<Utc>,
}

impl Event for SaleConfirmed {
    fn event_type(&self) -> &'static str {
        "sales.sale.confirmed"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Event: sale cancelled. `was_confirmed` tells subscribers whether
/// compensating IN movements were appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleCancelled {
    pub sale_id: SaleId,
    pub was_confirmed: bool,
    pub occurred_at: DateTime<Utc>,
}

impl Event for SaleCancelled {
    fn event_type(&self) -> &'static str {
        "sales.sale.cancelled"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Persistence consumed by the sale service.
pub trait SaleRepository: Send + Sync {
    fn insert_sale(&self, sale: Sale) -> DomainResult<()>;
    fn sale(&self, id: SaleId) -> Option<Sale>;
    fn update_sale(&self, sale: Sale) -> DomainResult<()>;
}

/// Command handlers for the sale lifecycle.
#[derive(Debug)]
pub struct SaleService<S> {
    store: Arc<S>,
    dispatcher: Arc<EventDispatcher>,
    ledger: MovementLedger<S>,
}

impl<S> SaleService<S>
where
    S: SaleRepository + StockRepository + MovementRepository + UnitOfWork + 'static,
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
        customer_id: PartyId,
        location_id: Option<LocationId>,
    ) -> DomainResult<Sale> {
        self.store.run(|| {
            let sale = Sale::new(customer_id, location_id, Utc::now());
            self.store.insert_sale(sale.clone())?;
            Ok(sale)
        })
    }

    pub fn add_item(
        &self,
        sale_id: SaleId,
        product_id: ProductId,
        quantity: i64,
        unit_price: u64,
    ) -> DomainResult<u32> {
        self.store.run(|| {
            let mut sale = self.load(sale_id)?;
            let line_no = sale.add_item(product_id, quantity, unit_price)?;
            self.store.update_sale(sale)?;
            Ok(line_no)
        })
    }

    /// Confirm: validate stock sufficiency for every item, then debit.
    ///
    /// The whole check-then-debit sequence runs inside one unit of work, so
    /// two concurrent confirmations can never both pass validation against
    /// stale stock and overdraw. A failed validation leaves the sale DRAFT
    /// with no movement appended.
    pub fn confirm(&self, sale_id: SaleId) -> DomainResult<()> {
        self.store.run(|| {
            let mut sale = self.load(sale_id)?;
            sale.mark_confirmed()?;

            let location = sale.location_id();

            // Validation pass: total demand per product, before mutating
            // anything. Repeated lines for one product must be covered
            // together.
            let mut required: HashMap<ProductId, i64> = HashMap::new();
            for item in sale.items() {
                *required.entry(item.product_id).or_insert(0) += item.quantity;
            }
            for (product_id, quantity) in required {
                let available = self
                    .store
                    .stock_for(product_id, location)
                    .map(|s| s.available())
                    .unwrap_or(0);
                if available < quantity {
                    return Err(DomainError::insufficient_stock(quantity, available));
                }
            }

            let now = Utc::now();
            for item in sale.items() {
                self.ledger.append(
                    NewMovement::new(
                        item.product_id,
                        -item.quantity,
                        MovementType::Out,
                        location,
                        now,
                    )
                    .with_reference(ReferenceType::Sale, sale_id.into())
                    .with_reason("sale"),
                )?;
            }

            self.store.update_sale(sale)?;

            tracing::info!(sale_id = %sale_id, "sale confirmed");

            self.dispatcher.publish(&SaleConfirmed {
                sale_id,
                occurred_at: now,
            })
        })
    }

    pub fn invoice(&self, sale_id: SaleId) -> DomainResult<()> {
        self.store.run(|| {
            let mut sale = self.load(sale_id)?;
            sale.mark_invoiced()?;
            self.store.update_sale(sale)?;

            tracing::info!(sale_id = %sale_id, "sale invoiced");

            Ok(())
        })
    }

    /// Cancel: a confirmed sale gets one compensating IN movement per
    /// original OUT, restoring stock to its pre-confirm value; a draft sale
    /// has no inventory effect.
    pub fn cancel(&self, sale_id: SaleId) -> DomainResult<()> {
        self.store.run(|| {
            let mut sale = self.load(sale_id)?;
            let was_confirmed = sale.mark_cancelled()?;

            let now = Utc::now();
            if was_confirmed {
                for item in sale.items() {
                    self.ledger.append(
                        NewMovement::new(
                            item.product_id,
                            item.quantity,
                            MovementType::In,
                            sale.location_id(),
                            now,
                        )
                        .with_reference(ReferenceType::Sale, sale_id.into())
                        .with_reason("sale cancelled"),
                    )?;
                }
            }

            self.store.update_sale(sale)?;

            tracing::info!(sale_id = %sale_id, was_confirmed, "sale cancelled");

            self.dispatcher.publish(&SaleCancelled {
                sale_id,
                was_confirmed,
                occurred_at: now,
            })
        })
    }

    pub fn get(&self, sale_id: SaleId) -> Option<Sale> {
        self.store.sale(sale_id)
    }

    fn load(&self, sale_id: SaleId) -> DomainResult<Sale> {
        self.store
            .sale(sale_id)
            .ok_or_else(|| DomainError::not_found("sale"))
    }
}
