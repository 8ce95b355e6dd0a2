//! `stockwise-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod uow;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{
    AdjustmentId, LocationId, MovementId, PartyId, ProductId, PurchaseOrderId, ReceiptId, SaleId,
    StockId, TransferId,
};
pub use uow::UnitOfWork;
