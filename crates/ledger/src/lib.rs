//! Movement ledger and derived stock projection.
//!
//! The ledger is an **append-only** log of signed quantity changes per
//! product/location. Stock rows are a cached projection over that log,
//! updated reactively by the [`StockProjection`] subscriber: the sum of all
//! movements for a (product, location) pair equals the stock quantity for
//! that pair at all times.

pub mod movement;
pub mod projection;
pub mod stock;

pub use movement::{
    Movement, MovementCreated, MovementLedger, MovementRepository, MovementType, NewMovement,
    ReferenceType,
};
pub use projection::StockProjection;
pub use stock::{Stock, StockCreated, StockRepository, StockUpdated};
