//! Inventory coordination: stock transfers and inventory adjustments.
//!
//! Both state machines mutate stock only through the movement ledger (and,
//! for transfers, the reservation fields they own). Business rules live on
//! the aggregates as pure transition methods; the services orchestrate
//! persistence, ledger appends and event publication around them.

pub mod adjustment;
pub mod transfer;

pub use adjustment::{
    AdjustmentConfirmed, AdjustmentItem, AdjustmentRepository, AdjustmentService,
    AdjustmentStatus, InventoryAdjustment,
};
pub use transfer::{
    StockTransfer, StockTransferItem, TransferCancelled, TransferConfirmed, TransferReceived,
    TransferRepository, TransferService, TransferStatus,
};
