//! Purchasing: purchase orders and the receiving workflow.
//!
//! Receipts are append-only receiving events against order lines. The order
//! tracks `quantity_pending = quantity_ordered − quantity_received` per line
//! and recomputes its status after every receipt. The IN movements for
//! received goods are created by [`ReceiptStockHandler`], a dispatcher
//! subscriber, not by the order itself.

pub mod order;
pub mod receiving;

pub use order::{
    PurchaseOrder, PurchaseOrderItem, PurchaseOrderReceived, PurchaseOrderStatus, PurchaseReceipt,
    PurchaseReceiptItem, PurchaseRepository,
};
pub use receiving::{PurchasingService, ReceiptStockHandler, ReceiveLine};
