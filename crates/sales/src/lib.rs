//! Sales: confirm/cancel workflow with stock reversal.
//!
//! Confirming a sale validates stock sufficiency for every line before
//! mutating anything, then debits through OUT movements inside one unit of
//! work. Cancelling a confirmed sale appends one compensating IN movement
//! per original OUT.

pub mod sale;

pub use sale::{
    Sale, SaleCancelled, SaleConfirmed, SaleItem, SaleRepository, SaleService, SaleStatus,
};
