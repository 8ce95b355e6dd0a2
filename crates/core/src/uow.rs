//! Unit-of-work contract: all-or-nothing command execution.

use crate::error::DomainResult;

/// A storage-side unit of work.
///
/// Every stock-mutating command runs to completion inside one call to
/// [`UnitOfWork::run`]. The implementation must guarantee:
///
/// - **Atomicity**: if the closure returns `Err`, every write made inside it
///   is rolled back. No partial ledger entries survive a failed multi-item
///   operation.
/// - **Serialization**: read-compute-write sequences on the same stock row
///   never interleave with another command's. The in-memory engine holds a
///   store-wide command lock; a SQL engine would use row-level locks
///   (`SELECT ... FOR UPDATE`) at the same seam.
///
/// Event handlers run synchronously on the caller's stack, inside the same
/// unit of work, so a failing handler aborts the command that published the
/// event.
pub trait UnitOfWork {
    fn run<T>(&self, work: impl FnOnce() -> DomainResult<T>) -> DomainResult<T>;
}
