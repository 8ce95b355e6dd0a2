//! Synchronous in-process domain events.
//!
//! Ledger writes, projection updates and cross-aggregate reactions are
//! connected by the [`EventDispatcher`]: publishing an event invokes every
//! subscriber on the same call stack, and the first subscriber error aborts
//! the publishing command.

pub mod dispatcher;
pub mod event;

pub use dispatcher::EventDispatcher;
pub use event::Event;
