//! Synchronous publish/subscribe dispatcher.
//!
//! The dispatcher is an **explicitly constructed instance**, owned by the
//! composition root and handed to the services that publish through it.
//! There is no process-global registry; tests build their own dispatcher and
//! get full isolation without any reset call.
//!
//! ## Delivery semantics
//!
//! - **Exact-type routing**: a subscriber registered for `E` receives only
//!   events of type `E`.
//! - **Registration order**: subscribers of one event type run in the order
//!   they were registered.
//! - **Fail-closed**: the first subscriber error short-circuits delivery and
//!   is returned to the publisher. Handlers are never fire-and-forget; the
//!   publishing command's unit of work sees the failure and rolls back.
//!
//! ## Re-entrancy
//!
//! Handlers may publish secondary events (the stock projection publishes
//! `StockCreated`/`StockUpdated` while handling `MovementCreated`). The
//! subscriber list is cloned out of the lock before invocation, so nested
//! publishes never hold the registry lock.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use stockwise_core::{DomainError, DomainResult};

use crate::event::Event;

type HandlerFn<E> = Box<dyn Fn(&E) -> DomainResult<()> + Send + Sync>;

/// Synchronous, in-process event dispatcher.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: RwLock<HashMap<TypeId, Vec<Arc<dyn Any + Send + Sync>>>>,
}

impl core::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let count = self.handlers.read().map(|m| m.len()).unwrap_or(0);
        f.debug_struct("EventDispatcher")
            .field("event_types", &count)
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for events of type `E`.
    ///
    /// Handlers run synchronously inside `publish`, in registration order.
    /// Returning `Err` aborts delivery and propagates to the publisher.
    pub fn subscribe<E, F>(&self, handler: F) -> DomainResult<()>
    where
        E: Event,
        F: Fn(&E) -> DomainResult<()> + Send + Sync + 'static,
    {
        let boxed: HandlerFn<E> = Box::new(handler);
        let mut map = self
            .handlers
            .write()
            .map_err(|_| DomainError::rule("event dispatcher registry poisoned"))?;
        map.entry(TypeId::of::<E>())
            .or_default()
            .push(Arc::new(boxed));
        Ok(())
    }

    /// Deliver `event` to every subscriber of `E`, in registration order.
    ///
    /// Returns the first handler error, delivering to no further handlers.
    pub fn publish<E: Event>(&self, event: &E) -> DomainResult<()> {
        let handlers: Vec<Arc<dyn Any + Send + Sync>> = {
            let map = self
                .handlers
                .read()
                .map_err(|_| DomainError::rule("event dispatcher registry poisoned"))?;
            match map.get(&TypeId::of::<E>()) {
                Some(list) => list.clone(),
                None => return Ok(()),
            }
        };

        tracing::debug!(
            event_type = event.event_type(),
            subscribers = handlers.len(),
            "publishing event"
        );

        for entry in &handlers {
            let handler = entry
                .downcast_ref::<HandlerFn<E>>()
                .ok_or_else(|| DomainError::rule("event handler registered under wrong type"))?;
            handler(event)?;
        }

        Ok(())
    }
}
