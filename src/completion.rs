//! Process-wide completion callback registration.
//!
//! At most one `(callback, context)` pair is registered at a time. Clearing it
//! requires the context it was registered with, so one registrant cannot
//! silently revoke another's callback.

use std::any::Any;
use std::sync::{Arc, Mutex};

use log::debug;

use crate::error::{CompletionError, LockResultExt};

/// Opaque registrant data handed back to the callback.
pub type CompletionContext = Arc<dyn Any + Send + Sync>;

/// Callback invoked with the context it was registered with.
pub type CompletionFn = Arc<dyn Fn(Option<&CompletionContext>) + Send + Sync>;

#[derive(Default)]
struct Registration {
    callback: Option<CompletionFn>,
    context: Option<CompletionContext>,
}

/// Holder of the single completion callback.
#[derive(Default)]
pub struct CompletionSlot {
    registration: Mutex<Registration>,
}

fn same_context(a: Option<&CompletionContext>, b: Option<&CompletionContext>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

impl CompletionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install, replace or clear the callback.
    ///
    /// A `None` callback clears the registration and is only accepted when
    /// `context` is the registered context (both `None` counts as a match).
    /// Installing a callback always replaces the current pair.
    pub fn set(
        &self,
        callback: Option<CompletionFn>,
        context: Option<CompletionContext>,
    ) -> Result<(), CompletionError> {
        let mut registration = self.registration.lock().recover_poison("CompletionSlot::set");

        if callback.is_none() && !same_context(registration.context.as_ref(), context.as_ref()) {
            debug!(
                target: "yomiage::completion",
                "Rejected clear of completion callback from a different registrant"
            );
            return Err(CompletionError::ContextMismatch);
        }

        *registration = match callback {
            Some(callback) => Registration {
                callback: Some(callback),
                context,
            },
            None => Registration::default(),
        };
        Ok(())
    }

    /// Whether a callback is currently registered.
    pub fn is_registered(&self) -> bool {
        self.registration
            .lock()
            .recover_poison("CompletionSlot::is_registered")
            .callback
            .is_some()
    }

    /// Run the registered callback, if any. Returns whether one ran.
    pub fn invoke(&self) -> bool {
        let (callback, context) = {
            let registration = self
                .registration
                .lock()
                .recover_poison("CompletionSlot::invoke");
            (registration.callback.clone(), registration.context.clone())
        };

        // Outside the lock: the callback may re-register.
        match callback {
            Some(callback) => {
                callback(context.as_ref());
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_callback() -> (CompletionFn, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let callback: CompletionFn = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (callback, calls)
    }

    fn context(tag: &'static str) -> CompletionContext {
        Arc::new(tag)
    }

    #[test]
    fn clear_with_foreign_context_is_rejected() {
        let slot = CompletionSlot::new();
        let (cb, calls) = counting_callback();
        let ctx1 = context("ctx1");
        let ctx2 = context("ctx2");

        slot.set(Some(cb), Some(Arc::clone(&ctx1))).unwrap();
        let result = slot.set(None, Some(ctx2));

        assert_eq!(result, Err(CompletionError::ContextMismatch));
        assert!(slot.is_registered(), "original registration remains");
        assert!(slot.invoke());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_with_matching_context_succeeds() {
        let slot = CompletionSlot::new();
        let (cb, _) = counting_callback();
        let ctx1 = context("ctx1");

        slot.set(Some(cb), Some(Arc::clone(&ctx1))).unwrap();
        slot.set(None, Some(ctx1)).unwrap();

        assert!(!slot.is_registered());
        assert!(!slot.invoke());
    }

    #[test]
    fn equal_value_in_a_different_context_is_not_a_match() {
        let slot = CompletionSlot::new();
        let (cb, _) = counting_callback();

        slot.set(Some(cb), Some(context("same"))).unwrap();

        assert_eq!(
            slot.set(None, Some(context("same"))),
            Err(CompletionError::ContextMismatch)
        );
    }

    #[test]
    fn context_free_registration_is_cleared_without_context() {
        let slot = CompletionSlot::new();
        let (cb, _) = counting_callback();

        slot.set(Some(cb), None).unwrap();
        assert_eq!(
            slot.set(None, Some(context("other"))),
            Err(CompletionError::ContextMismatch)
        );
        slot.set(None, None).unwrap();

        assert!(!slot.is_registered());
    }

    #[test]
    fn installing_replaces_the_previous_pair() {
        let slot = CompletionSlot::new();
        let (first, first_calls) = counting_callback();
        let (second, second_calls) = counting_callback();

        slot.set(Some(first), Some(context("a"))).unwrap();
        slot.set(Some(second), Some(context("b"))).unwrap();
        slot.invoke();

        assert_eq!(first_calls.load(Ordering::SeqCst), 0);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_receives_its_context() {
        let slot = CompletionSlot::new();
        let seen = Arc::new(Mutex::new(None::<&'static str>));
        let sink = Arc::clone(&seen);
        let callback: CompletionFn = Arc::new(move |ctx| {
            let tag = ctx.and_then(|ctx| ctx.downcast_ref::<&'static str>()).copied();
            *sink.lock().unwrap() = tag;
        });

        slot.set(Some(callback), Some(context("widget-a"))).unwrap();
        slot.invoke();

        assert_eq!(*seen.lock().unwrap(), Some("widget-a"));
    }
}
