use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use parking_lot::Mutex;
use tracing::{debug, error};

use super::core::{panic_message, RoutingContext};

/// Hook run once when its event fires.
pub type Callback = Box<dyn FnOnce(&RoutingContext) + Send>;

/// Handle returned when registering a callback, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallbackId(u64);

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    fired: bool,
    callbacks: BTreeMap<u64, Callback>,
}

/// Ordered, remove-by-id registry for one response event.
///
/// Ids grow monotonically, so iterating the map runs callbacks in
/// registration order no matter which route added them.
pub(crate) struct CallbackRegistry {
    event: &'static str,
    state: Mutex<RegistryState>,
}

impl CallbackRegistry {
    pub(crate) fn new(event: &'static str) -> Self {
        Self {
            event,
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub(crate) fn add(&self, callback: Callback) -> CallbackId {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        if state.fired {
            debug!(event = self.event, id, "Callback registered after its event fired; it will not run");
        } else {
            state.callbacks.insert(id, callback);
        }
        CallbackId(id)
    }

    /// False if the id is unknown, already removed, or the event has fired.
    pub(crate) fn remove(&self, id: CallbackId) -> bool {
        self.state.lock().callbacks.remove(&id.0).is_some()
    }

    /// Run every registered callback once, in registration order.
    ///
    /// Callbacks run without the registry lock held, so they may register or
    /// remove other callbacks. A panicking callback is logged and skipped.
    pub(crate) fn fire(&self, ctx: &RoutingContext) {
        let callbacks = {
            let mut state = self.state.lock();
            if state.fired {
                return;
            }
            state.fired = true;
            std::mem::take(&mut state.callbacks)
        };

        for (id, callback) in callbacks {
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| callback(ctx))) {
                error!(
                    request_id = %ctx.request_id(),
                    event = self.event,
                    id,
                    panic_message = %panic_message(panic.as_ref()),
                    "Response callback panicked"
                );
            }
        }
    }

    /// Drop every pending callback without running it.
    pub(crate) fn clear(&self) {
        let mut state = self.state.lock();
        state.fired = true;
        state.callbacks.clear();
    }

    /// Drop every pending callback but keep accepting new ones.
    pub(crate) fn reset(&self) {
        let mut state = self.state.lock();
        if !state.callbacks.is_empty() {
            debug!(
                event = self.event,
                dropped = state.callbacks.len(),
                "Pending callbacks dropped"
            );
        }
        state.callbacks.clear();
    }
}
