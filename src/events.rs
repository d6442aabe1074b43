//! Field-scoped events hosts can observe and cancel.
//!
//! A cancelable dispatch carries a default action. Listeners run first; if
//! none calls [`FieldEvent::prevent_default`] the action runs immediately.
//! Otherwise the dispatch stays parked until a [`RetryHandle`] re-runs the
//! listeners, and the action runs at most once over the whole dispatch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use serde_json::Value;

use crate::error::FormResult;
use crate::form::{read_lock, write_lock};
use crate::id::FieldId;

pub type FieldEventListener = Arc<dyn Fn(&mut FieldEvent) + Send + Sync>;
type DefaultAction = Box<dyn FnOnce() + Send + Sync>;

static DISPATCH_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ListenerOptions {
    /// Drop the listener after its first invocation.
    pub once: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DispatchOutcome {
    /// No listener prevented the default; the action ran.
    Proceeded,
    /// Prevented and nobody kept the retry handle. The action is dropped.
    Cancelled,
    /// Prevented while a retry handle is still held somewhere.
    Deferred,
}

pub struct FieldEvent {
    event_type: String,
    field_id: FieldId,
    detail: Value,
    cancelable: bool,
    default_prevented: bool,
    retry: Option<RetryHandle>,
}

impl FieldEvent {
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn field_id(&self) -> &FieldId {
        &self.field_id
    }

    pub fn detail(&self) -> &Value {
        &self.detail
    }

    pub fn cancelable(&self) -> bool {
        self.cancelable
    }

    /// No-op on non-cancelable events, like the DOM.
    pub fn prevent_default(&mut self) {
        if self.cancelable {
            self.default_prevented = true;
        }
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Continuation for a prevented dispatch. Clone it to retry later.
    pub fn retry_handle(&self) -> Option<RetryHandle> {
        self.retry.clone()
    }
}

impl std::fmt::Debug for FieldEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldEvent")
            .field("event_type", &self.event_type)
            .field("field_id", &self.field_id)
            .field("detail", &self.detail)
            .field("default_prevented", &self.default_prevented)
            .finish()
    }
}

#[derive(Clone)]
pub struct RetryHandle {
    bus: Weak<RwLock<BusState>>,
    dispatch: u64,
    cycle: u64,
    token: Arc<()>,
}

impl RetryHandle {
    /// Re-runs the listeners of a parked dispatch. Returns `false` when the
    /// handle is stale: the dispatch already finished or another retry for
    /// this cycle was accepted first. A retry requested while the listeners
    /// are still running is queued and runs once they return.
    pub fn retry(&self) -> bool {
        let Some(state) = self.bus.upgrade() else {
            return false;
        };
        let run_now = {
            let Ok(mut bus) = state.write() else {
                return false;
            };
            let Some(pending) = bus.pending.get_mut(&self.dispatch) else {
                return false;
            };
            if pending.cycle != self.cycle || pending.retry_requested {
                return false;
            }
            pending.retry_requested = true;
            !pending.running
        };
        tracing::debug!(dispatch = self.dispatch, cycle = self.cycle, "field event retry");
        if run_now {
            let bus = FieldEventBus { state };
            if let Err(error) = bus.drive(self.dispatch) {
                tracing::error!(%error, "field event retry failed");
                return false;
            }
        }
        true
    }
}

impl std::fmt::Debug for RetryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryHandle")
            .field("dispatch", &self.dispatch)
            .field("cycle", &self.cycle)
            .finish()
    }
}

struct ListenerEntry {
    listener: FieldEventListener,
    once: bool,
}

struct PendingDispatch {
    event_type: String,
    field_id: FieldId,
    detail: Value,
    action: Option<DefaultAction>,
    cycle: u64,
    running: bool,
    retry_requested: bool,
}

#[derive(Default)]
struct BusState {
    listeners: HashMap<(String, FieldId), Vec<ListenerEntry>>,
    pending: HashMap<u64, PendingDispatch>,
}

#[derive(Clone, Default)]
pub struct FieldEventBus {
    state: Arc<RwLock<BusState>>,
}

impl FieldEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(
        &self,
        event_type: &str,
        field_id: FieldId,
        listener: FieldEventListener,
        options: ListenerOptions,
    ) -> FormResult<()> {
        let mut state = write_lock(&self.state, "adding field event listener")?;
        let listeners = state
            .listeners
            .entry((event_type.to_string(), field_id))
            .or_default();
        if listeners
            .iter()
            .any(|entry| Arc::ptr_eq(&entry.listener, &listener))
        {
            return Ok(());
        }
        listeners.push(ListenerEntry {
            listener,
            once: options.once,
        });
        Ok(())
    }

    /// Removes the exact listener previously added (compared by pointer).
    pub fn remove_listener(
        &self,
        event_type: &str,
        field_id: &FieldId,
        listener: &FieldEventListener,
    ) -> FormResult<bool> {
        let mut state = write_lock(&self.state, "removing field event listener")?;
        let key = (event_type.to_string(), field_id.clone());
        let Some(listeners) = state.listeners.get_mut(&key) else {
            return Ok(false);
        };
        let before = listeners.len();
        listeners.retain(|entry| !Arc::ptr_eq(&entry.listener, listener));
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            state.listeners.remove(&key);
        }
        Ok(removed)
    }

    pub fn listener_count(&self, event_type: &str, field_id: &FieldId) -> FormResult<usize> {
        Ok(read_lock(&self.state, "counting field event listeners")?
            .listeners
            .get(&(event_type.to_string(), field_id.clone()))
            .map_or(0, Vec::len))
    }

    /// Notification without a default action. Returns `false` if a listener
    /// called `prevent_default`.
    pub fn dispatch(&self, event_type: &str, field_id: &FieldId, detail: Value) -> FormResult<bool> {
        let listeners = self.take_listeners(event_type, field_id)?;
        let mut event = FieldEvent {
            event_type: event_type.to_string(),
            field_id: field_id.clone(),
            detail,
            cancelable: true,
            default_prevented: false,
            retry: None,
        };
        for listener in listeners {
            listener(&mut event);
        }
        tracing::debug!(
            event = event_type,
            field = %field_id,
            prevented = event.default_prevented,
            "field event dispatched"
        );
        Ok(!event.default_prevented)
    }

    /// Dispatch with a default action that listeners may suspend.
    pub fn dispatch_cancelable<F>(
        &self,
        event_type: &str,
        field_id: &FieldId,
        detail: Value,
        default_action: F,
    ) -> FormResult<DispatchOutcome>
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        let dispatch = DISPATCH_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst);
        write_lock(&self.state, "parking cancelable field event")?
            .pending
            .insert(
                dispatch,
                PendingDispatch {
                    event_type: event_type.to_string(),
                    field_id: field_id.clone(),
                    detail,
                    action: Some(Box::new(default_action)),
                    cycle: 0,
                    running: false,
                    retry_requested: true,
                },
            );
        self.drive(dispatch)
    }

    /// Dispatches currently parked, waiting for a retry.
    pub fn pending_count(&self) -> FormResult<usize> {
        Ok(read_lock(&self.state, "counting pending field events")?
            .pending
            .len())
    }

    /// Drops the parked dispatches of one field. Their retry handles go
    /// stale and the default actions never run.
    pub fn discard_pending(&self, field_id: &FieldId) -> FormResult<usize> {
        let mut state = write_lock(&self.state, "discarding parked field events")?;
        let before = state.pending.len();
        state.pending.retain(|_, pending| &pending.field_id != field_id);
        let discarded = before - state.pending.len();
        if discarded > 0 {
            tracing::debug!(field = %field_id, discarded, "parked field events discarded");
        }
        Ok(discarded)
    }

    /// Drops every parked dispatch.
    pub fn discard_all_pending(&self) -> FormResult<usize> {
        let mut state = write_lock(&self.state, "discarding all parked field events")?;
        let discarded = state.pending.len();
        state.pending.clear();
        Ok(discarded)
    }

    fn drive(&self, dispatch: u64) -> FormResult<DispatchOutcome> {
        loop {
            let (mut event, token) = {
                let mut state = write_lock(&self.state, "starting field event cycle")?;
                let Some(pending) = state.pending.get_mut(&dispatch) else {
                    return Ok(DispatchOutcome::Cancelled);
                };
                pending.cycle += 1;
                pending.running = true;
                pending.retry_requested = false;
                let token = Arc::new(());
                let event = FieldEvent {
                    event_type: pending.event_type.clone(),
                    field_id: pending.field_id.clone(),
                    detail: pending.detail.clone(),
                    cancelable: true,
                    default_prevented: false,
                    retry: Some(RetryHandle {
                        bus: Arc::downgrade(&self.state),
                        dispatch,
                        cycle: pending.cycle,
                        token: token.clone(),
                    }),
                };
                (event, token)
            };

            for listener in self.take_listeners(&event.event_type, &event.field_id)? {
                listener(&mut event);
            }
            let prevented = event.default_prevented;
            drop(event);

            let mut state = write_lock(&self.state, "finishing field event cycle")?;
            let Some(pending) = state.pending.get_mut(&dispatch) else {
                return Ok(DispatchOutcome::Cancelled);
            };
            pending.running = false;

            if !prevented {
                let action = state
                    .pending
                    .remove(&dispatch)
                    .and_then(|pending| pending.action);
                drop(state);
                tracing::debug!(dispatch, "field event default action runs");
                if let Some(action) = action {
                    action();
                }
                return Ok(DispatchOutcome::Proceeded);
            }

            if pending.retry_requested {
                continue;
            }
            if Arc::strong_count(&token) == 1 {
                state.pending.remove(&dispatch);
                tracing::debug!(dispatch, "field event cancelled");
                return Ok(DispatchOutcome::Cancelled);
            }
            tracing::debug!(dispatch, "field event deferred until retry");
            return Ok(DispatchOutcome::Deferred);
        }
    }

    /// Snapshot of the listeners to invoke; `once` listeners are removed.
    fn take_listeners(
        &self,
        event_type: &str,
        field_id: &FieldId,
    ) -> FormResult<Vec<FieldEventListener>> {
        let mut state = write_lock(&self.state, "collecting field event listeners")?;
        let key = (event_type.to_string(), field_id.clone());
        let Some(entries) = state.listeners.get_mut(&key) else {
            return Ok(Vec::new());
        };
        let listeners = entries
            .iter()
            .map(|entry| entry.listener.clone())
            .collect::<Vec<_>>();
        entries.retain(|entry| !entry.once);
        if entries.is_empty() {
            state.listeners.remove(&key);
        }
        Ok(listeners)
    }
}
