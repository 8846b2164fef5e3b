use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

struct GateState {
    active: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// Counting semaphore that hands freed slots to waiters in arrival order.
///
/// A release never frees a slot while someone is queued: the slot moves
/// straight to the head waiter, so `active` only drops when the queue is
/// empty.
///
/// ```
/// # tokio_test_block(async {
/// use scour_limits::Gate;
///
/// let gate = Gate::new("global", 2);
/// let a = gate.acquire().await;
/// let _b = gate.acquire().await;
/// assert!(gate.try_acquire().is_none());
/// drop(a);
/// assert_eq!(gate.active(), 1);
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f);
/// # }
/// ```
pub struct Gate {
    name: String,
    capacity: usize,
    state: Mutex<GateState>,
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("active", &self.active())
            .field("waiting", &self.waiting())
            .finish()
    }
}

impl Gate {
    pub fn new(name: impl Into<String>, capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            capacity: capacity.max(1),
            state: Mutex::new(GateState {
                active: 0,
                waiters: VecDeque::new(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held (including slots handed to a waiter that has
    /// not been polled yet).
    pub fn active(&self) -> usize {
        self.lock().active
    }

    /// Live waiters in the queue.
    pub fn waiting(&self) -> usize {
        self.lock()
            .waiters
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a slot only if one is free right now and nobody is queued.
    pub fn try_acquire(self: &Arc<Self>) -> Option<GatePermit> {
        let mut st = self.lock();
        if st.active < self.capacity && st.waiters.is_empty() {
            st.active += 1;
            Some(GatePermit::new(Arc::clone(self)))
        } else {
            None
        }
    }

    /// Wait for a slot. Dropping the returned future before it resolves
    /// gives up the place in the queue (and any slot already handed over).
    pub async fn acquire(self: &Arc<Self>) -> GatePermit {
        loop {
            let rx = {
                let mut st = self.lock();
                if st.active < self.capacity && st.waiters.is_empty() {
                    st.active += 1;
                    return GatePermit::new(Arc::clone(self));
                }
                let (tx, rx) = oneshot::channel();
                st.waiters.push_back(tx);
                tracing::trace!(
                    gate = %self.name,
                    active = st.active,
                    queued = st.waiters.len(),
                    "gate.queued"
                );
                rx
            };

            let mut pending = PendingSlot {
                gate: Arc::clone(self),
                rx: Some(rx),
            };
            if pending.wait().await {
                return GatePermit::new(Arc::clone(self));
            }
        }
    }

    fn release(&self) {
        let mut st = self.lock();
        while let Some(tx) = st.waiters.pop_front() {
            if tx.send(()).is_ok() {
                return;
            }
        }
        st.active = st.active.saturating_sub(1);
    }
}

/// Queue position owned by an in-flight `acquire`.
struct PendingSlot {
    gate: Arc<Gate>,
    rx: Option<oneshot::Receiver<()>>,
}

impl PendingSlot {
    /// `true` once a slot has been handed over.
    async fn wait(&mut self) -> bool {
        let Some(rx) = self.rx.as_mut() else {
            return false;
        };
        let granted = rx.await.is_ok();
        self.rx = None;
        granted
    }
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        if let Some(mut rx) = self.rx.take() {
            rx.close();
            if rx.try_recv().is_ok() {
                // slot arrived after we stopped waiting
                self.gate.release();
            }
        }
    }
}

/// A held slot; released on drop.
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct GatePermit {
    gate: Arc<Gate>,
}

impl GatePermit {
    fn new(gate: Arc<Gate>) -> Self {
        Self { gate }
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }
}

impl std::fmt::Debug for GatePermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatePermit")
            .field("gate", &self.gate.name)
            .finish()
    }
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.gate.release();
    }
}
