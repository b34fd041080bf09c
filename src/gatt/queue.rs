use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_channel::{Receiver, Sender};
use tracing::{debug, trace};

use super::{GattLink, GattOp, GattOpKind, GattTarget};
use crate::error::{AttError, ErrorKind};
use crate::{Error, Result};

type Reply = Sender<Result<Vec<u8>>>;

struct PendingOp {
    op: GattOp,
    reply: Reply,
}

#[derive(Default)]
struct QueueState {
    link: Option<Box<dyn GattLink>>,
    pending: VecDeque<PendingOp>,
    in_flight: bool,
    closed: bool,
}

fn lock(state: &Mutex<QueueState>) -> MutexGuard<'_, QueueState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_connected() -> Error {
    Error::new(ErrorKind::NotConnected, None, "connection closed")
}

fn reply(pending: PendingOp, result: Result<Vec<u8>>) {
    if pending.reply.try_send(result).is_err() {
        trace!(op = ?pending.op, "caller stopped waiting");
    }
}

/// Dispatches queued operations until one is in flight, the queue is empty, or no link is attached.
///
/// The link is taken out of the state while it runs so a backend that completes synchronously from inside
/// [`GattLink::dispatch`] does not deadlock.
fn pump(state: &Mutex<QueueState>) {
    loop {
        let (mut link, op) = {
            let mut guard = lock(state);
            if guard.closed || guard.in_flight {
                return;
            }
            let Some(op) = guard.pending.front().map(|pending| pending.op.clone()) else {
                return;
            };
            let Some(link) = guard.link.take() else {
                return;
            };
            guard.in_flight = true;
            (link, op)
        };

        debug!(?op, "dispatching GATT operation");
        let dispatched = link.dispatch(&op);

        let mut guard = lock(state);
        if guard.closed {
            link.disconnect();
            return;
        }
        guard.link = Some(link);
        if let Err(err) = dispatched {
            debug!("GATT dispatch failed: {err}");
            guard.in_flight = false;
            if let Some(pending) = guard.pending.pop_front() {
                reply(pending, Err(err));
            }
        }
    }
}

/// Serializes GATT operations on one connection.
///
/// Operations run strictly in the order they were enqueued, one at a time. Each caller receives its own result on
/// a dedicated channel, so results are handled on the caller's task rather than on the platform's callback thread.
pub struct GattRequestQueue {
    state: Arc<Mutex<QueueState>>,
}

impl GattRequestQueue {
    /// Creates a queue with no link attached. Operations wait until [`attach`][Self::attach] is called.
    pub fn new() -> Self {
        GattRequestQueue {
            state: Arc::new(Mutex::new(QueueState::default())),
        }
    }

    /// The handle a backend uses to report completions to this queue.
    pub fn completions(&self) -> GattCompletions {
        GattCompletions {
            state: Arc::downgrade(&self.state),
        }
    }

    /// Attaches the connection operations are dispatched on, and starts dispatching.
    pub fn attach(&self, link: Box<dyn GattLink>) {
        {
            let mut guard = lock(&self.state);
            if guard.closed {
                drop(guard);
                let mut link = link;
                link.disconnect();
                return;
            }
            guard.link = Some(link);
        }
        pump(&self.state);
    }

    /// Appends an operation and returns the channel its result will arrive on.
    ///
    /// Operations enqueued back to back from one task are dispatched in that order even if nobody awaits the first
    /// result before enqueueing the second.
    pub fn enqueue(&self, op: GattOp) -> Result<Receiver<Result<Vec<u8>>>> {
        let (sender, receiver) = async_channel::bounded(1);
        {
            let mut guard = lock(&self.state);
            if guard.closed {
                return Err(not_connected());
            }
            guard.pending.push_back(PendingOp { op, reply: sender });
        }
        pump(&self.state);
        Ok(receiver)
    }

    /// Waits for the result of an enqueued operation.
    pub async fn wait(receiver: Receiver<Result<Vec<u8>>>) -> Result<Vec<u8>> {
        receiver.recv().await.unwrap_or_else(|_| Err(not_connected()))
    }

    /// Enqueues an operation and waits for its result.
    pub async fn submit(&self, op: GattOp) -> Result<Vec<u8>> {
        let receiver = self.enqueue(op)?;
        Self::wait(receiver).await
    }

    /// Reads an attribute.
    pub async fn read(&self, target: GattTarget) -> Result<Vec<u8>> {
        self.submit(GattOp {
            kind: GattOpKind::Read,
            target,
        })
        .await
    }

    /// Writes an attribute with response.
    pub async fn write(&self, target: GattTarget, value: &[u8]) -> Result<()> {
        self.submit(GattOp {
            kind: GattOpKind::Write(value.to_vec()),
            target,
        })
        .await
        .map(drop)
    }

    /// Number of operations waiting or in flight
    pub fn len(&self) -> usize {
        lock(&self.state).pending.len()
    }

    /// Returns `true` if nothing is waiting or in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` once [`close`][Self::close] has been called or the backend reported a disconnection.
    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    /// Drops every pending operation, disconnects the link and ignores any completion that arrives later.
    ///
    /// Callers still waiting observe [`ErrorKind::NotConnected`]. Safe to call more than once.
    pub fn close(&self) {
        close_state(&self.state);
    }
}

fn close_state(state: &Mutex<QueueState>) {
    let (link, pending) = {
        let mut guard = lock(state);
        if guard.closed {
            return;
        }
        guard.closed = true;
        guard.in_flight = false;
        (guard.link.take(), std::mem::take(&mut guard.pending))
    };
    debug!(dropped = pending.len(), "closing GATT queue");
    drop(pending);
    if let Some(mut link) = link {
        link.disconnect();
    }
}

impl Default for GattRequestQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for GattRequestQueue {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for GattRequestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = lock(&self.state);
        f.debug_struct("GattRequestQueue")
            .field("pending", &guard.pending.len())
            .field("in_flight", &guard.in_flight)
            .field("closed", &guard.closed)
            .finish()
    }
}

/// Reports the outcome of dispatched operations back to a [`GattRequestQueue`].
///
/// Cloneable and usable from any thread. Completions arriving after the queue was closed or dropped are discarded.
#[derive(Clone)]
pub struct GattCompletions {
    state: Weak<Mutex<QueueState>>,
}

impl GattCompletions {
    /// Completes the in-flight operation with an ATT status. Status `0` is success; `value` is the read value and
    /// is ignored for writes.
    pub fn complete(&self, status: u8, value: Vec<u8>) {
        let result = match status {
            0 => Ok(value),
            status => Err(Error::from(AttError::from(status))),
        };
        self.finish(result);
    }

    /// Fails the in-flight operation with an error that has no ATT status.
    pub fn fail(&self, error: Error) {
        self.finish(Err(error));
    }

    /// Reports that the link went down. Equivalent to closing the queue.
    pub fn disconnected(&self) {
        if let Some(state) = self.state.upgrade() {
            close_state(&state);
        }
    }

    fn finish(&self, result: Result<Vec<u8>>) {
        let Some(state) = self.state.upgrade() else {
            debug!("discarding GATT completion for a dropped queue");
            return;
        };
        {
            let mut guard = lock(&state);
            if guard.closed || !guard.in_flight {
                debug!("discarding GATT completion with nothing in flight");
                return;
            }
            guard.in_flight = false;
            if let Some(pending) = guard.pending.pop_front() {
                trace!(op = ?pending.op, ok = result.is_ok(), "GATT operation complete");
                reply(pending, result);
            }
        }
        pump(&state);
    }
}

impl std::fmt::Debug for GattCompletions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GattCompletions").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingLink {
        dispatched: Arc<Mutex<Vec<GattOp>>>,
    }

    #[async_trait::async_trait]
    impl GattLink for RecordingLink {
        async fn discover_services(&mut self) -> Result<Vec<uuid::Uuid>> {
            Ok(Vec::new())
        }

        fn dispatch(&mut self, op: &GattOp) -> Result<()> {
            self.dispatched.lock().unwrap().push(op.clone());
            Ok(())
        }

        fn disconnect(&mut self) {}
    }

    fn target(n: u16) -> GattTarget {
        use crate::BluetoothUuidExt;
        GattTarget::characteristic(uuid::Uuid::from_u16(0x1800), uuid::Uuid::from_u16(n))
    }

    #[test]
    fn only_the_head_is_dispatched() {
        let dispatched = Arc::new(Mutex::new(Vec::new()));
        let queue = GattRequestQueue::new();
        queue.attach(Box::new(RecordingLink {
            dispatched: dispatched.clone(),
        }));

        let first = queue
            .enqueue(GattOp {
                kind: GattOpKind::Read,
                target: target(1),
            })
            .unwrap();
        let _second = queue
            .enqueue(GattOp {
                kind: GattOpKind::Read,
                target: target(2),
            })
            .unwrap();
        assert_eq!(dispatched.lock().unwrap().len(), 1);

        queue.completions().complete(0, vec![7]);
        assert_eq!(first.try_recv().unwrap().unwrap(), vec![7]);
        assert_eq!(dispatched.lock().unwrap().len(), 2);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn completion_without_anything_in_flight_is_ignored() {
        let queue = GattRequestQueue::new();
        queue.completions().complete(0, vec![1]);
        assert!(queue.is_empty());
    }
}
