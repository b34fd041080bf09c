mod common;

use std::sync::{Arc, Mutex};

use common::RecordingLink;
use uribeacon::error::{AttError, AttErrorCode, ErrorKind};
use uribeacon::gatt::{GattOp, GattOpKind, GattTarget};
use uribeacon::{BluetoothUuidExt, GattRequestQueue, Uuid};

fn target(characteristic: u16) -> GattTarget {
    GattTarget::characteristic(Uuid::from_u16(0xfff0), Uuid::from_u16(characteristic))
}

fn read(characteristic: u16) -> GattOp {
    GattOp {
        kind: GattOpKind::Read,
        target: target(characteristic),
    }
}

struct Harness {
    queue: GattRequestQueue,
    dispatched: Arc<Mutex<Vec<GattOp>>>,
    reject: Arc<Mutex<Vec<Uuid>>>,
}

impl Harness {
    fn new() -> Self {
        common::init_tracing();
        let harness = Harness {
            queue: GattRequestQueue::new(),
            dispatched: Arc::default(),
            reject: Arc::default(),
        };
        harness.queue.attach(Box::new(RecordingLink {
            dispatched: harness.dispatched.clone(),
            reject: harness.reject.clone(),
        }));
        harness
    }

    fn dispatched(&self) -> Vec<GattOp> {
        self.dispatched.lock().unwrap().clone()
    }
}

#[tokio::test]
async fn three_operations_dispatch_one_after_another() {
    let harness = Harness::new();
    let completions = harness.queue.completions();

    let receivers: Vec<_> = (1..=3).map(|n| harness.queue.enqueue(read(n)).unwrap()).collect();
    assert_eq!(harness.dispatched(), vec![read(1)]);

    completions.complete(0, vec![1]);
    assert_eq!(harness.dispatched(), vec![read(1), read(2)]);

    completions.complete(0, vec![2]);
    assert_eq!(harness.dispatched(), vec![read(1), read(2), read(3)]);

    completions.complete(0, vec![3]);
    assert!(harness.queue.is_empty());

    let mut values = Vec::new();
    for receiver in receivers {
        values.push(GattRequestQueue::wait(receiver).await.unwrap());
    }
    assert_eq!(values, vec![vec![1], vec![2], vec![3]]);
}

#[tokio::test]
async fn error_status_reaches_only_its_caller() {
    let harness = Harness::new();
    let completions = harness.queue.completions();

    let locked = harness.queue.enqueue(read(1)).unwrap();
    let next = harness.queue.enqueue(read(2)).unwrap();

    completions.complete(0x08, Vec::new());
    let err = GattRequestQueue::wait(locked).await.unwrap_err();
    assert!(err.is_insufficient_authorization());
    assert_eq!(
        err.kind(),
        ErrorKind::Protocol(AttError::Known(AttErrorCode::InsufficientAuthorization))
    );

    assert_eq!(harness.dispatched().len(), 2);
    completions.complete(0, vec![9]);
    assert_eq!(GattRequestQueue::wait(next).await.unwrap(), vec![9]);
}

#[tokio::test]
async fn application_status_is_kept_verbatim() {
    let harness = Harness::new();
    let pending = harness.queue.enqueue(read(1)).unwrap();
    harness.queue.completions().complete(0x81, Vec::new());
    let err = GattRequestQueue::wait(pending).await.unwrap_err();
    assert_eq!(err.att_error(), Some(AttError::Application(0x81)));
    assert!(!err.is_insufficient_authorization());
}

#[test]
fn att_status_codes_decode() {
    assert_eq!(AttError::from(0x10u8), AttError::Known(AttErrorCode::UnsupportedGroupType));
    assert_eq!(AttError::from(0x12u8), AttError::Known(AttErrorCode::DatabaseOutOfSync));
    assert_eq!(AttError::from(0xfdu8), AttError::Known(AttErrorCode::CccdImproperlyConfigured));
    assert_eq!(AttError::from(0x14u8), AttError::Reserved(0x14));
    assert_eq!(AttError::from(0x9fu8).code(), 0x9f);
}

#[tokio::test]
async fn dispatch_failure_fails_the_op_and_moves_on() {
    let harness = Harness::new();
    harness.reject.lock().unwrap().push(Uuid::from_u16(1));

    let rejected = harness.queue.enqueue(read(1)).unwrap();
    let accepted = harness.queue.enqueue(read(2)).unwrap();
    assert_eq!(
        GattRequestQueue::wait(rejected).await.unwrap_err().kind(),
        ErrorKind::InvalidParameter
    );
    assert_eq!(harness.dispatched(), vec![read(2)]);

    harness.queue.completions().complete(0, vec![2]);
    assert_eq!(GattRequestQueue::wait(accepted).await.unwrap(), vec![2]);
}

#[tokio::test]
async fn close_fails_waiters_and_discards_late_completions() {
    let harness = Harness::new();
    let completions = harness.queue.completions();

    let in_flight = harness.queue.enqueue(read(1)).unwrap();
    let waiting = harness.queue.enqueue(read(2)).unwrap();
    harness.queue.close();
    harness.queue.close();

    completions.complete(0, vec![1]);
    assert_eq!(
        GattRequestQueue::wait(in_flight).await.unwrap_err().kind(),
        ErrorKind::NotConnected
    );
    assert_eq!(
        GattRequestQueue::wait(waiting).await.unwrap_err().kind(),
        ErrorKind::NotConnected
    );
    assert_eq!(harness.dispatched(), vec![read(1)]);

    let err = harness.queue.read(target(3)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotConnected);
}

#[tokio::test]
async fn operations_wait_for_a_link() {
    let queue = GattRequestQueue::new();
    let dispatched = Arc::new(Mutex::new(Vec::new()));
    let pending = queue.enqueue(read(1)).unwrap();
    assert_eq!(queue.len(), 1);

    queue.attach(Box::new(RecordingLink {
        dispatched: dispatched.clone(),
        reject: Arc::default(),
    }));
    assert_eq!(*dispatched.lock().unwrap(), vec![read(1)]);

    queue.completions().complete(0, vec![5]);
    assert_eq!(GattRequestQueue::wait(pending).await.unwrap(), vec![5]);
}

#[test]
fn completions_outlive_the_queue() {
    let harness = Harness::new();
    let completions = harness.queue.completions();
    let _pending = harness.queue.enqueue(read(1)).unwrap();
    drop(harness);
    completions.complete(0, vec![1]);
    completions.disconnected();
}
