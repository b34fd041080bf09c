//! GATT plumbing: the traits a platform backend implements, and the queue that keeps at most one operation in
//! flight per connection.

mod queue;

use async_trait::async_trait;
use uuid::Uuid;

pub use self::queue::{GattCompletions, GattRequestQueue};
use crate::{DeviceId, Result};

/// The attribute an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GattTarget {
    /// A characteristic value
    Characteristic {
        /// Containing service
        service: Uuid,
        /// The characteristic
        characteristic: Uuid,
    },
    /// A descriptor of a characteristic
    Descriptor {
        /// Containing service
        service: Uuid,
        /// Containing characteristic
        characteristic: Uuid,
        /// The descriptor
        descriptor: Uuid,
    },
}

impl GattTarget {
    /// Shorthand for [`GattTarget::Characteristic`].
    pub const fn characteristic(service: Uuid, characteristic: Uuid) -> Self {
        GattTarget::Characteristic {
            service,
            characteristic,
        }
    }
}

/// What an operation does.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GattOpKind {
    /// Read the attribute value
    Read,
    /// Write the attribute value with response
    Write(Vec<u8>),
}

/// One queued GATT operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GattOp {
    /// Read or write
    pub kind: GattOpKind,
    /// The attribute
    pub target: GattTarget,
}

/// Opens GATT connections.
#[async_trait]
pub trait GattBackend: Send + Sync {
    /// Connects to `device`.
    ///
    /// The backend reports the outcome of every operation later [dispatched][GattLink::dispatch] on the returned
    /// link through `completions`.
    async fn connect(&self, device: &DeviceId, completions: GattCompletions) -> Result<Box<dyn GattLink>>;
}

/// One open GATT connection.
#[async_trait]
pub trait GattLink: Send {
    /// Discovers the primary services of the remote device.
    async fn discover_services(&mut self) -> Result<Vec<Uuid>>;

    /// Starts an operation. The result arrives later through [`GattCompletions`].
    ///
    /// An error here means the operation was never started; no completion will follow.
    fn dispatch(&mut self, op: &GattOp) -> Result<()>;

    /// Tears the connection down.
    fn disconnect(&mut self);
}
