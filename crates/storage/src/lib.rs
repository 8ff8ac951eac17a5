mod clock;
pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::StorageError;
pub use memory::MemoryStore;
pub use record::{
    Operation, OperationDetails, OperationKind, OperationState, ProvisioningParameters, Runtime,
    RuntimeOperation,
};
pub use traits::OperationStore;
