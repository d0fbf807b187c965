//! Domain types shared by the coordinator, the transport and the simulated peers

mod car;
mod request;
mod signal;
mod state;

pub use car::CarRecord;
pub use request::Request;
pub use signal::{ElevatorSignal, FloorRequest, FloorSignal, FloorSignalKind, RequestFault};
pub use state::{Direction, ElevatorState, FaultKind};

/// Floor number, 1-based
pub type Floor = u32;

/// Car identifier, 1-based
pub type CarId = u32;

/// Sequential request identifier assigned by the coordinator
pub type RequestId = u64;
