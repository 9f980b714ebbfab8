//! Per-guild voice session lifecycle: who is connected, who may issue
//! commands right now, and when an idle connection gets torn down.

pub mod gate;
pub mod record;
pub mod registry;
pub mod sweeper;

pub use gate::{Admission, CommandGate, LockPolicy};
pub use record::{SessionRecord, TenantLock};
pub use registry::{RecordSlot, SessionRegistry};
pub use sweeper::{InactivitySweeper, SweepReport, SweeperFailure, SweeperHandle, TIMEOUT_NOTICE};
