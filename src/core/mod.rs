//! Core engine module - clock, event bus, periodic tasks and the engine facade

mod clock;
mod engine;
mod event_bus;
mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Accepted, Engine, EngineStats};
pub use event_bus::{EventBus, SystemEvent, SystemEventKind};
pub use scheduler::Scheduler;
