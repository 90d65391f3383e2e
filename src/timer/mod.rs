pub mod controller;
pub mod events;
pub mod session;
pub mod state;

pub use controller::TimerController;
pub use events::{TimerEvent, TimerSnapshot};
pub use session::SessionTimer;
pub use state::{TickOutcome, TimerMode, TimerState, TimerStatus};
