pub mod session;
pub mod task;

pub use session::SessionRecord;
pub use task::{Task, TaskFilter};
