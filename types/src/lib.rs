mod macros;

pub mod audio;
pub mod dialog;
pub mod events;
pub mod recognition;
pub mod synthesis;
pub mod task;

pub use events::{ClientMessage, ServerEvent};
