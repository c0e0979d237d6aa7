//! Front-ends: what the frame driver renders into.
//!
//! - [`ConsoleFrontend`]: interactive terminal panel
//! - [`AutoFrontend`]: headless, presses the send control on a timer

mod auto;
mod console;
mod input;
mod traits;

pub use auto::AutoFrontend;
pub use console::{status_lines, ConsoleFrontend};
pub use input::{ConsoleKey, InputActor};
pub use traits::Frontend;
