mod classify;
mod invoker;

pub use classify::classify;
pub use invoker::{capture, render_command_line, run, ExecutionResult};
