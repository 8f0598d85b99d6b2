//! 基础设施层
//!
//! 外部进程调用与产物下载。

pub mod command;
pub mod download;

pub use command::{CommandOutput, CommandSpec, Executor, PlannedAction};
