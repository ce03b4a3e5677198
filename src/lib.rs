//! todo - a local-first task tracker
//!
//! Tasks form a forest of dependencies: a task waits on the tasks it depends
//! on, and projects complete themselves once everything under them is done.
//! Recurring work is described by blueprints that stamp out tasks on a
//! schedule, and open tasks escalate in priority as their deadline nears.

pub mod cli;
pub mod domain;
pub mod storage;

pub use domain::{Category, Date, Priority, Task, TaskId, TaskStatus, TodoManager};
