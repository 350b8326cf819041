//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Cull: Removes expired cache rows at a configured interval

mod cull;

pub use cull::spawn_cull_task;
