//! Table definitions, one module per AWS resource type.
//!
//! Each module exposes a `table()` constructor returning the fully wired
//! [`Table`](crate::table::Table): item type, list/get bindings, hydrators,
//! and column schema.

pub mod iam_user;
pub mod sqs_queue;
pub mod ssm_maintenance_window;
