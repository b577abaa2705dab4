pub mod catalog;
pub mod invocation;
pub mod operation;
