//! Version Diff library
//!
//! Compares two versions of a file taken from one of several history
//! backends (sync service, local recovery snapshots or git). The
//! [`session::DiffSession`] state machine owns the selection and content
//! state; [`worker::Worker`] runs its backend jobs off the caller's thread.

pub mod cache;
pub mod config;
pub mod constant;
pub mod diff;
pub mod display;
pub mod messages;
pub mod pagination;
pub mod session;
pub mod source;
pub mod store;
pub mod timeline;
pub mod version;
pub mod worker;
