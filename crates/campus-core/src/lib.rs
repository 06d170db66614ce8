//! Core types and the session/directory store for the campus demo.
//!
//! This crate holds no presentation code. The store keeps registered
//! identities, the active session and the broadcast notification log in
//! memory, and reports every mutation to subscribed observers.

pub mod backend;
pub mod config;
pub mod error;
pub mod event;
pub mod identity;
pub mod notification;
pub mod store;

pub use error::{Error, Result};
pub use store::SessionStore;

#[cfg(test)]
mod tests;
