//! Courier picks up external tasks from a Camunda Cloud cluster and hands
//! them to subscribed handlers. The broker connection, the handler registry,
//! and the poll loop are all explicit values wired together in `main` — no
//! process-wide singletons.

pub mod auth;
pub mod banner;
pub mod broker;
pub mod config;
pub mod consts;
pub mod handlers;
pub mod worker;
