//! Grouped facade APIs: routes, dependencies, guards, plugins, and
//! router cloning.
//!
//! Each submodule extends [`crate::Router`] with one concern's worth of
//! operations, mirroring how the engine itself is split.

mod clone;
mod deps;
mod guards;
mod plugins;
mod routes;

pub use clone::clone_router;
pub use plugins::PluginHandle;
