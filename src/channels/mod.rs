//! Concurrent retrieval of upstream collections.
//!
//! Every started retrieval runs in its own task and resolves exactly one
//! [`ResultFuture`]. Callers start all the kinds a view needs up front and
//! then resolve only the futures they actually use, in any order.

mod future;
mod registry;
mod scope;

pub use future::ResultFuture;
pub use registry::ResourceChannels;
pub use scope::NamespaceScope;
