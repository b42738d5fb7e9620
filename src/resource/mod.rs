//! Resource views: list and detail responses assembled from concurrent
//! retrievals, data select and metrics.

pub mod common;
pub mod custom;
pub mod deployment;
pub mod event;
pub mod job;
pub mod namespace;
pub mod node;
pub mod pod;
pub mod replicaset;
pub mod service;
