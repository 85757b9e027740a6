//! Read-aloud synchronization engine.
//!
//! Turns a document into per-screen sequences of text units, speaks them in
//! fixed-size chunks through a pluggable speech engine, and maps the chunk
//! being spoken back onto screen highlights under zoom and pan.

pub mod cache;
pub mod cancellation;
pub mod config;
pub mod document;
pub mod geometry;
pub mod highlight;
pub mod indexer;
pub mod pagination;
pub mod playback;
pub mod position;
pub mod session;
pub mod speech;
pub mod text_utils;
pub mod viewport;
pub mod worker;

#[cfg(test)]
mod test_support;
