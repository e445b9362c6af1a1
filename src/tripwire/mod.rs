//! Tripwire — provenance tracing, BLAKE3 hashing, staleness detection.

pub mod eventlog;
pub mod hasher;
pub mod stale;
