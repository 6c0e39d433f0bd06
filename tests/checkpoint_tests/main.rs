//! Checkpoint test suite
