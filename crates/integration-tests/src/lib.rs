//! End-to-end tests over the in-memory adapters live in `tests/`.
