//! This crate has no library surface of its own — it exists to hold the
//! end-to-end scenario tests under `tests/` as dev-dependents of the
//! `nwwd-*` library crates.
