//! Command implementations for the skillgate CLI.
//!
//! `scan` runs the full pipeline and exits with the decision code so CI
//! systems can gate on it directly; `policy` validates policy files without
//! scanning anything; `analyzers` lists the registered analyzer set.

pub mod analyzers;
pub mod policy;
pub mod scan;
