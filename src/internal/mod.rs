//! Internal numeric helpers.
//!
//! - hungarian: rectangular minimum-cost assignment (Kuhn-Munkres with potentials)

pub mod hungarian;
