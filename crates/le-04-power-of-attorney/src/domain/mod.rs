//! Grants, allowance matching and demand extraction.

pub mod allowance;
pub mod demand;
pub mod grants;
