//! Cross-crate integration tests.

#[cfg(test)]
pub(crate) mod fixtures;
pub mod properties;
pub mod scenarios;
