//! Domain layer of the dispatcher.

pub(crate) mod checks;
pub mod dispatcher;
pub mod outcome;
pub mod processor;
pub(crate) mod rules;
pub mod sweep;
