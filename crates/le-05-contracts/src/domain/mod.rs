//! Contract families and the shared machinery they settle through.

pub mod context;
pub mod dvp;
pub mod exchange;
pub mod expression;
pub mod lifecycle;
pub mod nominate;
