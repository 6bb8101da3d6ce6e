pub mod leverage;
pub mod optimizer;
pub mod rating;
pub mod wacc;

pub use rating::CreditRating;
pub use wacc::{calculate_wacc, CapitalWeights, CostOfCapital};
