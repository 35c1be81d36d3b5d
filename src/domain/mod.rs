pub mod errors;
pub mod features;
pub mod property;
pub mod valuation;
