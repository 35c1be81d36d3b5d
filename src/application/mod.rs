pub mod cache;
pub mod ensemble;
pub mod estimators;
pub mod valuation_service;
