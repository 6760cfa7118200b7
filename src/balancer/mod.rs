//! Load estimation for backend game servers

pub mod estimator;

pub use estimator::{select_least_loaded, LoadEstimator, ServerLoad, FULL_KEYSPACE};
