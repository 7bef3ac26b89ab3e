pub mod distance_engine;
pub mod distance_metric;
pub mod match_resolver;
pub mod threshold_policy;
