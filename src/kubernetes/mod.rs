mod context;

pub use context::{ClusterContext, current_context};
