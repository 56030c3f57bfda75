mod parameter_translator;
mod routing_policy;
mod weighted_pool;

pub use parameter_translator::{NamedQuery, PositionalParams};
pub use routing_policy::{ReadContext, ReadRoute, RoutingPolicy};
pub use weighted_pool::{WeightedEntry, WeightedPool, MAX_WEIGHT};
