//! Public types for the Kibitz API.

mod features;
mod message;
mod options;
mod response;
mod stats;

pub use features::{BucketKey, FeatureSet, PredictionKey};
pub use message::{Message, Role};
pub use options::{DEFAULT_PRIORITY, SubmitOptions};
pub use response::{Completion, ResponseSource};
pub use stats::{CacheStats, RateLimitStats};
