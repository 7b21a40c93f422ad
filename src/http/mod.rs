// HTTP layer.
// Request descriptors, the retrying executor and response interpretation.

pub mod executor;
pub mod rate_limit;
pub mod request;
pub mod response;

pub use executor::{DEFAULT_REQUEST_TIMEOUT, Executor, RetryDecision, RetryPolicy};
pub use rate_limit::RateLimit;
pub use request::{AuthScheme, RequestSpec};
pub use response::RawResponse;
