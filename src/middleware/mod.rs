pub mod auth;
pub mod client_ip;
pub mod ip_filter;
pub mod rate_limit;
pub mod request_id;
pub mod request_logger;
pub mod security_headers;
pub mod signature;

pub use auth::{bearer_auth_middleware, BearerAuth};
pub use ip_filter::IpFilterLayer;
pub use rate_limit::{rate_limit_middleware, RateLimiter};
pub use request_id::{request_id_middleware, RequestId};
pub use request_logger::request_logger_middleware;
pub use security_headers::security_headers_middleware;
pub use signature::{signature_middleware, SignatureVerifier};
