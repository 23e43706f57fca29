pub mod auth;
pub mod backoff;
pub mod keyed_mutex;
pub mod validation;
