pub mod client;
pub mod envelope;
pub mod error;

pub use client::ApiClient;
pub use envelope::normalize;
pub use error::{ApiError, FieldError};
