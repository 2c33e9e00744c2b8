//! Client side of the draw flow, for front ends and tools talking to the API.

pub mod api;
pub mod retry;
pub mod workflow;

pub use api::{HttpImageApi, ImageApi, StaticToken, TokenSource};
pub use retry::{fetch_image_with_retry, RetryPolicy};
pub use workflow::{DrawCard, DrawConfig, DrawSession};
