pub mod calendar;
pub mod gemini;
pub mod imagen;
pub mod mock;
pub mod normalize;
pub mod prompts;
pub mod render;
pub mod storage;
