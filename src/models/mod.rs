pub mod calendar;
pub mod card;
pub mod self_image;
pub mod task;
