pub mod calendar;
pub mod cards;
pub mod generate;
pub mod health;
pub mod history;
pub mod images;
pub mod self_image;
pub mod tasks;
