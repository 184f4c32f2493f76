//! Image identifiers and local image inventory

pub mod inventory;
pub mod reference;

pub use inventory::{LocalInventory, parse_image_table};
pub use reference::ImageRef;
