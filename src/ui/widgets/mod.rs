pub mod file_item;
pub mod progress;
