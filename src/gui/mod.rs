pub mod commands;
pub mod frontend;
pub mod render;
pub mod selection;
