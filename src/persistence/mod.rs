pub mod backend;
pub mod settings;
pub mod worker;
