pub mod fs;
pub mod settings;
