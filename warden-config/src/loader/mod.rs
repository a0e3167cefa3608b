pub mod layers;

mod config;
mod manager;
mod merge;


pub use config::WardenConfig;
pub use manager::ConfigManager;
pub use merge::merge_toml_values;
