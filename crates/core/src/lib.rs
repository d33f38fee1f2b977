pub mod config;
pub mod env;
pub mod error;
pub mod skill;

pub use config::Config;
pub use env::EnvMap;
pub use error::*;
pub use skill::*;
