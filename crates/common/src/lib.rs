//! Common types shared by the platformctl crates

mod config;
mod error;
mod secret;

pub use config::{
    APP_NAME, CONFIG_PATH_ENV, Config, LoginConfig, NetworkConfig, PROFILE_PATH_ENV,
    STORE_DRIVER_ENV, STORE_DRIVERS, StoreConfig,
};
pub use error::{Error, Result};
pub use secret::Secret;
