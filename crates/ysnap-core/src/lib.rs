//! Periodic snapshot capture for cameras on the ys7 open platform.
//! This crate is consumed by the `ysnap` CLI.

pub mod archive;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod poller;
pub mod token;

pub use crate::archive::{ImageArchiver, StoredImage};
pub use crate::client::{VendorApi, Ys7Client};
pub use crate::config::Config;
pub use crate::error::{AuthError, CaptureError, Error, Result, StorageError};
pub use crate::models::*;
pub use crate::poller::Poller;
pub use crate::token::TokenManager;
