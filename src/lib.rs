#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod client;
pub mod config;
pub mod error;
pub mod exception;
pub mod localization;
pub mod rest;
pub(crate) mod serde_helpers;
#[cfg(feature = "ws")]
pub mod ws;

pub use crate::client::Client;
pub use crate::config::Config;
pub use crate::error::{Error, Kind};
pub use crate::rest::ApiRequest;

pub type Result<T> = std::result::Result<T, Error>;
