//! Device runtime errors.

use std::io;

use crate::radio::RadioError;
use crate::store::StoreError;

/// Errors that stop the device runtime
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Radio(#[from] RadioError),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
