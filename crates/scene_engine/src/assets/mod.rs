//! Asset loading
//!
//! Textures decode off the render thread and arrive through an
//! [`AssetPromise`]. Decoded data becomes a device resource only when a
//! controller binds it, through the [`SharedResourcePool`] so identical
//! keys share one allocation.

pub mod promise;
pub mod shared_pool;
pub mod texture;

pub use promise::{promise, AssetPoll, AssetPromise, AssetResolver};
pub use shared_pool::SharedResourcePool;
pub use texture::TextureData;

use thiserror::Error;

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// Source does not exist
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// Source exists but could not be read
    #[error("Failed to load asset '{path}': {reason}")]
    LoadFailed {
        /// Source path
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// Contents are not a valid asset
    #[error("Invalid asset data: {0}")]
    InvalidData(String),

    /// The loader went away without resolving
    #[error("Asset loader dropped before resolving")]
    Dropped,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
