//! # Hearty Rabbit client
//!
//! Client library for the Hearty Rabbit content-addressed blob storage
//! service: login, hierarchically named collections of blobs, per-blob
//! visibility tiers, collection covers, and anonymous share links.
//!
//! All state lives in a [`Session`]: one HTTP transport, one identity.
//! Sessions never share anything, so several of them (different users, or an
//! anonymous viewer) can talk to the same server side by side.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hrb_client::{Config, Session};
//!
//! #[tokio::main]
//! async fn main() -> hrb_client::Result<()> {
//!     let mut session = Session::new(Config::new("https://hrb.example.com:4433"))?;
//!     session.login("sumsum", "bearbear").await?;
//!
//!     // Upload a file; the server assigns the blob id
//!     let id = session.upload("holiday", "lena.jpg", std::fs::read("lena.jpg")?).await?;
//!
//!     // Fetch it back, thumbnail rendition
//!     let blob = session.get_blob("holiday", &id, None, Some("thumbnail")).await?;
//!     println!("{} ({} bytes)", blob.filename.unwrap_or_default(), blob.data.unwrap().len());
//!
//!     session.logout().await?;
//!     Ok(())
//! }
//! ```

mod auth;
mod config;
mod error;
mod path;
mod session;
mod types;

pub use auth::AuthContext;
pub use config::Config;
pub use error::{Error, Result};
pub use session::Session;
pub use types::{Blob, BlobId, Collection, CollectionInfo, Permission, ShareLink};
