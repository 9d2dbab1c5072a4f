pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod transport;
pub mod upload;
pub mod utils;

pub use client::{CosClient, ListOptions, ListPattern};
pub use config::ClientConfig;
pub use error::{Error, Result, TransportError};
pub use models::{UploadResult, UploadStatus};
pub use transport::{HttpTransport, Signer, StaticSigner, Transport};
pub use upload::{progress_fn, UploadEvent, UploadOptions, UploadSource};
