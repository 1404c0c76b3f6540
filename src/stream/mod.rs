pub mod download;
pub mod upload;

pub use download::DownloadProxy;
pub use upload::{UploadProxy, UploadStatus};
