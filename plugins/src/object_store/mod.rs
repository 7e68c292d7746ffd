mod http;
mod s3;

pub use http::HttpObjectStore;
pub use s3::{S3ObjectStore, PART_BYTES};
