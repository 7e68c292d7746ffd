mod load;
mod types;

pub use load::{default_config_path, load_default, load_from_path};
pub use types::{AppConfig, FileConfig, LoggingConfig, ObjectStoreConfig, UploadConfig};
