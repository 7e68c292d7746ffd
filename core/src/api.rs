//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `runonce_core::api` instead of reaching into internal modules.

pub use crate::clock::{Clock, FixedClock, SystemClock};
pub use crate::config::{
    default_config_path, load_default, load_from_path, AppConfig, FileConfig, LoggingConfig, ObjectStoreConfig,
    UploadConfig,
};
pub use crate::destination::{
    CompositeDestination, Destination, LocalDestination, ObjectBody, ObjectStore,
    StreamingRemoteDestination, DEFAULT_LOG_POSTFIX,
};
pub use crate::error::{CliError, DestinationError, GuardError, NamingError, ObjectStoreError};
pub use crate::guard::{
    script_fn, ExecutionGuard, GuardOptions, GuardState, Script, ScriptContext, ScriptFuture,
    DEFAULT_DIALOG_MESSAGE, GENERATOR_LINE,
};
pub use crate::naming::{NameTemplate, NamingContext};
pub use crate::sink::{LogSink, MultiSink, SinkHandle, StreamPair, WriterSink};
