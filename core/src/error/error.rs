use chrono::NaiveDate;
use thiserror::Error;

/// Everything `ExecutionGuard::run` can refuse or fail with.
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("config error: {0}")]
    Config(String),

    #[error("name template error: {0}")]
    Naming(#[from] NamingError),

    #[error("exec_date: {scheduled} is not today! (today: {today})")]
    DateMismatch {
        scheduled: NaiveDate,
        today: NaiveDate,
    },

    #[error("Can't execute! Execution log destination [{location}] check failed: {source}")]
    DestinationCheck {
        location: String,
        source: DestinationError,
    },

    #[error("Can't execute! Execution log destination [{location}] already exists")]
    AlreadyExists { location: String },

    #[error("prompt error: {0}")]
    Prompt(std::io::Error),

    #[error("canceled.")]
    Cancelled,

    #[error("Can't execute! Execution log destination [{location}] initialize failed: {source}")]
    DestinationOpen {
        location: String,
        source: DestinationError,
    },

    #[error("transcript write to [{location}] failed: {source}")]
    TranscriptWrite {
        location: String,
        source: std::io::Error,
    },

    #[error("execution log destination [{location}] close failed: {source}")]
    DestinationClose {
        location: String,
        source: DestinationError,
    },

    #[error("{0:#}")]
    Script(anyhow::Error),
}

impl GuardError {
    /// True when the guard refused before anything was executed.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            Self::DateMismatch { .. }
                | Self::DestinationCheck { .. }
                | Self::AlreadyExists { .. }
                | Self::Prompt(_)
                | Self::Cancelled
        )
    }
}

#[derive(Error, Debug)]
pub enum DestinationError {
    #[error("no log destination")]
    Empty,

    #[error("{location}: {source}")]
    Member {
        location: String,
        source: Box<DestinationError>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object store error: {0}")]
    ObjectStore(#[from] ObjectStoreError),

    #[error("upload failed: {0}")]
    Upload(ObjectStoreError),
}

#[derive(Error, Debug)]
pub enum ObjectStoreError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("unexpected status {status} from {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("body read error: {0}")]
    Body(#[from] std::io::Error),

    #[error("upload worker terminated: {0}")]
    Worker(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NamingError {
    #[error("unterminated expression starting at byte {0}")]
    Unterminated(usize),

    #[error("empty expression")]
    EmptyExpression,

    #[error("unknown function or value '{0}'")]
    Unknown(String),

    #[error("'{func}' expects {expected}")]
    BadArguments {
        func: &'static str,
        expected: &'static str,
    },

    #[error("environment variable {0} is required")]
    MissingEnv(String),

    #[error("template rendered an empty name")]
    EmptyName,
}

/// Top-level failure of the `runonce` binary.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
