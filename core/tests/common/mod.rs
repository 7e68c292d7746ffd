#![allow(dead_code)]

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use runonce_core::api::{
    Destination, DestinationError, FixedClock, LogSink, SinkHandle, StreamPair,
};

pub fn at_noon() -> DateTime<Local> {
    Local.with_ymd_and_hms(2022, 6, 5, 12, 0, 0).unwrap()
}

pub fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock(at_noon()))
}

/// A sink whose bytes can be read back after the handle is dropped.
#[derive(Clone, Default)]
pub struct MemorySink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn handle(&self) -> SinkHandle {
        SinkHandle::new(self.clone())
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock().unwrap()).into_owned()
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.buf.lock().unwrap().extend_from_slice(buf);
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A sink whose every write fails.
pub struct BrokenSink;

#[async_trait]
impl LogSink for BrokenSink {
    async fn write_all(&mut self, _buf: &[u8]) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "console closed"))
    }

    async fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Captured console output.
#[derive(Clone, Default)]
pub struct Console {
    pub stdout: MemorySink,
    pub stderr: MemorySink,
}

impl Console {
    pub fn pair(&self) -> StreamPair {
        StreamPair::new(self.stdout.handle(), self.stderr.handle())
    }
}

#[derive(Default)]
pub struct FakeState {
    pub name: Mutex<String>,
    pub exists: bool,
    pub exists_error: bool,
    pub fail_open: bool,
    pub panic_on_close: bool,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub stdout: MemorySink,
    pub stderr: MemorySink,
}

impl FakeState {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

/// In-memory destination that keeps stdout and stderr apart.
pub struct FakeDestination {
    pub state: Arc<FakeState>,
}

impl FakeDestination {
    pub fn new(state: FakeState) -> (Self, Arc<FakeState>) {
        let state = Arc::new(state);
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }
}

impl fmt::Display for FakeDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fake://{}", self.state.name.lock().unwrap())
    }
}

#[async_trait]
impl Destination for FakeDestination {
    fn set_name(&mut self, name: &str) {
        *self.state.name.lock().unwrap() = name.to_string();
    }

    async fn exists(&self) -> Result<bool, DestinationError> {
        if self.state.exists_error {
            return Err(DestinationError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "metadata request timed out",
            )));
        }
        Ok(self.state.exists)
    }

    async fn open(&mut self) -> Result<StreamPair, DestinationError> {
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_open {
            return Err(DestinationError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "denied",
            )));
        }
        Ok(StreamPair::new(
            self.state.stdout.handle(),
            self.state.stderr.handle(),
        ))
    }

    async fn close(&mut self) -> Result<(), DestinationError> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        if self.state.panic_on_close {
            panic!("close blew up");
        }
        Ok(())
    }
}
