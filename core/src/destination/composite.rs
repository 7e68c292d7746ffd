use std::fmt;

use async_trait::async_trait;

use super::Destination;
use crate::error::DestinationError;
use crate::sink::{MultiSink, SinkHandle, StreamPair};

/// Several destinations presented as one.
///
/// `open` is not transactional: when a member fails to open, the members
/// opened before it stay open until `close` is called.
#[derive(Default)]
pub struct CompositeDestination {
    members: Vec<Box<dyn Destination>>,
}

impl CompositeDestination {
    pub fn new(members: Vec<Box<dyn Destination>>) -> Self {
        Self { members }
    }

    pub fn push(&mut self, member: Box<dyn Destination>) {
        self.members.push(member);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl fmt::Display for CompositeDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("multiple log destination[")?;
        for (idx, member) in self.members.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{member}")?;
        }
        f.write_str("]")
    }
}

fn member_error(member: &dyn Destination, source: DestinationError) -> DestinationError {
    DestinationError::Member {
        location: member.to_string(),
        source: Box::new(source),
    }
}

#[async_trait]
impl Destination for CompositeDestination {
    fn set_name(&mut self, name: &str) {
        for member in &mut self.members {
            member.set_name(name);
        }
    }

    async fn exists(&self) -> Result<bool, DestinationError> {
        if self.members.is_empty() {
            return Err(DestinationError::Empty);
        }
        for member in &self.members {
            match member.exists().await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(err) => return Err(member_error(member.as_ref(), err)),
            }
        }
        Ok(false)
    }

    async fn open(&mut self) -> Result<StreamPair, DestinationError> {
        if self.members.is_empty() {
            return Err(DestinationError::Empty);
        }
        let mut stdouts = Vec::with_capacity(self.members.len());
        let mut stderrs = Vec::with_capacity(self.members.len());
        let mut split = false;

        for member in &mut self.members {
            let pair = match member.open().await {
                Ok(pair) => pair,
                Err(err) => return Err(member_error(member.as_ref(), err)),
            };
            if !pair.is_combined() {
                split = true;
            }
            stdouts.push(pair.stdout);
            stderrs.push(pair.stderr);
        }

        if split {
            Ok(StreamPair::new(
                SinkHandle::new(MultiSink::new(stdouts)),
                SinkHandle::new(MultiSink::new(stderrs)),
            ))
        } else {
            Ok(StreamPair::combined(SinkHandle::new(MultiSink::new(stdouts))))
        }
    }

    async fn close(&mut self) -> Result<(), DestinationError> {
        let mut first_err = None;
        for member in &mut self.members {
            if let Err(err) = member.close().await {
                tracing::error!(destination = %member, error = %err, "log destination close failed");
                first_err.get_or_insert_with(|| member_error(member.as_ref(), err));
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
