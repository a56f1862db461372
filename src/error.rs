//! Error and Result types.
use std::io;

use thiserror::Error;

/// Failures that escape a send.
///
/// Range problems never show up here: they resolve to
/// [`ResponseMode::RangeNotSatisfiable`](crate::ResponseMode::RangeNotSatisfiable).
#[derive(Error, Debug)]
pub enum Error {
    /// Writing to the sink failed, usually because the client went away.
    #[error("sink write failed: {0}")]
    Sink(#[source] io::Error),
    /// Reading from the resource failed after it was found available.
    #[error("resource read failed: {0}")]
    Resource(#[source] io::Error),
}

impl Error {
    /// The underlying I/O error, whichever side it came from.
    pub fn io(&self) -> &io::Error {
        match self {
            Error::Sink(e) | Error::Resource(e) => e,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
