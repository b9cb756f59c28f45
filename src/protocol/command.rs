//! Request definitions
//!
//! The first frame on every connection is an action token; each action then
//! carries its own fixed list of argument frames.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use crate::error::{Result, RfsError};

use super::frame::{read_frame, write_frame};

/// Action tokens understood by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Write,
    Get,
    Remove,
    List,
    Exit,
}

impl Action {
    /// The token as sent on the wire
    pub fn token(&self) -> &'static str {
        match self {
            Action::Write => "WRITE",
            Action::Get => "GET",
            Action::Remove => "RM",
            Action::List => "LS",
            Action::Exit => "EXIT",
        }
    }

    /// Parse a raw token frame
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let token = String::from_utf8_lossy(bytes);
        token.parse()
    }
}

impl FromStr for Action {
    type Err = RfsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "WRITE" => Ok(Action::Write),
            "GET" => Ok(Action::Get),
            "RM" => Ok(Action::Remove),
            "LS" => Ok(Action::List),
            "EXIT" => Ok(Action::Exit),
            other => Err(RfsError::UnknownAction(other.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Which version GET should return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelector {
    /// Whatever the version index says is newest
    Latest,

    /// One specific version (0 = the unversioned original)
    Exact(u64),
}

impl VersionSelector {
    /// Wire sentinel for [`VersionSelector::Latest`]
    pub const LATEST_SENTINEL: i64 = -1;

    /// Signed wire value; any negative number means latest
    pub fn to_wire(self) -> i64 {
        match self {
            VersionSelector::Latest => Self::LATEST_SENTINEL,
            VersionSelector::Exact(v) => v.min(i64::MAX as u64) as i64,
        }
    }

    pub fn from_wire(value: i64) -> Self {
        if value < 0 {
            VersionSelector::Latest
        } else {
            VersionSelector::Exact(value as u64)
        }
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; 8] = bytes.try_into().map_err(|_| {
            RfsError::Protocol(format!(
                "Version selector must be 8 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self::from_wire(i64::from_be_bytes(raw)))
    }
}

impl From<Option<u64>> for VersionSelector {
    fn from(version: Option<u64>) -> Self {
        version.map_or(VersionSelector::Latest, VersionSelector::Exact)
    }
}

/// A parsed request header
///
/// WRITE content is not part of the request; it follows as its own
/// streamed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Store a new version of `path`
    Write { path: String },

    /// Fetch one version of `path`
    Get { path: String, version: VersionSelector },

    /// Delete every version of `path`
    Remove { path: String },

    /// Describe every version of `path`
    List { path: String },

    /// Stop the server
    Exit,
}

impl Request {
    /// Get the action type
    pub fn action(&self) -> Action {
        match self {
            Request::Write { .. } => Action::Write,
            Request::Get { .. } => Action::Get,
            Request::Remove { .. } => Action::Remove,
            Request::List { .. } => Action::List,
            Request::Exit => Action::Exit,
        }
    }
}

/// Write a request header (action token plus argument frames)
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<()> {
    write_frame(writer, request.action().token().as_bytes())?;

    match request {
        Request::Write { path } | Request::Remove { path } | Request::List { path } => {
            write_frame(writer, path.as_bytes())?;
        }
        Request::Get { path, version } => {
            write_frame(writer, path.as_bytes())?;
            write_frame(writer, &version.to_wire().to_be_bytes())?;
        }
        Request::Exit => {}
    }

    Ok(())
}

/// Read a request header
///
/// Unknown tokens surface as [`RfsError::UnknownAction`] before any argument
/// frame is consumed.
pub fn read_request<R: Read>(reader: &mut R) -> Result<Request> {
    let action = Action::from_bytes(&read_frame(reader)?)?;

    let request = match action {
        Action::Write => Request::Write {
            path: read_path(reader)?,
        },
        Action::Get => {
            let path = read_path(reader)?;
            let version = VersionSelector::decode(&read_frame(reader)?)?;
            Request::Get { path, version }
        }
        Action::Remove => Request::Remove {
            path: read_path(reader)?,
        },
        Action::List => Request::List {
            path: read_path(reader)?,
        },
        Action::Exit => Request::Exit,
    };

    Ok(request)
}

fn read_path<R: Read>(reader: &mut R) -> Result<String> {
    let bytes = read_frame(reader)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| RfsError::Protocol("Remote path is not valid UTF-8".to_string()))
}
