//! Client
//!
//! Blocking client for the rfs protocol. Each method performs one action
//! and consumes the client, since the server closes the connection after
//! every action.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::net::TcpStream;
use std::path::Path;

use crate::config::ClientConfig;
use crate::error::{Result, RfsError};
use crate::protocol::{
    copy_exact, read_reply, read_reply_header, write_frame_from, write_request, Reply, Request,
    Status, VersionSelector, MAX_MESSAGE_SIZE,
};

/// One connection to an rfs server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    /// Connect to `addr` (host:port)
    pub fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .map_err(|e| RfsError::Network(format!("Unable to connect to {}: {}", addr, e)))?;
        stream.set_nodelay(true)?;
        tracing::debug!("Connected with server {} successfully", addr);

        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
        })
    }

    /// Connect to the server named by a client config
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::connect(&config.server_addr)
    }

    /// WRITE a local file to `remote`
    pub fn write_file(self, local: &Path, remote: &str) -> Result<Reply> {
        let mut file = File::open(local)?;
        let len = file.metadata()?.len();
        self.write_from(remote, &mut file, len)
    }

    /// WRITE in-memory content to `remote`
    pub fn write_bytes(self, remote: &str, data: &[u8]) -> Result<Reply> {
        let mut src = data;
        self.write_from(remote, &mut src, data.len() as u64)
    }

    /// WRITE exactly `len` bytes from `src` to `remote`
    pub fn write_from<R: Read>(mut self, remote: &str, src: &mut R, len: u64) -> Result<Reply> {
        let request = Request::Write {
            path: remote.to_string(),
        };
        write_request(&mut self.writer, &request)?;
        write_frame_from(&mut self.writer, src, len)?;
        self.finish()
    }

    /// GET one version of `remote`, streaming the content into `sink`
    ///
    /// Nothing is written to `sink` unless the server found the file.
    /// Returns the trailing status reply.
    pub fn get_into<W: Write + ?Sized>(
        mut self,
        remote: &str,
        version: VersionSelector,
        sink: &mut W,
    ) -> Result<Reply> {
        let request = Request::Get {
            path: remote.to_string(),
            version,
        };
        write_request(&mut self.writer, &request)?;

        let (status, len) = read_reply_header(&mut self.reader)?;
        if status != Status::Ok {
            return Err(self.read_failure(status, len));
        }

        copy_exact(&mut self.reader, sink, len)?;
        sink.flush()?;
        self.finish()
    }

    /// GET one version of `remote` into memory
    pub fn get_bytes(self, remote: &str, version: VersionSelector) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.get_into(remote, version, &mut data)?;
        Ok(data)
    }

    /// RM every version of `remote`
    pub fn remove(self, remote: &str) -> Result<Reply> {
        self.simple(Request::Remove {
            path: remote.to_string(),
        })
    }

    /// LS the versions of `remote`
    pub fn list(self, remote: &str) -> Result<Reply> {
        self.simple(Request::List {
            path: remote.to_string(),
        })
    }

    /// Ask the server to shut down
    pub fn exit(self) -> Result<Reply> {
        self.simple(Request::Exit)
    }

    fn simple(mut self, request: Request) -> Result<Reply> {
        write_request(&mut self.writer, &request)?;
        self.finish()
    }

    /// Read the final reply, mapping failures to [`RfsError::Remote`]
    fn finish(mut self) -> Result<Reply> {
        read_reply(&mut self.reader)?.into_result()
    }

    fn read_failure(&mut self, status: Status, len: u64) -> RfsError {
        let mut body = Vec::new();
        let limit = len.min(MAX_MESSAGE_SIZE);
        match (&mut self.reader).take(limit).read_to_end(&mut body) {
            Ok(_) => RfsError::Remote(status, String::from_utf8_lossy(&body).into_owned()),
            Err(e) => e.into(),
        }
    }
}
