//! Memcached Client
//!
//! Blocking client for the memcached text protocol over a single TCP
//! connection. Calls block for their full duration; there is no retry.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration as StdDuration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::Pool;
use crate::error::{CacheError, Result};
use crate::medium::network::{ClientError, ClientResult, KeyValueClient, NetworkMedium};

/// Longest TTL memcached treats as relative; longer values are Unix timestamps.
pub const MAX_RELATIVE_EXPTIME: u32 = 60 * 60 * 24 * 30;

/// Largest value length accepted in a `VALUE` header (memcached's item size ceiling).
pub const MAX_VALUE_LEN: usize = 1024 * 1024 * 1024;

/// Converts a relative TTL into the `exptime` field memcached expects.
fn exptime(ttl_secs: u32) -> i64 {
    if ttl_secs > MAX_RELATIVE_EXPTIME {
        Utc::now().timestamp() + i64::from(ttl_secs)
    } else {
        i64::from(ttl_secs)
    }
}

// == Memcached Client ==
#[derive(Debug)]
pub struct MemcachedClient {
    servers: Vec<String>,
    connected_to: String,
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    closed: bool,
}

impl MemcachedClient {
    // == Constructor ==
    /// Connects to the first reachable server in `servers`.
    ///
    /// # Errors
    /// `StorageUnavailable` when no server accepts a connection.
    pub fn connect(servers: &[String], timeout: Option<StdDuration>) -> Result<Self> {
        if servers.is_empty() {
            return Err(CacheError::StorageUnavailable(
                "no memcached servers configured".to_string(),
            ));
        }

        let mut last_error = String::new();
        for server in servers {
            match Self::open_stream(server, timeout) {
                Ok(stream) => {
                    let writer = stream.try_clone().map_err(|err| {
                        CacheError::StorageUnavailable(format!("{}: {}", server, err))
                    })?;
                    info!("Connected to memcached at {}", server);
                    return Ok(Self {
                        servers: servers.to_vec(),
                        connected_to: server.clone(),
                        reader: BufReader::new(stream),
                        writer,
                        closed: false,
                    });
                }
                Err(err) => {
                    warn!("Memcached server {} unreachable: {}", server, err);
                    last_error = format!("{}: {}", server, err);
                }
            }
        }

        Err(CacheError::StorageUnavailable(last_error))
    }

    fn open_stream(server: &str, timeout: Option<StdDuration>) -> io::Result<TcpStream> {
        let stream = match timeout {
            Some(timeout) => {
                let addr = server.to_socket_addrs()?.next().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "address did not resolve")
                })?;
                TcpStream::connect_timeout(&addr, timeout)?
            }
            None => TcpStream::connect(server)?,
        };
        stream.set_read_timeout(timeout)?;
        stream.set_write_timeout(timeout)?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    /// Configured server list.
    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    /// Server the connection was established with.
    pub fn connected_to(&self) -> &str {
        &self.connected_to
    }

    // == Protocol Helpers ==
    fn send(&mut self, command: &str, payload: Option<&[u8]>) -> ClientResult<()> {
        if self.closed {
            return Err(ClientError::Remote(format!(
                "connection to {} was closed after a protocol error",
                self.connected_to
            )));
        }
        self.writer.write_all(command.as_bytes())?;
        self.writer.write_all(b"\r\n")?;
        if let Some(payload) = payload {
            self.writer.write_all(payload)?;
            self.writer.write_all(b"\r\n")?;
        }
        self.writer.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> ClientResult<String> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed").into());
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Sends `command` and returns the first reply line, mapping error replies.
    fn request(&mut self, command: &str, payload: Option<&[u8]>) -> ClientResult<String> {
        self.send(command, payload)?;
        let line = self.read_line()?;
        remote_error(&line)?;
        Ok(line)
    }

    /// Reads a `<len>` byte data block and the trailing `END` line.
    fn read_value(&mut self, len: usize) -> ClientResult<Vec<u8>> {
        let mut data = Vec::new();
        self.reader.by_ref().take(len as u64 + 2).read_to_end(&mut data)?;
        if data.len() != len + 2 || !data.ends_with(b"\r\n") {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "value truncated").into());
        }
        data.truncate(len);

        let end = self.read_line()?;
        if end != "END" {
            return Err(unexpected(&end));
        }
        Ok(data)
    }

    /// Shuts the connection down; the stream position is unknown after `err`.
    fn close(&mut self, err: ClientError) -> ClientError {
        warn!("Closing memcached connection to {}: {}", self.connected_to, err);
        self.closed = true;
        if let Err(shutdown) = self.writer.shutdown(Shutdown::Both) {
            warn!("Shutdown of {} failed: {}", self.connected_to, shutdown);
        }
        err
    }
}

impl<V> Pool<NetworkMedium<MemcachedClient>, V>
where
    V: Serialize + DeserializeOwned + Clone + Send,
{
    /// Servers the underlying client was configured with.
    pub fn servers(&self) -> &[String] {
        self.medium().client().servers()
    }
}

/// Maps `ERROR`, `CLIENT_ERROR` and `SERVER_ERROR` replies.
fn remote_error(line: &str) -> ClientResult<()> {
    if line == "ERROR" {
        return Err(ClientError::Remote("unknown command".to_string()));
    }
    for prefix in ["CLIENT_ERROR", "SERVER_ERROR"] {
        if line.starts_with(prefix) {
            return Err(ClientError::Remote(line.to_string()));
        }
    }
    Ok(())
}

fn unexpected(line: &str) -> ClientError {
    ClientError::Remote(format!("unexpected reply: {}", line))
}

impl KeyValueClient for MemcachedClient {
    fn get(&mut self, key: &str) -> ClientResult<Vec<u8>> {
        let header = self.request(&format!("get {}", key), None)?;
        if header == "END" {
            return Err(ClientError::NotFound);
        }

        // VALUE <key> <flags> <bytes> [<cas>]
        let len: usize = header
            .strip_prefix("VALUE ")
            .and_then(|rest| rest.split_whitespace().nth(2))
            .and_then(|len| len.parse().ok())
            .ok_or_else(|| unexpected(&header))?;
        if len > MAX_VALUE_LEN {
            return Err(self.close(unexpected(&header)));
        }

        self.read_value(len).map_err(|err| self.close(err))
    }

    fn set(&mut self, key: &str, value: &[u8], ttl_secs: u32) -> ClientResult<()> {
        let command = format!("set {} 0 {} {}", key, exptime(ttl_secs), value.len());
        match self.request(&command, Some(value))?.as_str() {
            "STORED" => Ok(()),
            "NOT_STORED" => Err(ClientError::Remote("not stored".to_string())),
            other => Err(unexpected(other)),
        }
    }

    fn delete(&mut self, key: &str) -> ClientResult<()> {
        match self.request(&format!("delete {}", key), None)?.as_str() {
            "DELETED" => Ok(()),
            "NOT_FOUND" => Err(ClientError::NotFound),
            other => Err(unexpected(other)),
        }
    }

    fn touch(&mut self, key: &str, ttl_secs: u32) -> ClientResult<()> {
        let command = format!("touch {} {}", key, exptime(ttl_secs));
        match self.request(&command, None)?.as_str() {
            "TOUCHED" => Ok(()),
            "NOT_FOUND" => Err(ClientError::NotFound),
            other => Err(unexpected(other)),
        }
    }

    fn increment(&mut self, key: &str, by: u64) -> ClientResult<u64> {
        let reply = self.request(&format!("incr {} {}", key, by), None)?;
        parse_counter(&reply)
    }

    fn decrement(&mut self, key: &str, by: u64) -> ClientResult<u64> {
        let reply = self.request(&format!("decr {} {}", key, by), None)?;
        parse_counter(&reply)
    }

    fn version(&mut self) -> ClientResult<String> {
        let reply = self.request("version", None)?;
        reply
            .strip_prefix("VERSION ")
            .map(str::to_string)
            .ok_or_else(|| unexpected(&reply))
    }

    fn flush_all(&mut self) -> ClientResult<()> {
        match self.request("flush_all", None)?.as_str() {
            "OK" => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

fn parse_counter(reply: &str) -> ClientResult<u64> {
    if reply == "NOT_FOUND" {
        return Err(ClientError::NotFound);
    }
    reply.trim().parse().map_err(|_| unexpected(reply))
}
