//! Response sinks.
//!
//! A [`ResponseWriter`] is the byte sink the core writes responses into:
//! headers, then a status line commit, then body bytes. Writing body bytes
//! before committing the head commits an implicit `200 OK`.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use axum::http::{HeaderMap, StatusCode};

/// The writable response target supplied by the transport.
pub trait ResponseWriter: Write + Send {
    /// Headers sent with the head. Changes after the head is written are ignored.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Commit the status and headers. Fails if the head was already written.
    fn write_head(&mut self, status: StatusCode) -> io::Result<()>;

    /// Whether the head has been committed.
    fn head_written(&self) -> bool;
}

/// Everything a [`BufferWriter`] has received.
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or("")
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

/// An in-memory writer, readable through a [`Recording`] after dispatch.
#[derive(Debug)]
pub struct BufferWriter {
    headers: HeaderMap,
    shared: Arc<Mutex<Recorded>>,
    committed: bool,
}

/// Read side of a [`BufferWriter`].
#[derive(Debug, Clone)]
pub struct Recording {
    shared: Arc<Mutex<Recorded>>,
}

impl Recording {
    /// Snapshot of what has been written so far.
    pub fn snapshot(&self) -> Recorded {
        self.shared
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl BufferWriter {
    pub fn new() -> (Self, Recording) {
        let shared = Arc::new(Mutex::new(Recorded::default()));
        (
            Self {
                headers: HeaderMap::new(),
                shared: Arc::clone(&shared),
                committed: false,
            },
            Recording { shared },
        )
    }

    fn with_recorded<T>(&self, f: impl FnOnce(&mut Recorded) -> T) -> io::Result<T> {
        let mut recorded = self
            .shared
            .lock()
            .map_err(|_| io::Error::other("recording lock poisoned"))?;
        Ok(f(&mut recorded))
    }
}

impl Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.committed {
            self.write_head(StatusCode::OK)?;
        }
        self.with_recorded(|r| r.body.extend_from_slice(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ResponseWriter for BufferWriter {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_head(&mut self, status: StatusCode) -> io::Result<()> {
        if self.committed {
            return Err(io::Error::other("response head already written"));
        }
        self.committed = true;
        let headers = self.headers.clone();
        self.with_recorded(|r| {
            r.status = Some(status);
            r.headers = headers;
        })
    }

    fn head_written(&self) -> bool {
        self.committed
    }
}
