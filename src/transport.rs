// src/transport.rs
//
// Single-connection TCP transport between learner and controller.
//
// One channel, two framings:
// - single-document mode for the action/observation exchange: exactly one
//   JSON document per call, no delimiter (`recv_document`);
// - line-delimited mode for the reset handshake: multiple documents may
//   arrive concatenated in one physical read and are split on '\n',
//   discarding empty lines (`recv_line`).
//
// Both receive modes share one buffered reader so no bytes are lost when
// the stream switches framing between a step exchange and a reset.
// Strictly synchronous: blocking reads, one in-flight request, no timeout
// (a non-responding peer blocks the caller indefinitely; known limitation).

use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::TransportConfig;
use crate::error::{BridgeError, BridgeResult, ExchangePhase};

/// Learner-side listening socket.
///
/// Bound once at startup after a pre-flight occupancy probe; accepts
/// exactly one controller connection for its lifetime (no reconnects).
#[derive(Debug)]
pub struct EnvListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl EnvListener {
    /// Probe the port, then bind. Refuses to start if something is
    /// already listening there, failing fast instead of degrading.
    pub fn bind(cfg: &TransportConfig) -> BridgeResult<Self> {
        // Port 0 requests an ephemeral port; nothing to probe.
        if cfg.port != 0 && TcpStream::connect((cfg.host.as_str(), cfg.port)).is_ok() {
            return Err(BridgeError::PortInUse { port: cfg.port });
        }

        let listener = TcpListener::bind((cfg.host.as_str(), cfg.port)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                BridgeError::PortInUse { port: cfg.port }
            } else {
                BridgeError::transport(
                    ExchangePhase::Connect,
                    format!("could not bind {}:{}: {e}", cfg.host, cfg.port),
                )
            }
        })?;
        let local_addr = listener.local_addr().map_err(|e| {
            BridgeError::transport(ExchangePhase::Connect, format!("local_addr failed: {e}"))
        })?;

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Actual bound address (useful with ephemeral ports).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Block until the controller connects; consumes the listener so no
    /// second connection can ever be accepted.
    pub fn accept_controller(self) -> BridgeResult<Channel> {
        let (stream, _peer) = self.listener.accept().map_err(|e| {
            BridgeError::transport(ExchangePhase::Connect, format!("accept failed: {e}"))
        })?;
        Channel::from_stream(stream)
    }
}

/// One persistent bidirectional connection carrying both framings.
#[derive(Debug)]
pub struct Channel {
    stream: Option<TcpStream>,
    reader: Option<BufReader<TcpStream>>,
}

impl Channel {
    /// Wrap an accepted or connected stream.
    pub fn from_stream(stream: TcpStream) -> BridgeResult<Self> {
        let read_half = stream.try_clone().map_err(|e| {
            BridgeError::transport(ExchangePhase::Connect, format!("stream clone failed: {e}"))
        })?;
        Ok(Self {
            stream: Some(stream),
            reader: Some(BufReader::new(read_half)),
        })
    }

    /// Controller-side connect, retrying while the learner's listener
    /// comes up.
    pub fn connect(addr: impl ToSocketAddrs + Copy, attempts: u32) -> BridgeResult<Self> {
        let mut last_err = None;
        for _ in 0..attempts.max(1) {
            match TcpStream::connect(addr) {
                Ok(stream) => return Channel::from_stream(stream),
                Err(e) => {
                    last_err = Some(e);
                    std::thread::sleep(std::time::Duration::from_millis(50));
                }
            }
        }
        Err(BridgeError::transport(
            ExchangePhase::Connect,
            format!(
                "could not connect to learner endpoint: {}",
                last_err.map(|e| e.to_string()).unwrap_or_default()
            ),
        ))
    }

    /// Write one fully-formed JSON document, no delimiter.
    pub fn send_document<T: Serialize>(
        &mut self,
        payload: &T,
        phase: ExchangePhase,
    ) -> BridgeResult<()> {
        let bytes = serde_json::to_vec(payload).map_err(|e| {
            BridgeError::transport(phase, format!("could not encode payload: {e}"))
        })?;
        self.write_all(&bytes, phase)
    }

    /// Write one JSON document terminated by '\n'.
    pub fn send_line<T: Serialize>(&mut self, payload: &T, phase: ExchangePhase) -> BridgeResult<()> {
        let mut bytes = serde_json::to_vec(payload).map_err(|e| {
            BridgeError::transport(phase, format!("could not encode payload: {e}"))
        })?;
        bytes.push(b'\n');
        self.write_all(&bytes, phase)
    }

    /// Block until exactly one JSON document has been read and decoded.
    ///
    /// Error mapping: connection closed or undecodable bytes are transport
    /// failures; a well-formed document of the wrong shape is a protocol
    /// violation.
    pub fn recv_document<T: DeserializeOwned>(&mut self, phase: ExchangePhase) -> BridgeResult<T> {
        match self.recv_document_opt(phase)? {
            Some(value) => Ok(value),
            None => Err(BridgeError::transport(
                phase,
                "connection closed while awaiting message",
            )),
        }
    }

    /// Like `recv_document`, but a clean end-of-stream before any bytes of
    /// the next document yields `None` (the peer hung up between
    /// exchanges).
    pub fn recv_document_opt<T: DeserializeOwned>(
        &mut self,
        phase: ExchangePhase,
    ) -> BridgeResult<Option<T>> {
        let reader = self.reader_mut(phase)?;
        let mut de = serde_json::Deserializer::from_reader(reader);
        match T::deserialize(&mut de) {
            Ok(value) => Ok(Some(value)),
            Err(e) => match e.classify() {
                serde_json::error::Category::Eof => Ok(None),
                serde_json::error::Category::Io => Err(BridgeError::transport(
                    phase,
                    format!("read failed: {e}"),
                )),
                serde_json::error::Category::Syntax => Err(BridgeError::transport(
                    phase,
                    format!("undecodable payload: {e}"),
                )),
                serde_json::error::Category::Data => Err(BridgeError::protocol(
                    phase,
                    format!("unexpected message shape: {e}"),
                )),
            },
        }
    }

    /// Block until one non-empty newline-terminated line is available.
    ///
    /// Concatenated documents in a single physical read are naturally
    /// split here; empty lines are discarded.
    pub fn recv_line(&mut self, phase: ExchangePhase) -> BridgeResult<String> {
        loop {
            let reader = self.reader_mut(phase)?;
            let mut line = String::new();
            let n = reader.read_line(&mut line).map_err(|e| {
                BridgeError::transport(phase, format!("read failed: {e}"))
            })?;
            if n == 0 {
                return Err(BridgeError::transport(
                    phase,
                    "connection closed while awaiting message",
                ));
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Ok(trimmed.to_string());
        }
    }

    /// Release the connection. Safe to call repeatedly; later sends and
    /// receives fail with a transport error.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.reader = None;
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    fn write_all(&mut self, bytes: &[u8], phase: ExchangePhase) -> BridgeResult<()> {
        let stream = self.stream.as_mut().ok_or_else(|| {
            BridgeError::transport(phase, "channel is closed")
        })?;
        stream
            .write_all(bytes)
            .and_then(|_| stream.flush())
            .map_err(|e| BridgeError::transport(phase, format!("write failed: {e}")))
    }

    fn reader_mut(&mut self, phase: ExchangePhase) -> BridgeResult<&mut BufReader<TcpStream>> {
        self.reader
            .as_mut()
            .ok_or_else(|| BridgeError::transport(phase, "channel is closed"))
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.close();
    }
}
