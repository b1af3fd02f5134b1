//! The per-socket control-frame state machine (spec §4.G): OPEN,
//! CLOSING_LOCAL, CLOSING_REMOTE, CLOSED, plus automatic PING/PONG and close
//! handshake bookkeeping. Grounded on the teacher's `connection.rs`
//! `WSConnection` (frame read/write loop, ping/pong/close dispatch),
//! rewritten against a blocking `Transport` with the internal-mutability
//! split the teacher's tokio `Stream` impl doesn't need: every field lives
//! behind a `Mutex` so `send`/`ping`/`close` can run from another thread
//! while `receive_forever` blocks in its read loop on `Arc<Connection>`.

use crate::assembler::{Assembler, Fed};
use crate::error::{Error, Result};
use crate::extension::Hook;
use crate::frame::{Frame, OpCode, MAX_CONTROL_FRAME_PAYLOAD};
use crate::message::Message;
use crate::transport::Transport;
use log::{debug, warn};
use std::net::Shutdown;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    ClosingLocal,
    ClosingRemote,
    Closed,
}

/// One step of `recv`: either a complete application message, a control
/// notification, or the close event that ends the connection.
pub enum Event {
    Message(Message),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Closed(Option<u16>, String),
}

/// Callbacks for `receive_forever`. All methods default to a no-op so
/// callers only override what they need.
pub trait Handler {
    fn on_open(&mut self, _conn: &Connection) {}
    fn on_message(&mut self, _conn: &Connection, _message: Message) {}
    fn on_ping(&mut self, _conn: &Connection, _payload: Vec<u8>) {}
    fn on_pong(&mut self, _conn: &Connection, _payload: Vec<u8>) {}
    fn on_close(&mut self, _conn: &Connection, _code: Option<u16>, _reason: String) {}
    fn on_error(&mut self, _conn: &Connection, _error: &Error) {}
}

pub struct Connection {
    transport: Mutex<Transport>,
    hooks_send: Mutex<Vec<Box<dyn Hook>>>,
    hooks_recv: Mutex<Vec<Box<dyn Hook>>>,
    assembler: Mutex<Assembler>,
    state: Mutex<State>,
    outstanding_ping: Mutex<Option<Vec<u8>>>,
    /// Clients must mask every frame they send; servers must never mask.
    mask_outgoing: bool,
    max_frame_size: usize,
}

impl Connection {
    pub fn new(
        transport: Transport,
        hooks_send: Vec<Box<dyn Hook>>,
        hooks_recv: Vec<Box<dyn Hook>>,
        mask_outgoing: bool,
        max_frame_size: usize,
        max_message_size: usize,
    ) -> Self {
        Connection {
            transport: Mutex::new(transport),
            hooks_send: Mutex::new(hooks_send),
            hooks_recv: Mutex::new(hooks_recv),
            assembler: Mutex::new(Assembler::new(Some(max_message_size))),
            state: Mutex::new(State::Open),
            outstanding_ping: Mutex::new(None),
            mask_outgoing,
            max_frame_size,
        }
    }

    pub fn send(&self, message: Message) -> Result<()> {
        self.send_fragmented(message, None)
    }

    pub fn send_fragmented(&self, message: Message, fragment_size: Option<usize>) -> Result<()> {
        self.ensure_open()?;
        let frame = message.into_frame();
        let frames = match fragment_size {
            Some(size) if size > self.max_frame_size => {
                return Err(Error::CustomFragmentSizeExceeded(size, self.max_frame_size));
            }
            Some(size) => frame.fragment(size, false)?,
            None => vec![frame],
        };
        self.write_frames(frames)
    }

    pub fn ping(&self, payload: Vec<u8>) -> Result<()> {
        if payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
            return Err(Error::ControlFramePayloadSize);
        }
        self.ensure_open()?;
        *self.outstanding_ping.lock().unwrap() = Some(payload.clone());
        self.write_frames(vec![Frame::ping(payload)])
    }

    /// Initiates or completes the close handshake. Calling this after the
    /// peer already sent CLOSE (state `ClosingRemote`) echoes and shuts the
    /// transport down immediately. Calling it first moves to `ClosingLocal`,
    /// sends CLOSE, then blocks draining frames (discarding any interleaved
    /// data/control frames) until the peer's CLOSE arrives — the
    /// conservative default spec.md §4.G/§9 calls out as an open question.
    pub fn close(&self, code: Option<u16>, reason: &str) -> Result<()> {
        let prior = {
            let mut state = self.state.lock().unwrap();
            let prior = *state;
            match prior {
                State::Closed | State::ClosingLocal => return Ok(()),
                State::Open => *state = State::ClosingLocal,
                State::ClosingRemote => *state = State::Closed,
            }
            prior
        };

        self.write_frames(vec![Frame::close(code, reason)])?;

        if prior == State::ClosingRemote {
            self.transport.lock().unwrap().shutdown(Shutdown::Both)?;
            return Ok(());
        }

        loop {
            match self.recv() {
                Ok(Event::Closed(_, _)) | Err(Error::Closed) => return Ok(()),
                Ok(_) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Reads and returns the next application message or control event.
    /// Transparently answers PINGs with a PONG and drives the CLOSE state
    /// machine; callers only see the event after that bookkeeping is done.
    pub fn recv(&self) -> Result<Event> {
        loop {
            let raw = {
                let mut transport = self.transport.lock().unwrap();
                Frame::decode(&mut *transport)?
            };

            let frame = {
                let mut hooks = self.hooks_recv.lock().unwrap();
                let mut frame = raw;
                for hook in hooks.iter_mut() {
                    frame = hook.on_recv(frame)?;
                }
                frame
            };
            if frame.rsv1 || frame.rsv2 || frame.rsv3 {
                return Err(Error::RSVNotZero);
            }

            match frame.opcode {
                OpCode::Ping => {
                    let payload = frame.payload.clone();
                    self.write_frames(vec![Frame::pong(payload.clone())])?;
                    return Ok(Event::Ping(payload));
                }
                OpCode::Pong => {
                    let mut outstanding = self.outstanding_ping.lock().unwrap();
                    match outstanding.take() {
                        Some(expected) if expected == frame.payload => return Ok(Event::Pong(frame.payload)),
                        Some(expected) => {
                            *outstanding = Some(expected);
                            return Err(Error::PingPayloadMismatch);
                        }
                        None => return Err(Error::UnsolicitedPong),
                    }
                }
                OpCode::Close => return self.handle_close(frame),
                OpCode::Text | OpCode::Binary | OpCode::Continuation => {
                    match self.assembler.lock().unwrap().feed(frame)? {
                        Fed::Control(_) => unreachable!("control frames are dispatched before reaching the assembler"),
                        Fed::Pending => continue,
                        Fed::Complete(message) => return Ok(Event::Message(message)),
                    }
                }
            }
        }
    }

    fn handle_close(&self, frame: Frame) -> Result<Event> {
        let parsed = frame.close_payload()?;
        let (code, reason) = match parsed {
            Some((code, reason)) => (Some(code), reason),
            None => (None, String::new()),
        };

        let mut shutdown_after = false;
        {
            let mut state = self.state.lock().unwrap();
            match *state {
                State::ClosingLocal => {
                    *state = State::Closed;
                    shutdown_after = true;
                }
                _ => *state = State::ClosingRemote,
            }
        }

        if shutdown_after {
            self.transport.lock().unwrap().shutdown(Shutdown::Both)?;
        } else {
            self.write_frames(vec![Frame::close(code, &reason)])?;
            *self.state.lock().unwrap() = State::Closed;
            self.transport.lock().unwrap().shutdown(Shutdown::Both)?;
        }

        Ok(Event::Closed(code, reason))
    }

    /// Drives `recv` in a loop, dispatching to `handler` until the close
    /// handshake completes or an unrecoverable error occurs.
    pub fn receive_forever(&self, handler: &mut dyn Handler) -> Result<()> {
        handler.on_open(self);
        loop {
            match self.recv() {
                Ok(Event::Message(message)) => handler.on_message(self, message),
                Ok(Event::Ping(payload)) => handler.on_ping(self, payload),
                Ok(Event::Pong(payload)) => handler.on_pong(self, payload),
                Ok(Event::Closed(code, reason)) => {
                    handler.on_close(self, code, reason);
                    return Ok(());
                }
                Err(Error::Closed) => {
                    handler.on_close(self, None, String::new());
                    return Ok(());
                }
                Err(e) => {
                    warn!("connection error: {e}");
                    handler.on_error(self, &e);
                    return Err(e);
                }
            }
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if *self.state.lock().unwrap() == State::Open {
            Ok(())
        } else {
            Err(Error::Closed)
        }
    }

    /// Applies the send-hook pipeline and this side's masking policy (every
    /// frame a client sends is masked, a server's never are, per RFC 6455
    /// §5.1) to each frame in turn, then writes them while holding the
    /// transport lock for the whole batch so a multi-fragment message is
    /// never interleaved with another thread's send.
    fn write_frames(&self, frames: Vec<Frame>) -> Result<()> {
        let mut transport = self.transport.lock().unwrap();
        let mut hooks = self.hooks_send.lock().unwrap();
        for mut frame in frames {
            for hook in hooks.iter_mut() {
                frame = hook.on_send(frame)?;
            }
            frame = frame.with_mask(self.mask_outgoing);
            debug!("writing frame: opcode={:?} final={} len={}", frame.opcode, frame.final_fragment, frame.payload.len());
            frame.encode(&mut *transport)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn loopback_pair() -> (Transport, Transport) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::net::TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (Transport::from_tcp(client), Transport::from_tcp(server))
    }

    fn connection(transport: Transport, mask_outgoing: bool) -> Connection {
        Connection::new(transport, Vec::new(), Vec::new(), mask_outgoing, 16 << 20, 64 << 20)
    }

    #[test]
    fn sends_and_receives_a_text_message() {
        let (client_t, server_t) = loopback_pair();
        let client = connection(client_t, true);
        let server = connection(server_t, false);

        client.send(Message::Text("hello".to_string())).unwrap();
        match server.recv().unwrap() {
            Event::Message(Message::Text(text)) => assert_eq!(text, "hello"),
            _ => panic!("expected a text message"),
        }
    }

    #[test]
    fn answers_ping_with_pong_and_surfaces_the_event() {
        let (client_t, server_t) = loopback_pair();
        let client = connection(client_t, true);
        let server = connection(server_t, false);

        client.ping(vec![1, 2, 3]).unwrap();
        match server.recv().unwrap() {
            Event::Ping(payload) => assert_eq!(payload, vec![1, 2, 3]),
            _ => panic!("expected a ping event"),
        }
        match client.recv().unwrap() {
            Event::Pong(payload) => assert_eq!(payload, vec![1, 2, 3]),
            _ => panic!("expected a pong event"),
        }
    }

    #[test]
    fn unsolicited_pong_is_rejected() {
        let (client_t, server_t) = loopback_pair();
        let client = connection(client_t, true);
        let server = connection(server_t, false);

        client.write_frames(vec![Frame::pong(Vec::new())]).unwrap();
        assert!(matches!(server.recv(), Err(Error::UnsolicitedPong)));
    }

    #[test]
    fn close_handshake_completes_from_either_side() {
        let (client_t, server_t) = loopback_pair();
        let client = std::sync::Arc::new(connection(client_t, true));
        let server = connection(server_t, false);

        // close() now blocks draining until the peer's echo arrives, so the
        // server side needs its own thread to answer while the client waits.
        let client_for_close = client.clone();
        let closer = std::thread::spawn(move || client_for_close.close(Some(1000), "bye"));

        match server.recv().unwrap() {
            Event::Closed(Some(1000), reason) => assert_eq!(reason, "bye"),
            _ => panic!("expected a closed event"),
        }

        closer.join().unwrap().unwrap();
    }

    #[test]
    fn fragment_size_above_max_frame_size_is_rejected() {
        let (client_t, _server_t) = loopback_pair();
        let client = connection(client_t, true);
        let err = client.send_fragmented(Message::Binary(vec![0; 10]), Some(usize::MAX));
        assert!(matches!(err, Err(Error::CustomFragmentSizeExceeded(_, _))));
    }

    impl std::fmt::Debug for Event {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Event::Message(_) => write!(f, "Message"),
                Event::Ping(_) => write!(f, "Ping"),
                Event::Pong(_) => write!(f, "Pong"),
                Event::Closed(code, reason) => write!(f, "Closed({code:?}, {reason:?})"),
            }
        }
    }
}
