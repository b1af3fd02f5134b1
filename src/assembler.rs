//! Folds a sequence of data frames, with interleaved control frames, into
//! complete messages. Grounded on the fragmentation bookkeeping in the
//! teacher's `read.rs::poll_messages`, pulled out of the I/O loop so it can
//! be driven by a synchronous `Connection` instead.

use crate::error::{Error, Result};
use crate::frame::{Frame, OpCode};
use crate::message::Message;

struct InProgress {
    opcode: OpCode,
    payload: Vec<u8>,
}

/// What the assembler did with one incoming frame.
pub enum Fed {
    /// The frame was a control frame; the caller dispatches it and keeps
    /// reading without disturbing the in-progress data message.
    Control(Frame),
    /// A message is still being fragmented; nothing to deliver yet.
    Pending,
    /// The final fragment arrived; the completed message is ready.
    Complete(Message),
}

#[derive(Default)]
pub struct Assembler {
    in_progress: Option<InProgress>,
    max_message_size: Option<usize>,
}

impl Assembler {
    pub fn new(max_message_size: Option<usize>) -> Self {
        Self {
            in_progress: None,
            max_message_size,
        }
    }

    /// Feeds one decoded frame into the assembler.
    pub fn feed(&mut self, frame: Frame) -> Result<Fed> {
        if frame.opcode.is_control() {
            return Ok(Fed::Control(frame));
        }

        match frame.opcode {
            OpCode::Continuation => {
                let in_progress = self
                    .in_progress
                    .as_mut()
                    .ok_or(Error::InvalidContinuationFrame)?;
                in_progress.payload.extend_from_slice(&frame.payload);
                if let Some(max) = self.max_message_size {
                    if in_progress.payload.len() > max {
                        return Err(Error::MaxMessageSize);
                    }
                }
                if !frame.final_fragment {
                    return Ok(Fed::Pending);
                }
                let in_progress = self.in_progress.take().unwrap();
                let message = Message::from_frame(Frame::new(
                    true,
                    in_progress.opcode,
                    in_progress.payload,
                ))?;
                Ok(Fed::Complete(message))
            }
            OpCode::Text | OpCode::Binary => {
                if self.in_progress.is_some() {
                    return Err(Error::InvalidFrameFragmentation);
                }
                if frame.final_fragment {
                    let message = Message::from_frame(frame)?;
                    return Ok(Fed::Complete(message));
                }
                self.in_progress = Some(InProgress {
                    opcode: frame.opcode,
                    payload: frame.payload,
                });
                Ok(Fed::Pending)
            }
            OpCode::Close | OpCode::Ping | OpCode::Pong => unreachable!("handled above"),
        }
    }
}
