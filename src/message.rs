use crate::error::{Error, Result};
use crate::frame::{Frame, OpCode};

/// A logical record delivered to the application: one or more data frames
/// concatenated in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
}

impl Message {
    /// Builds a `Message` from an already-assembled frame (final_fragment
    /// true, payload already concatenated). Used by `Assembler`.
    pub fn from_frame(frame: Frame) -> Result<Self> {
        match frame.opcode {
            OpCode::Text => Ok(Message::Text(String::from_utf8(frame.payload)?)),
            OpCode::Binary => Ok(Message::Binary(frame.payload)),
            other => Err(Error::InvalidOpcode(other.as_u8())),
        }
    }

    pub fn opcode(&self) -> OpCode {
        match self {
            Message::Text(_) => OpCode::Text,
            Message::Binary(_) => OpCode::Binary,
        }
    }

    pub fn as_binary(&self) -> Vec<u8> {
        match self {
            Message::Text(text) => text.as_bytes().to_vec(),
            Message::Binary(data) => data.clone(),
        }
    }

    pub fn as_text(&self) -> Result<String> {
        match self {
            Message::Text(text) => Ok(text.clone()),
            Message::Binary(data) => Ok(String::from_utf8(data.clone())?),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Message::Text(text) => text.len(),
            Message::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts this message into its unfragmented wire representation: a
    /// single data frame with no masking key set. Callers that need
    /// fragmentation go through `Frame::fragment` instead (see
    /// `Connection::send`).
    pub fn into_frame(self) -> Frame {
        match self {
            Message::Text(text) => Frame::text(text.into_bytes()),
            Message::Binary(data) => Frame::binary(data),
        }
    }
}
