//! `deflate-frame`: per-frame DEFLATE compression (spec §4.E), the worked
//! example of the extension pipeline in `extension`. Grounded on the
//! teacher's `decoder.rs`/`compress.rs` flate2 usage, adapted from the
//! teacher's permessage-style whole-message compression to the narrower
//! per-frame contract the spec requires (skip-thresholds, the quirk 0x00
//! tail octet, and the sync-flush trim).

use crate::error::{Error, Result};
use crate::extension::{Extension, ExtensionParams, Hook, ParamValue};
use crate::frame::{Frame, OpCode};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

const NAME: &str = "deflate-frame";
const MAX_WINDOW_BITS: &str = "max_window_bits";
const NO_CONTEXT_TAKEOVER: &str = "no_context_takeover";
const DEFAULT_WINDOW_BITS: u8 = 15;

/// Frames at or below this size are sent uncompressed; DEFLATE's own
/// overhead would make them larger, not smaller.
const COMPRESSION_THRESHOLD: usize = 64;

const SYNC_FLUSH_TRAILER: [u8; 4] = [0x00, 0x00, 0xFF, 0xFF];

pub struct DeflateFrameExtension;

impl Extension for DeflateFrameExtension {
    fn name(&self) -> &str {
        NAME
    }

    fn reserves_rsv1(&self) -> bool {
        true
    }

    fn accept(&self, offer: &ExtensionParams) -> Option<ExtensionParams> {
        let mut params = Vec::new();
        for (key, value) in &offer.params {
            match key.as_str() {
                MAX_WINDOW_BITS => {
                    let bits = match value {
                        ParamValue::Integer(n) => *n as u8,
                        ParamValue::Flag => DEFAULT_WINDOW_BITS,
                        ParamValue::String(_) => return None,
                    };
                    if !(1..=15).contains(&bits) {
                        return None;
                    }
                    params.push((MAX_WINDOW_BITS.to_string(), ParamValue::Integer(bits as u64)));
                }
                NO_CONTEXT_TAKEOVER => params.push((NO_CONTEXT_TAKEOVER.to_string(), ParamValue::Flag)),
                _ => return None,
            }
        }
        Some(ExtensionParams {
            name: NAME.to_string(),
            params,
        })
    }

    fn make_hook(&self, params: &ExtensionParams) -> Box<dyn Hook> {
        let max_window_bits = match params.get(MAX_WINDOW_BITS) {
            Some(ParamValue::Integer(n)) => *n as u8,
            _ => DEFAULT_WINDOW_BITS,
        };
        let no_context_takeover = params.has_flag(NO_CONTEXT_TAKEOVER);
        Box::new(DeflateFrameHook::new(max_window_bits, no_context_takeover))
    }
}

pub struct DeflateFrameHook {
    compressor: Compress,
    decompressor: Decompress,
    window_bits: u8,
    no_context_takeover: bool,
}

impl DeflateFrameHook {
    pub fn new(window_bits: u8, no_context_takeover: bool) -> Self {
        Self {
            compressor: new_compressor(window_bits),
            decompressor: new_decompressor(window_bits),
            window_bits,
            no_context_takeover,
        }
    }
}

fn new_compressor(window_bits: u8) -> Compress {
    Compress::new_with_window_bits(Compression::default(), false, window_bits.max(9))
}

fn new_decompressor(window_bits: u8) -> Decompress {
    Decompress::new_with_window_bits(false, window_bits.max(9))
}

impl Hook for DeflateFrameHook {
    fn on_send(&mut self, mut frame: Frame) -> Result<Frame> {
        if frame.opcode.is_control() || frame.rsv1 || frame.payload.len() <= COMPRESSION_THRESHOLD {
            return Ok(frame);
        }

        let reset = frame.final_fragment || self.no_context_takeover;
        let flush = if reset { FlushCompress::Finish } else { FlushCompress::Sync };

        let mut out = Vec::with_capacity(frame.payload.len());
        self.compressor
            .compress_vec(&frame.payload, &mut out, flush)
            .map_err(|e| Error::CompressionFailure(e.to_string()))?;

        if reset {
            out.push(0x00);
            self.compressor = new_compressor(self.window_bits);
        } else if out.ends_with(&SYNC_FLUSH_TRAILER) {
            out.truncate(out.len() - SYNC_FLUSH_TRAILER.len());
        }

        frame.rsv1 = true;
        frame.payload = out;
        Ok(frame)
    }

    fn on_recv(&mut self, mut frame: Frame) -> Result<Frame> {
        if frame.rsv1 && frame.opcode.is_control() {
            return Err(Error::CompressedControlFrame);
        }
        if !frame.rsv1 {
            return Ok(frame);
        }

        let mut input = frame.payload;
        input.extend_from_slice(&SYNC_FLUSH_TRAILER);

        let before_in = self.decompressor.total_in();
        let mut out = Vec::with_capacity(input.len() * 3);
        let status = self
            .decompressor
            .decompress_vec(&input, &mut out, FlushDecompress::Sync)
            .map_err(|e| Error::CompressionFailure(e.to_string()))?;

        let consumed = (self.decompressor.total_in() - before_in) as usize;
        if status != Status::StreamEnd && consumed < input.len() {
            return Err(Error::ResidualCompressedInput);
        }

        if frame.final_fragment || self.no_context_takeover {
            self.decompressor = new_decompressor(self.window_bits);
        }

        frame.rsv1 = false;
        frame.payload = out;
        Ok(frame)
    }
}
