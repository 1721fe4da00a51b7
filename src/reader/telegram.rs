//! Telegram readers.
//!
//! [`TelegramReader`] frames telegrams out of a line-oriented byte stream (a
//! serial port in production, anything implementing `BufRead` in tests) and
//! decodes one per read. [`RawTelegramReader`] decodes a captured telegram once
//! and hands out the same telegram forever.
use crate::core::{Reader, Reading};
use crate::error::MeterError;
use crate::telegram::{Telegram, TelegramParser};
use std::io::{BufRead, ErrorKind};
use std::path::Path;
use tracing::{debug, trace, warn};

/// Largest frame kept while waiting for a footer. DSMR v5 telegrams are a few KiB.
pub const MAX_FRAME_BYTES: usize = 16 * 1024;

/// Reads one decoded telegram per call from a buffered byte stream.
///
/// Lines before the first `/` are skipped. A `/` in the middle of a frame
/// restarts the frame. A frame growing past [`MAX_FRAME_BYTES`] without a
/// footer is discarded and the reader resynchronises on the next `/`. End of stream reports [`Reading::Exhausted`]. Read
/// timeouts from the stream are treated as "no data yet" and the read keeps
/// waiting, so a silent device blocks the caller indefinitely.
pub struct TelegramReader<S> {
    source: S,
    parser: TelegramParser,
    line: String,
    frame: String,
}

impl<S: BufRead + Send> TelegramReader<S> {
    /// Reads telegrams from `source`, decoding them with `parser`.
    pub fn new(source: S, parser: TelegramParser) -> Self {
        Self {
            source,
            parser,
            line: String::new(),
            frame: String::new(),
        }
    }

    /// Parser used for decoding.
    pub fn parser(&self) -> TelegramParser {
        self.parser
    }
}

impl<S: BufRead + Send> Reader for TelegramReader<S> {
    type Sample = Telegram;

    fn read(&mut self) -> Result<Reading<Telegram>, MeterError> {
        loop {
            match self.source.read_line(&mut self.line) {
                Ok(0) => {
                    if !self.frame.is_empty() {
                        warn!(
                            bytes = self.frame.len(),
                            "stream ended inside a telegram, discarding partial frame"
                        );
                        self.frame.clear();
                    }
                    return Ok(Reading::Exhausted);
                }
                Ok(_) => {}
                // Partial data stays in `line`; keep waiting for the rest.
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                    continue
                }
                Err(e) => return Err(e.into()),
            }

            let is_header = self.line.starts_with('/');
            let is_footer = self.line.starts_with('!');

            if is_header {
                if !self.frame.is_empty() {
                    warn!("telegram header before footer, restarting frame");
                }
                self.frame.clear();
            }

            if is_header || !self.frame.is_empty() {
                self.frame.push_str(&self.line);
                if self.frame.len() > MAX_FRAME_BYTES {
                    warn!(
                        bytes = self.frame.len(),
                        "telegram exceeds frame limit without footer, discarding"
                    );
                    self.frame.clear();
                }
            } else {
                trace!(line = %self.line.trim_end(), "skipping line outside telegram");
            }
            self.line.clear();

            if is_footer && !self.frame.is_empty() {
                let raw = std::mem::take(&mut self.frame);
                debug!(bytes = raw.len(), "telegram framed");
                return self.parser.parse(&raw).map(Reading::Sample);
            }
        }
    }
}

/// Decodes a captured telegram once and returns it on every read.
#[derive(Debug, Clone)]
pub struct RawTelegramReader {
    telegram: Telegram,
}

impl RawTelegramReader {
    /// Decodes `raw` without checksum verification.
    pub fn new(raw: &str) -> Result<Self, MeterError> {
        Self::with_parser(raw, TelegramParser::without_checksum())
    }

    /// Decodes `raw` with the given parser.
    pub fn with_parser(raw: &str, parser: TelegramParser) -> Result<Self, MeterError> {
        Ok(Self {
            telegram: parser.parse(raw)?,
        })
    }

    /// Loads and decodes a captured telegram file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, MeterError> {
        let raw = std::fs::read_to_string(path)?;
        Self::new(&raw)
    }

    /// The decoded telegram.
    pub fn telegram(&self) -> &Telegram {
        &self.telegram
    }
}

impl Reader for RawTelegramReader {
    type Sample = Telegram;

    fn read(&mut self) -> Result<Reading<Telegram>, MeterError> {
        Ok(Reading::Sample(self.telegram.clone()))
    }
}
