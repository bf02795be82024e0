//! Line-at-a-time reading on top of a [`Decoder`].

use super::Decoder;
use crate::error::Result;

/// Splits decoded text on `\n`, optionally stopping after a number of
/// code points.
#[derive(Debug, Clone)]
pub struct LineReader<'a> {
    decoder: Decoder<'a>,
    consumed: usize,
    limit: usize,
    done: bool,
}

impl<'a> LineReader<'a> {
    /// Reads every line the decoder produces
    pub fn new(decoder: Decoder<'a>) -> Self {
        Self::with_limit(decoder, usize::MAX)
    }

    /// Stops after `limit` code points, newlines included
    pub fn with_limit(decoder: Decoder<'a>, limit: usize) -> Self {
        Self {
            decoder,
            consumed: 0,
            limit,
            done: false,
        }
    }

    /// Returns the next line without its terminator, or `None` at the end
    pub fn read_line(&mut self) -> Result<Option<String>> {
        if self.done || self.consumed >= self.limit {
            return Ok(None);
        }
        let mut line = String::new();
        loop {
            let Some(c) = self.decoder.decode()? else {
                self.done = true;
                if line.is_empty() && self.consumed > 0 {
                    return Ok(None);
                }
                break;
            };
            self.consumed += 1;
            if c == '\n' {
                break;
            }
            line.push(c);
            if self.consumed >= self.limit {
                break;
            }
        }
        Ok(Some(line))
    }
}

impl Iterator for LineReader<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_line().transpose()
    }
}
