//! Text encoding detection and code point decoding.
//!
//! [`Decoder::open`] inspects the leading bytes of a buffer, picks an
//! encoding, and returns a pull decoder that yields one Unicode scalar per
//! [`Decoder::decode`] call.
//!
//! ## Detection order
//!
//! 1. UTF-8 byte-order mark (`EF BB BF`), strict mode
//! 2. UTF-32 byte-order marks (`FF FE 00 00`, `00 00 FE FF`)
//! 3. UTF-16 byte-order marks (`FF FE`, `FE FF`)
//! 4. UTF-7 and GB-18030 markers, rejected
//! 5. Zero-byte statistics for unmarked UTF-16
//! 6. Latin-1 when the caller asks for it, otherwise UTF-8 with replacement

mod lines;

use crate::error::{Error, Result};
use tracing::debug;

pub use lines::LineReader;

/// Replacement character for undecodable input
const REPLACEMENT: char = '\u{FFFD}';

/// Encodings the decoder can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// UTF-8
    Utf8,
    /// UTF-16, little-endian
    Utf16Le,
    /// UTF-16, big-endian
    Utf16Be,
    /// UTF-32, little-endian
    Utf32Le,
    /// UTF-32, big-endian
    Utf32Be,
    /// ISO-8859-1
    Latin1,
}

impl Encoding {
    /// Family label used when comparing against a caller's hint
    pub fn label(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Utf16Le | Encoding::Utf16Be => "utf-16",
            Encoding::Utf32Le | Encoding::Utf32Be => "utf-32",
            Encoding::Latin1 => "latin-1",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderKind {
    Utf8 { fatal: bool },
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
    Latin1,
    Chars,
}

#[derive(Debug, Clone, Copy)]
enum Source<'a> {
    Bytes(&'a [u8]),
    Str(&'a str),
}

/// Pull-based code point decoder.
///
/// The position is a byte offset into the source. It only moves forward
/// while decoding; [`Decoder::set_position`] lets the text reader rewind to
/// a previously observed position.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    source: Source<'a>,
    kind: DecoderKind,
    position: usize,
}

impl<'a> Decoder<'a> {
    /// Detects the encoding of `data` and positions the decoder after any
    /// byte-order mark.
    ///
    /// `encoding` is an optional hint such as `"utf-8"`, `"utf-16"` or
    /// `"iso-8859-1"`. A hint that contradicts a byte-order mark or the
    /// UTF-16 heuristic is an error.
    pub fn open(data: &'a [u8], encoding: Option<&str>) -> Result<Self> {
        let check = |detected: &'static str| -> Result<()> {
            match encoding {
                Some(requested) if requested != detected => Err(Error::EncodingMismatch {
                    requested: requested.to_string(),
                    detected,
                }),
                _ => Ok(()),
            }
        };

        let (kind, position) = match data {
            [0xEF, 0xBB, 0xBF, ..] => {
                check("utf-8")?;
                (DecoderKind::Utf8 { fatal: true }, 3)
            }
            [0xFF, 0xFE, 0x00, 0x00, ..] => {
                check("utf-32")?;
                (DecoderKind::Utf32Le, 4)
            }
            [0x00, 0x00, 0xFE, 0xFF, ..] => {
                check("utf-32")?;
                (DecoderKind::Utf32Be, 4)
            }
            [0xFF, 0xFE, ..] => {
                check("utf-16")?;
                (DecoderKind::Utf16Le, 2)
            }
            [0xFE, 0xFF, ..] => {
                check("utf-16")?;
                (DecoderKind::Utf16Be, 2)
            }
            [0x2B, 0x2F, 0x76, 0x38 | 0x39 | 0x2B | 0x2F, ..] => {
                return Err(Error::UnsupportedEncoding("UTF-7"));
            }
            [0x84, 0x31, 0x95, 0x33, ..] => {
                return Err(Error::UnsupportedEncoding("GB-18030"));
            }
            _ => match detect_utf16(data) {
                Some(kind) => {
                    check("utf-16")?;
                    (kind, 0)
                }
                None => match encoding {
                    Some(hint) if hint.starts_with("iso-8859-") || hint.starts_with("latin-") => {
                        (DecoderKind::Latin1, 0)
                    }
                    _ => {
                        check("utf-8")?;
                        (
                            DecoderKind::Utf8 {
                                fatal: encoding == Some("utf-8"),
                            },
                            0,
                        )
                    }
                },
            },
        };

        debug!(?kind, position, "detected text encoding");
        Ok(Self {
            source: Source::Bytes(data),
            kind,
            position,
        })
    }

    /// Decoder over an already-decoded string
    pub fn from_str(text: &'a str) -> Self {
        Self {
            source: Source::Str(text),
            kind: DecoderKind::Chars,
            position: 0,
        }
    }

    /// The detected encoding, `None` for string-backed decoders
    pub fn encoding(&self) -> Option<Encoding> {
        match self.kind {
            DecoderKind::Utf8 { .. } => Some(Encoding::Utf8),
            DecoderKind::Utf16Le => Some(Encoding::Utf16Le),
            DecoderKind::Utf16Be => Some(Encoding::Utf16Be),
            DecoderKind::Utf32Le => Some(Encoding::Utf32Le),
            DecoderKind::Utf32Be => Some(Encoding::Utf32Be),
            DecoderKind::Latin1 => Some(Encoding::Latin1),
            DecoderKind::Chars => None,
        }
    }

    /// Current byte offset into the source
    pub fn position(&self) -> usize {
        self.position
    }

    /// Moves to a byte offset previously returned by [`Decoder::position`]
    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    /// Returns the next code point, or `None` once the input is exhausted.
    ///
    /// Only a strict UTF-8 decoder (opened on a byte-order mark or with an
    /// explicit `utf-8` hint) fails; every other decoder substitutes U+FFFD.
    pub fn decode(&mut self) -> Result<Option<char>> {
        let bytes = match self.source {
            Source::Str(text) => return Ok(self.decode_str(text)),
            Source::Bytes(bytes) => bytes,
        };
        match self.kind {
            DecoderKind::Utf8 { fatal } => self.decode_utf8(bytes, fatal),
            DecoderKind::Utf16Le => Ok(self.decode_utf16(bytes, u16::from_le_bytes)),
            DecoderKind::Utf16Be => Ok(self.decode_utf16(bytes, u16::from_be_bytes)),
            DecoderKind::Utf32Le => Ok(self.decode_utf32(bytes, u32::from_le_bytes)),
            DecoderKind::Utf32Be => Ok(self.decode_utf32(bytes, u32::from_be_bytes)),
            DecoderKind::Latin1 | DecoderKind::Chars => Ok(self.decode_latin1(bytes)),
        }
    }

    fn decode_str(&mut self, text: &str) -> Option<char> {
        let c = text.get(self.position..)?.chars().next()?;
        self.position += c.len_utf8();
        Some(c)
    }

    fn decode_latin1(&mut self, bytes: &[u8]) -> Option<char> {
        let c = *bytes.get(self.position)?;
        self.position += 1;
        Some(char::from(c))
    }

    fn decode_utf8(&mut self, bytes: &[u8], fatal: bool) -> Result<Option<char>> {
        let start = self.position;
        let Some(&c) = bytes.get(start) else {
            return Ok(None);
        };
        self.position += 1;
        if c < 0x80 {
            return Ok(Some(char::from(c)));
        }

        let continuation = |offset: usize| {
            bytes
                .get(start + offset)
                .copied()
                .filter(|b| (0x80..=0xBF).contains(b))
        };
        let decoded = match c {
            0xC2..=0xDF => continuation(1).map(|c2| (((c as u32 & 0x1F) << 6) | (c2 as u32 & 0x3F), 2)),
            0xE0..=0xEF => continuation(1)
                .filter(|&c2| (c != 0xE0 || c2 >= 0xA0) && (c != 0xED || c2 <= 0x9F))
                .zip(continuation(2))
                .map(|(c2, c3)| {
                    (
                        ((c as u32 & 0x0F) << 12) | ((c2 as u32 & 0x3F) << 6) | (c3 as u32 & 0x3F),
                        3,
                    )
                }),
            0xF0..=0xF4 => continuation(1)
                .filter(|&c2| (c != 0xF0 || c2 >= 0x90) && (c != 0xF4 || c2 <= 0x8F))
                .zip(continuation(2))
                .zip(continuation(3))
                .map(|((c2, c3), c4)| {
                    (
                        ((c as u32 & 0x07) << 18)
                            | ((c2 as u32 & 0x3F) << 12)
                            | ((c3 as u32 & 0x3F) << 6)
                            | (c4 as u32 & 0x3F),
                        4,
                    )
                }),
            _ => None,
        };

        match decoded.and_then(|(code, width)| char::from_u32(code).map(|ch| (ch, width))) {
            Some((ch, width)) => {
                self.position = start + width;
                Ok(Some(ch))
            }
            None if fatal => Err(Error::InvalidUtf8 { offset: start }),
            None => Ok(Some(REPLACEMENT)),
        }
    }

    fn decode_utf16(&mut self, bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Option<char> {
        let read = |position: usize| -> Option<u16> {
            let pair = bytes.get(position..position + 2)?;
            Some(unit([pair[0], pair[1]]))
        };
        let first = read(self.position)?;
        self.position += 2;
        match first {
            0xD800..=0xDBFF => {
                let Some(second @ 0xDC00..=0xDFFF) = read(self.position) else {
                    // unpaired high surrogate; the next unit is decoded on its own
                    return Some(REPLACEMENT);
                };
                self.position += 2;
                let code = 0x10000 + (((first as u32) & 0x3FF) << 10) + ((second as u32) & 0x3FF);
                Some(char::from_u32(code).unwrap_or(REPLACEMENT))
            }
            0xDC00..=0xDFFF => Some(REPLACEMENT),
            _ => Some(char::from_u32(first as u32).unwrap_or(REPLACEMENT)),
        }
    }

    fn decode_utf32(&mut self, bytes: &[u8], unit: fn([u8; 4]) -> u32) -> Option<char> {
        let quad = bytes.get(self.position..self.position + 4)?;
        self.position += 4;
        let code = unit([quad[0], quad[1], quad[2], quad[3]]);
        Some(char::from_u32(code).unwrap_or(REPLACEMENT))
    }
}

/// Guesses unmarked UTF-16 from where the zero bytes sit
fn detect_utf16(data: &[u8]) -> Option<DecoderKind> {
    let length = data.len();
    if length <= 4 || length % 2 != 0 || !data[..4].contains(&0) {
        return None;
    }
    let mut low_zeros = 0usize;
    let mut high_zeros = 0usize;
    for pair in data.chunks_exact(2) {
        low_zeros += usize::from(pair[0] == 0);
        high_zeros += usize::from(pair[1] == 0);
    }
    let units = (length / 2) as f64;
    if low_zeros == 0 && high_zeros as f64 / units > 0.5 {
        return Some(DecoderKind::Utf16Le);
    }
    if high_zeros == 0 && low_zeros as f64 / units > 0.5 {
        return Some(DecoderKind::Utf16Be);
    }
    None
}
