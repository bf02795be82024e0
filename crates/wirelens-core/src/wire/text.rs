//! Text format reader.
//!
//! [`TextReader`] is a one-token-lookahead tokenizer over a
//! [`Decoder`](crate::text::Decoder) plus the accessors schema code calls
//! while walking a message:
//!
//! ```
//! use wirelens_core::wire::TextReader;
//!
//! let mut reader = TextReader::from_str("name: \"abc\"; dims: [1, 2, 3]")?;
//! let mut name = String::new();
//! let mut dims = Vec::new();
//! reader.start()?;
//! while !reader.end()? {
//!     let tag = reader.tag()?;
//!     match tag.as_str() {
//!         "name" => name = reader.string()?,
//!         "dims" => reader.array(&mut dims, |r| r.int64())?,
//!         _ => reader.field(&tag)?,
//!     }
//! }
//! assert_eq!(name, "abc");
//! assert_eq!(dims.len(), 3);
//! # Ok::<(), wirelens_core::Error>(())
//! ```
//!
//! Every syntax error carries the `line:column` of the offending token,
//! computed by replaying the input from the start.

use super::{ReaderConfig, UnknownFieldPolicy};
use crate::error::{Error, Result};
use crate::message::{Any, AnyValue, Message};
use crate::text::{Decoder, Encoding};
use crate::wide::{Int64, Uint64};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, trace};

/// Characters inspected by [`TextReader::open`]
const SNIFF_LENGTH: usize = 0x100;

/// A lexical token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Field name, enum value or keyword
    Ident(String),
    /// One of `{ } : , [ ] ;`
    Symbol(char),
    /// `[domain/path.Name]`, brackets stripped
    TypeUrl(String),
    /// Quoted string with escapes resolved
    Str {
        /// `"` or `'`
        quote: char,
        /// Decoded content
        value: String,
    },
    /// Numeric literal, including signs, exponents, `-inf` and suffixes
    Number(String),
    /// End of input
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(text) | Token::Number(text) => f.write_str(text),
            Token::Symbol(c) => write!(f, "{}", c),
            Token::TypeUrl(url) => write!(f, "[{}]", url),
            Token::Str { quote, value } => write!(f, "{}{}{}", quote, value, quote),
            Token::Eof => f.write_str("end of input"),
        }
    }
}

/// Decoder for the text format
#[derive(Debug, Clone)]
pub struct TextReader<'a> {
    decoder: Decoder<'a>,
    /// Decoder position of the first character after any byte-order mark
    origin: usize,
    token: Token,
    token_start: usize,
    /// Decoder position just past the last consumed token
    previous_end: usize,
    depth: usize,
    array_depth: usize,
    config: ReaderConfig,
    last_tag: String,
    /// Field names of the enclosing messages
    scope: Vec<String>,
    unknown: Vec<String>,
}

impl<'a> TextReader<'a> {
    /// Creates a reader, detecting the encoding of `data`
    pub fn new(data: &'a [u8]) -> Result<Self> {
        Self::with_encoding(data, None)
    }

    /// Creates a reader with an encoding hint such as `"utf-8"` or
    /// `"iso-8859-1"`
    pub fn with_encoding(data: &'a [u8], encoding: Option<&str>) -> Result<Self> {
        Self::from_decoder(Decoder::open(data, encoding)?)
    }

    /// Creates a reader over already-decoded text
    pub fn from_str(text: &'a str) -> Result<Self> {
        Self::from_decoder(Decoder::from_str(text))
    }

    fn from_decoder(decoder: Decoder<'a>) -> Result<Self> {
        let origin = decoder.position();
        let mut reader = Self {
            decoder,
            origin,
            token: Token::Eof,
            token_start: origin,
            previous_end: origin,
            depth: 0,
            array_depth: 0,
            config: ReaderConfig::default(),
            last_tag: String::new(),
            scope: Vec::new(),
            unknown: Vec::new(),
        };
        reader.reset()?;
        Ok(reader)
    }

    /// Creates a reader only if the first characters look like the text
    /// format: no NUL or control characters, and the first non-blank
    /// character after any `#` comments is a letter or `[`.
    pub fn open(data: &'a [u8]) -> Result<Option<Self>> {
        Self::open_with_encoding(data, None)
    }

    /// [`TextReader::open`] with an encoding hint
    pub fn open_with_encoding(data: &'a [u8], encoding: Option<&str>) -> Result<Option<Self>> {
        let decoder = Decoder::open(data, encoding)?;
        if !looks_like_text(decoder.clone()) {
            debug!("input does not look like text format");
            return Ok(None);
        }
        Self::from_decoder(decoder).map(Some)
    }

    /// Replaces the reader configuration
    pub fn with_config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Rewinds to the first token and clears all parse state
    pub fn reset(&mut self) -> Result<()> {
        self.decoder.set_position(self.origin);
        self.previous_end = self.origin;
        self.depth = 0;
        self.array_depth = 0;
        self.last_tag.clear();
        self.scope.clear();
        self.unknown.clear();
        self.token = self.scan()?;
        Ok(())
    }

    /// Encoding the input was decoded with, `None` for [`TextReader::from_str`]
    pub fn encoding(&self) -> Option<Encoding> {
        self.decoder.encoding()
    }

    /// The lookahead token
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Dotted names of fields skipped under [`UnknownFieldPolicy::Collect`]
    pub fn unknown_fields(&self) -> &[String] {
        &self.unknown
    }

    /// `line:column` of the lookahead token
    pub fn location(&self) -> String {
        let mut replay = self.decoder.clone();
        replay.set_position(self.origin);
        let mut line = 1;
        let mut column = 1;
        while replay.position() < self.token_start {
            match replay.decode() {
                Ok(Some('\n')) => {
                    line += 1;
                    column = 1;
                }
                Ok(Some(_)) => column += 1,
                _ => break,
            }
        }
        format!("{}:{}", line, column)
    }

    fn syntax(&self, message: impl Into<String>) -> Error {
        Error::text_syntax(message, self.location())
    }

    fn unexpected(&self) -> Error {
        self.syntax(format!("Unexpected token '{}'", self.token))
    }

    /// Advances to the next token
    pub fn next(&mut self) -> Result<()> {
        if self.token == Token::Eof {
            return Err(self.syntax("Unexpected end of input"));
        }
        self.previous_end = self.decoder.position();
        self.token = self.scan()?;
        Ok(())
    }

    /// Consumes `symbol` or fails
    pub fn expect(&mut self, symbol: char) -> Result<()> {
        if self.token != Token::Symbol(symbol) {
            return Err(self.syntax(format!(
                "Unexpected '{}' instead of '{}'",
                self.token, symbol
            )));
        }
        self.next()
    }

    /// Consumes `symbol` if it is the lookahead
    pub fn matches(&mut self, symbol: char) -> Result<bool> {
        if self.token == Token::Symbol(symbol) {
            self.next()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn is_symbol(&self, symbol: char) -> bool {
        self.token == Token::Symbol(symbol)
    }

    fn semicolon(&mut self) -> Result<()> {
        if self.array_depth == 0 {
            self.matches(';')?;
        }
        Ok(())
    }

    /// Enters a message body. Nested bodies must open with `{`.
    pub fn start(&mut self) -> Result<()> {
        if self.depth > 0 {
            self.expect('{')?;
            self.scope.push(self.last_tag.clone());
        }
        self.depth += 1;
        Ok(())
    }

    /// Returns true, consuming the terminator, when the current message
    /// body is finished
    pub fn end(&mut self) -> Result<bool> {
        if self.depth == 0 {
            return Err(self.syntax("Invalid depth"));
        }
        match self.token {
            Token::Symbol('}') => {
                if self.depth == 1 {
                    return Err(self.unexpected());
                }
                self.expect('}')?;
                self.semicolon()?;
                self.depth -= 1;
                self.scope.pop();
                Ok(true)
            }
            Token::Eof => {
                if self.depth != 1 {
                    return Err(self.syntax("Unexpected end of input"));
                }
                self.depth -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Reads a field name and the `:` after it, which may be omitted
    /// before `{` and `[`
    pub fn tag(&mut self) -> Result<String> {
        let name = match &self.token {
            Token::Ident(name) => name.clone(),
            Token::TypeUrl(url) => format!("[{}]", url),
            _ => return Err(self.unexpected()),
        };
        self.next()?;
        if !self.is_symbol('[') && !self.is_symbol('{') {
            self.expect(':')?;
        }
        self.last_tag.clone_from(&name);
        Ok(name)
    }

    fn scalar<T>(&mut self, kind: &str, parse: impl FnOnce(&str) -> Option<T>) -> Result<T> {
        let value = match &self.token {
            Token::Number(text) | Token::Ident(text) => parse(text),
            _ => None,
        };
        let value =
            value.ok_or_else(|| self.syntax(format!("Couldn't parse {} '{}'", kind, self.token)))?;
        self.next()?;
        self.semicolon()?;
        Ok(value)
    }

    /// Signed 32-bit integer
    pub fn int32(&mut self) -> Result<i32> {
        self.scalar("integer", |text| {
            parse_int64(text).and_then(|v| i32::try_from(v.to_i64()).ok())
        })
    }

    /// Unsigned 32-bit integer
    pub fn uint32(&mut self) -> Result<u32> {
        self.scalar("integer", |text| {
            parse_uint64(text).and_then(|v| u32::try_from(v.to_u64()).ok())
        })
    }

    /// Same as [`TextReader::int32`]
    pub fn sint32(&mut self) -> Result<i32> {
        self.int32()
    }

    /// Same as [`TextReader::uint32`]
    pub fn fixed32(&mut self) -> Result<u32> {
        self.uint32()
    }

    /// Same as [`TextReader::int32`]
    pub fn sfixed32(&mut self) -> Result<i32> {
        self.int32()
    }

    /// Signed 64-bit integer, parsed exactly
    pub fn int64(&mut self) -> Result<Int64> {
        self.scalar("integer", parse_int64)
    }

    /// Unsigned 64-bit integer, parsed exactly
    pub fn uint64(&mut self) -> Result<Uint64> {
        self.scalar("integer", parse_uint64)
    }

    /// Same as [`TextReader::int64`]
    pub fn sint64(&mut self) -> Result<Int64> {
        self.int64()
    }

    /// Same as [`TextReader::uint64`]
    pub fn fixed64(&mut self) -> Result<Uint64> {
        self.uint64()
    }

    /// Same as [`TextReader::int64`]
    pub fn sfixed64(&mut self) -> Result<Int64> {
        self.int64()
    }

    /// Double, accepting `nan`, `inf`, `-inf` and a trailing `f`
    pub fn double(&mut self) -> Result<f64> {
        self.scalar("float", parse_float)
    }

    /// Float, parsed as a double and narrowed
    pub fn float(&mut self) -> Result<f32> {
        self.double().map(|v| v as f32)
    }

    /// `true`, `True`, `1`, `false`, `False` or `0`
    pub fn bool(&mut self) -> Result<bool> {
        self.scalar("boolean", |text| match text {
            "true" | "True" | "1" => Some(true),
            "false" | "False" | "0" => Some(false),
            _ => None,
        })
    }

    /// Quoted string; adjacent literals are concatenated
    pub fn string(&mut self) -> Result<String> {
        let Token::Str { value, .. } = &self.token else {
            return Err(self.syntax(format!("String is not in quotes '{}'", self.token)));
        };
        let mut text = value.clone();
        self.next()?;
        while let Token::Str { value, .. } = &self.token {
            text.push_str(value);
            self.next()?;
        }
        self.semicolon()?;
        Ok(text)
    }

    /// Quoted string whose UTF-16 code units are taken as byte values
    pub fn bytes(&mut self) -> Result<Vec<u8>> {
        Ok(self.string()?.encode_utf16().map(|unit| unit as u8).collect())
    }

    /// Enum value by name, or its number
    pub fn enumeration(&mut self, values: &[(&str, i32)]) -> Result<i32> {
        let value = match &self.token {
            Token::Ident(name) => values
                .iter()
                .find(|(candidate, _)| candidate == name)
                .map(|(_, value)| *value),
            Token::Number(text) => parse_int64(text).and_then(|v| i32::try_from(v.to_i64()).ok()),
            _ => None,
        };
        let value =
            value.ok_or_else(|| self.syntax(format!("Couldn't parse enum '{}'", self.token)))?;
        self.next()?;
        self.semicolon()?;
        Ok(value)
    }

    /// Enters a bracketed list if the lookahead is `[`
    pub fn first(&mut self) -> Result<bool> {
        if self.matches('[')? {
            self.array_depth += 1;
            return Ok(true);
        }
        Ok(false)
    }

    /// Leaves a bracketed list if the lookahead is `]`
    pub fn last(&mut self) -> Result<bool> {
        if self.matches(']')? {
            self.array_depth = self.array_depth.saturating_sub(1);
            return Ok(true);
        }
        Ok(false)
    }

    fn check_repeated_len(&self, len: usize) -> Result<()> {
        if len >= self.config.max_repeated_len {
            return Err(Error::RepeatedTooLong {
                limit: self.config.max_repeated_len,
            });
        }
        Ok(())
    }

    /// Appends a repeated value: either a `[a, b, c]` list or one element
    /// of a repeated `tag: value` occurrence
    pub fn array<T>(
        &mut self,
        values: &mut Vec<T>,
        mut item: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<()> {
        if !self.first()? {
            self.check_repeated_len(values.len())?;
            values.push(item(self)?);
            return Ok(());
        }
        while !self.last()? {
            self.check_repeated_len(values.len())?;
            values.push(item(self)?);
            match self.token {
                Token::Symbol(',') => self.next()?,
                Token::Symbol(']') => {}
                _ => return Err(self.unexpected()),
            }
        }
        self.semicolon()
    }

    /// Reads a map entry `{ key: ... value: ... }`; missing halves take
    /// their default value
    pub fn entry<K: Default, V: Default>(
        &mut self,
        mut key: impl FnMut(&mut Self) -> Result<K>,
        mut value: impl FnMut(&mut Self) -> Result<V>,
    ) -> Result<(K, V)> {
        let mut k = K::default();
        let mut v = V::default();
        self.start()?;
        while !self.end()? {
            let tag = self.tag()?;
            match tag.as_str() {
                "key" => k = key(self)?,
                "value" => v = value(self)?,
                _ => self.field(&tag)?,
            }
        }
        Ok((k, v))
    }

    /// Decodes a nested message
    pub fn message<M: Message>(&mut self) -> Result<M> {
        M::decode_text(self)
    }

    fn any_shorthand(&mut self, url: &str) -> Result<Any> {
        self.next()?;
        self.matches(':')?;
        let text = self.read()?;
        self.matches(';')?;
        Ok(Any {
            type_url: url.trim().to_string(),
            value: AnyValue::Text(text),
        })
    }

    fn any_fields(&mut self) -> Result<Any> {
        let mut any = Any::default();
        while !self.end()? {
            let tag = self.tag()?;
            match tag.as_str() {
                "type_url" => any.type_url = self.string()?,
                "value" => any.value = AnyValue::Encoded(self.bytes()?),
                _ => self.field(&tag)?,
            }
        }
        Ok(any)
    }

    /// Reads an `Any` value, either as `type_url`/`value` fields or in the
    /// `[type.url] { ... }` shorthand whose payload is kept as text
    pub fn any(&mut self) -> Result<Any> {
        self.start()?;
        let Token::TypeUrl(url) = &self.token else {
            return self.any_fields();
        };
        let url = url.clone();
        let any = self.any_shorthand(&url)?;
        if !self.end()? {
            return Err(self.unexpected());
        }
        Ok(any)
    }

    /// Reads a repeated `Any` field: one message per shorthand marker, or a
    /// single message in field form
    pub fn any_array(&mut self, values: &mut Vec<Any>) -> Result<()> {
        self.start()?;
        if !matches!(self.token, Token::TypeUrl(_)) {
            let any = self.any_fields()?;
            values.push(any);
            return Ok(());
        }
        while !self.end()? {
            let Token::TypeUrl(url) = &self.token else {
                return Err(self.unexpected());
            };
            let url = url.clone();
            self.check_repeated_len(values.len())?;
            let any = self.any_shorthand(&url)?;
            values.push(any);
        }
        Ok(())
    }

    /// Skips the next value and returns its verbatim source text, without a
    /// trailing `;`
    pub fn read(&mut self) -> Result<String> {
        let start = self.token_start;
        self.skip()?;
        let end = self.previous_end;

        let mut replay = self.decoder.clone();
        replay.set_position(start);
        let mut content = String::new();
        while replay.position() < end {
            match replay.decode()? {
                Some(c) => content.push(c),
                None => break,
            }
        }
        let content = content.trim_end();
        let content = content.strip_suffix(';').unwrap_or(content).trim_end();
        Ok(content.to_string())
    }

    /// Skips a scalar, a `{ ... }` message or a `[ ... ]` list
    pub fn skip(&mut self) -> Result<()> {
        match self.token {
            Token::Symbol('{') => {
                let depth = self.depth;
                self.start()?;
                while self.depth > depth {
                    match self.token {
                        Token::Symbol('{') => self.start()?,
                        Token::Symbol('}') | Token::Eof => {
                            self.end()?;
                        }
                        _ => self.next()?,
                    }
                }
                Ok(())
            }
            Token::Symbol('[') => {
                let depth = self.array_depth;
                self.first()?;
                while self.array_depth > depth {
                    match self.token {
                        Token::Symbol('[') => {
                            self.first()?;
                        }
                        Token::Symbol(']') => {
                            self.last()?;
                        }
                        _ => self.next()?,
                    }
                }
                self.semicolon()
            }
            _ => {
                self.next()?;
                while matches!(self.token, Token::Str { .. }) {
                    self.next()?;
                }
                self.semicolon()
            }
        }
    }

    /// Handles a field name the schema does not know, according to
    /// [`ReaderConfig::unknown_fields`]
    pub fn field(&mut self, tag: &str) -> Result<()> {
        match self.config.unknown_fields {
            UnknownFieldPolicy::Reject => Err(Error::UnsupportedField {
                tag: tag.to_string(),
                location: self.location(),
            }),
            UnknownFieldPolicy::Collect => {
                let mut path = self.scope.join(".");
                if !path.is_empty() {
                    path.push('.');
                }
                path.push_str(tag);
                trace!(field = %path, "skipping unknown field");
                self.unknown.push(path);
                self.skip()
            }
        }
    }

    /// Field names present at the top level and one level down, as `tag`
    /// and `tag.subtag`. Parsing stops quietly at the first error.
    pub fn signature(&mut self) -> Result<BTreeSet<String>> {
        let mut tags = BTreeSet::new();
        self.reset()?;
        if let Err(err) = self.collect_signature(&mut tags) {
            trace!(%err, "text signature stopped early");
        }
        self.reset()?;
        Ok(tags)
    }

    fn collect_signature(&mut self, tags: &mut BTreeSet<String>) -> Result<()> {
        self.start()?;
        while !self.end()? {
            let tag = self.tag()?;
            if self.is_symbol('{') {
                self.start()?;
                tags.insert(tag.clone());
                while !self.end()? {
                    let subtag = self.tag()?;
                    tags.insert(format!("{}.{}", tag, subtag));
                    self.skip()?;
                    self.matches(',')?;
                }
            } else {
                self.skip()?;
                tags.insert(tag);
            }
        }
        Ok(())
    }

    fn scan(&mut self) -> Result<Token> {
        let c = loop {
            self.token_start = self.decoder.position();
            match self.decoder.decode()? {
                None => return Ok(Token::Eof),
                Some(' ' | '\n' | '\r' | '\t') => continue,
                Some('#') => loop {
                    match self.decoder.decode()? {
                        None => return Ok(Token::Eof),
                        Some('\n') => break,
                        Some(_) => {}
                    }
                },
                Some(c) => break c,
            }
        };
        match c {
            'a'..='z' | 'A'..='Z' | '_' | '$' => {
                let mut name = String::from(c);
                self.scan_while(&mut name, |c| c.is_ascii_alphanumeric() || c == '_' || c == '$')?;
                Ok(Token::Ident(name))
            }
            '{' | '}' | ':' | ',' | ']' | ';' => Ok(Token::Symbol(c)),
            '[' => self.scan_bracket(),
            '"' | '\'' => self.scan_string(c),
            '0'..='9' | '+' | '-' | '.' => {
                let mut text = String::from(c);
                self.scan_while(&mut text, |c| {
                    c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-' | '.')
                })?;
                if matches!(text.as_str(), "+" | "-" | ".") {
                    return Err(self.syntax(format!("Unexpected token '{}'", text)));
                }
                Ok(Token::Number(text))
            }
            _ => Err(self.syntax(format!("Unexpected token '{}'", c))),
        }
    }

    fn scan_while(&mut self, text: &mut String, accept: impl Fn(char) -> bool) -> Result<()> {
        loop {
            let before = self.decoder.position();
            match self.decoder.decode()? {
                Some(c) if accept(c) => text.push(c),
                _ => {
                    self.decoder.set_position(before);
                    return Ok(());
                }
            }
        }
    }

    fn scan_bracket(&mut self) -> Result<Token> {
        let after = self.decoder.position();
        let mut url = String::new();
        loop {
            match self.decoder.decode()? {
                Some(c) if url.is_empty() && !c.is_ascii_alphabetic() => break,
                Some(']') => return Ok(Token::TypeUrl(url)),
                Some(c) if c.is_ascii_alphanumeric() || matches!(c, '.' | '/' | '_' | '-') => {
                    url.push(c)
                }
                _ => break,
            }
        }
        self.decoder.set_position(after);
        Ok(Token::Symbol('['))
    }

    fn string_char(&mut self) -> Result<char> {
        match self.decoder.decode()? {
            None | Some('\n') => Err(self.syntax("Unexpected end of string")),
            Some(c) => Ok(c),
        }
    }

    fn scan_string(&mut self, quote: char) -> Result<Token> {
        let mut value = String::new();
        loop {
            match self.string_char()? {
                '\\' => {
                    let c = self.escape()?;
                    value.push(c);
                }
                c if c == quote => return Ok(Token::Str { quote, value }),
                c => value.push(c),
            }
        }
    }

    fn escape(&mut self) -> Result<char> {
        let c = self.string_char()?;
        let escaped = match c {
            '\\' | '\'' | '"' | '?' => c,
            'r' => '\r',
            'n' => '\n',
            't' => '\t',
            'b' => '\u{8}',
            'a' => '\u{7}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            'x' | 'X' => {
                let mut value = 0u32;
                for _ in 0..2 {
                    let digit = self.string_char()?;
                    let digit = digit.to_digit(16).ok_or_else(|| {
                        self.syntax(format!("Unexpected hex digit '{}' in bytes string", digit))
                    })?;
                    value = value << 4 | digit;
                }
                char::from(value as u8)
            }
            '0'..='7' => {
                let mut value = c as u32 - '0' as u32;
                for _ in 0..2 {
                    let digit = self.string_char()?;
                    let digit = digit.to_digit(8).ok_or_else(|| {
                        self.syntax(format!("Unexpected octal digit '{}' in bytes string", digit))
                    })?;
                    value = value << 3 | digit;
                }
                // at most 0o777
                char::from_u32(value).ok_or_else(|| self.syntax("Invalid octal escape"))?
            }
            _ => return Err(self.syntax(format!("Unexpected character '{}' in string", c))),
        };
        Ok(escaped)
    }
}

fn looks_like_text(mut decoder: Decoder<'_>) -> bool {
    let mut first = true;
    for i in 0..SNIFF_LENGTH {
        let c = match decoder.decode() {
            Ok(Some(c)) => c,
            Ok(None) => return i > 0,
            Err(_) => return false,
        };
        let whitespace = matches!(c, ' ' | '\n' | '\r' | '\t');
        if c < ' ' && !whitespace {
            return false;
        }
        if first && !whitespace {
            match c {
                '#' => loop {
                    match decoder.decode() {
                        Ok(Some('\n')) => break,
                        Ok(Some(_)) => {}
                        Ok(None) => return true,
                        Err(_) => return false,
                    }
                },
                '[' | 'a'..='z' | 'A'..='Z' => first = false,
                _ => return false,
            }
        }
    }
    true
}

fn split_radix(text: &str) -> (&str, &str, u32) {
    let (sign, rest) = match text.as_bytes().first() {
        Some(b'-') => ("-", &text[1..]),
        Some(b'+') => ("", &text[1..]),
        _ => ("", text),
    };
    match rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        Some(hex) => (sign, hex, 16),
        None => (sign, rest, 10),
    }
}

fn parse_int64(text: &str) -> Option<Int64> {
    let (sign, digits, radix) = split_radix(text);
    Int64::from_str_radix(&format!("{}{}", sign, digits), radix).ok()
}

fn parse_uint64(text: &str) -> Option<Uint64> {
    let (sign, digits, radix) = split_radix(text);
    if !sign.is_empty() {
        return None;
    }
    Uint64::from_str_radix(digits, radix).ok()
}

fn parse_float(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().or_else(|| {
        text.strip_suffix(['f', 'F'])
            .and_then(|stripped| stripped.parse().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn reader(text: &str) -> TextReader<'_> {
        TextReader::from_str(text).unwrap()
    }

    /// Reads `tag: value` pairs through `value`, returning the tags seen
    fn fields<T>(
        text: &str,
        mut value: impl FnMut(&mut TextReader<'_>) -> Result<T>,
    ) -> Result<Vec<(String, T)>> {
        let mut reader = TextReader::from_str(text)?;
        let mut out = Vec::new();
        reader.start()?;
        while !reader.end()? {
            let tag = reader.tag()?;
            out.push((tag, value(&mut reader)?));
        }
        Ok(out)
    }

    #[test]
    fn test_tokens() {
        let mut reader = reader("a_1: -inf [x.com/T] 'q\\n' { } # comment\n 1.5e-3f");
        let mut tokens = vec![reader.token().clone()];
        while *reader.token() != Token::Eof {
            reader.next().unwrap();
            tokens.push(reader.token().clone());
        }
        assert_eq!(
            tokens,
            vec![
                Token::Ident("a_1".into()),
                Token::Symbol(':'),
                Token::Number("-inf".into()),
                Token::TypeUrl("x.com/T".into()),
                Token::Str {
                    quote: '\'',
                    value: "q\n".into()
                },
                Token::Symbol('{'),
                Token::Symbol('}'),
                Token::Number("1.5e-3f".into()),
                Token::Eof,
            ]
        );
        assert!(reader.next().is_err());
    }

    #[test]
    fn test_lone_bracket() {
        let reader = reader("[ 1");
        assert_eq!(reader.token(), &Token::Symbol('['));
    }

    #[test]
    fn test_string_field() {
        let values = fields("name: \"abc\";", |r| r.string()).unwrap();
        assert_eq!(values, vec![("name".to_string(), "abc".to_string())]);

        let values = fields("name: 'a' \"b\"", |r| r.string()).unwrap();
        assert_eq!(values[0].1, "ab");
    }

    #[test]
    fn test_string_escapes() {
        let values = fields(r#"s: "\x41\101\t\"\\""#, |r| r.string()).unwrap();
        assert_eq!(values[0].1, "AA\t\"\\");

        let bytes = fields(r#"b: "\x00\377\xff""#, |r| r.bytes()).unwrap();
        assert_eq!(bytes[0].1, vec![0x00, 0xFF, 0xFF]);
    }

    #[test]
    fn test_unterminated_string() {
        let err = TextReader::from_str("a: 1\nname: \"abc\nb: 2").unwrap();
        let err = fields_error(err);
        match err {
            Error::TextSyntax { message, location } => {
                assert_eq!(message, "Unexpected end of string");
                assert_eq!(location, "2:7");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    fn fields_error(mut reader: TextReader<'_>) -> Error {
        let mut run = || -> Result<()> {
            reader.start()?;
            while !reader.end()? {
                reader.tag()?;
                reader.skip()?;
            }
            Ok(())
        };
        run().unwrap_err()
    }

    #[test]
    fn test_integer_array() {
        let mut reader = reader("values: [1, 2, 3]");
        let mut values = Vec::new();
        reader.start().unwrap();
        assert_eq!(reader.tag().unwrap(), "values");
        reader.array(&mut values, |r| r.int32()).unwrap();
        assert!(reader.end().unwrap());
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_repeated_occurrences() {
        let mut values = Vec::new();
        let mut reader = reader("v: 1; v: 2 v: [3]");
        reader.start().unwrap();
        while !reader.end().unwrap() {
            reader.tag().unwrap();
            reader.array(&mut values, |r| r.uint32()).unwrap();
        }
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_integers() {
        let values = fields(
            "a: 9223372036854775807 b: -9223372036854775808 c: 0x7FFFFFFFFFFFFFFF d: -0x10",
            |r| r.int64(),
        )
        .unwrap();
        let values: Vec<i64> = values.into_iter().map(|(_, v)| v.to_i64()).collect();
        assert_eq!(values, vec![i64::MAX, i64::MIN, i64::MAX, -16]);

        let values = fields("a: 18446744073709551615", |r| r.uint64()).unwrap();
        assert_eq!(values[0].1, Uint64::MAX);

        assert!(fields("a: 4294967296", |r| r.uint32()).is_err());
        assert!(fields("a: -1", |r| r.uint32()).is_err());
        assert!(fields("a: 2147483648", |r| r.int32()).is_err());
        assert!(fields("a: 1.5", |r| r.int32()).is_err());
        assert!(fields("a: 9223372036854775808", |r| r.int64()).is_err());
    }

    #[test]
    fn test_floats() {
        let values = fields(
            "a: nan b: inf c: -inf d: 1.5f e: 1e-5 f: -2 g: infinity",
            |r| r.double(),
        )
        .unwrap();
        assert!(values[0].1.is_nan());
        assert_eq!(values[1].1, f64::INFINITY);
        assert_eq!(values[2].1, f64::NEG_INFINITY);
        assert_eq!(values[3].1, 1.5);
        assert_eq!(values[4].1, 1e-5);
        assert_eq!(values[5].1, -2.0);
        assert_eq!(values[6].1, f64::INFINITY);
        assert!(fields("a: abc", |r| r.float()).is_err());
    }

    #[test]
    fn test_bool_and_enum() {
        let values = fields("a: true b: False c: 1 d: 0", |r| r.bool()).unwrap();
        let values: Vec<bool> = values.into_iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![true, false, true, false]);
        assert!(fields("a: yes", |r| r.bool()).is_err());

        let names = [("FLOAT", 1), ("INT64", 7)];
        let values = fields("a: INT64 b: 3", |r| r.enumeration(&names)).unwrap();
        assert_eq!(values[0].1, 7);
        assert_eq!(values[1].1, 3);
        assert!(fields("a: DOUBLE", |r| r.enumeration(&names)).is_err());
    }

    #[test]
    fn test_entry_in_either_order() {
        let mut reader = reader("map { value: 2 key: 1 }");
        reader.start().unwrap();
        assert_eq!(reader.tag().unwrap(), "map");
        let (key, value) = reader.entry(|r| r.int32(), |r| r.int32()).unwrap();
        assert_eq!((key, value), (1, 2));
        assert!(reader.end().unwrap());
    }

    #[test]
    fn test_any_shorthand() {
        let mut reader = reader("x { [type.googleapis.com/foo.Bar] { a: 1 b { c: 2 } } }");
        reader.start().unwrap();
        assert_eq!(reader.tag().unwrap(), "x");
        let any = reader.any().unwrap();
        assert_eq!(any.type_url, "type.googleapis.com/foo.Bar");
        assert_eq!(any.value, AnyValue::Text("{ a: 1 b { c: 2 } }".into()));
        assert!(reader.end().unwrap());
    }

    #[test]
    fn test_any_fields() {
        let mut reader = reader("x { type_url: \"t\" value: \"\\001\" }");
        reader.start().unwrap();
        reader.tag().unwrap();
        let any = reader.any().unwrap();
        assert_eq!(any.type_url, "t");
        assert_eq!(any.value, AnyValue::Encoded(vec![1]));
    }

    #[test]
    fn test_any_array() {
        let mut reader = reader("x { [a.com/A]: 5; [a.com/B] { n: 1 } }");
        reader.start().unwrap();
        reader.tag().unwrap();
        let mut values = Vec::new();
        reader.any_array(&mut values).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].value, AnyValue::Text("5".into()));
        assert_eq!(values[1].type_url, "a.com/B");
        assert!(reader.end().unwrap());
    }

    #[test]
    fn test_skip_nested() {
        let mut reader = reader("a { b: [[1, 2], [3]] c { d: 'x' } } e: [] f: 1");
        reader.start().unwrap();
        let mut seen = Vec::new();
        while !reader.end().unwrap() {
            seen.push(reader.tag().unwrap());
            reader.skip().unwrap();
        }
        assert_eq!(seen, vec!["a", "e", "f"]);
    }

    #[test]
    fn test_unknown_field_policies() {
        let mut reader = reader("known: 1 mystery { x: 2 }");
        reader.start().unwrap();
        reader.tag().unwrap();
        reader.int32().unwrap();
        let tag = reader.tag().unwrap();
        match reader.field(&tag).unwrap_err() {
            Error::UnsupportedField { tag, location } => {
                assert_eq!(tag, "mystery");
                assert_eq!(location, "1:18");
            }
            other => panic!("unexpected error {other:?}"),
        }

        let config = ReaderConfig::new().unknown_fields(UnknownFieldPolicy::Collect);
        let mut reader = TextReader::from_str("outer { inner: 1 odd: [1] } top: 2")
            .unwrap()
            .with_config(config);
        reader.start().unwrap();
        while !reader.end().unwrap() {
            let tag = reader.tag().unwrap();
            if tag == "outer" {
                reader.start().unwrap();
                while !reader.end().unwrap() {
                    let tag = reader.tag().unwrap();
                    reader.field(&tag).unwrap();
                }
            } else {
                reader.field(&tag).unwrap();
            }
        }
        assert_eq!(reader.unknown_fields(), ["outer.inner", "outer.odd", "top"]);
    }

    #[test]
    fn test_stray_close_brace_at_top_level() {
        let err = fields("a: 1 } b: 2", |r| r.int32()).unwrap_err();
        assert_eq!(
            err,
            Error::TextSyntax {
                message: "Unexpected token '}'".into(),
                location: "1:6".into(),
            }
        );
        assert!(fields("a { } }", |r| r.skip()).is_err());
    }

    #[test]
    fn test_message_array_separators() {
        let entries = |text: &str| {
            fields(text, |r| {
                let mut values = Vec::new();
                r.array(&mut values, |r| r.entry(|r| r.int32(), |r| r.int32()))?;
                Ok(values)
            })
        };
        let parsed = entries("v: [{ key: 1 }, { key: 2 value: 3 }]").unwrap();
        assert_eq!(parsed[0].1, vec![(1, 0), (2, 3)]);
        assert!(entries("v: [{ key: 1 }; { key: 2 }]").is_err());
        assert!(entries("v: [{ key: 1 };]").is_err());

        let parsed = entries("v { key: 1 }; w { key: 2 }").unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_read_stops_at_last_token() {
        let mut reader = reader("x { [a.com/A]: 5 # note\n }");
        reader.start().unwrap();
        reader.tag().unwrap();
        let any = reader.any().unwrap();
        assert_eq!(any.value, AnyValue::Text("5".into()));
        assert!(reader.end().unwrap());

        let mut reader = self::reader("a: { b: 1 } # trailing\n c: 2");
        reader.start().unwrap();
        reader.tag().unwrap();
        assert_eq!(reader.read().unwrap(), "{ b: 1 }");
        assert_eq!(reader.tag().unwrap(), "c");
    }

    #[test]
    fn test_location() {
        let mut reader = reader("a: 1\n  b: 2");
        reader.start().unwrap();
        assert_eq!(reader.location(), "1:1");
        reader.tag().unwrap();
        reader.int32().unwrap();
        assert_eq!(reader.location(), "2:3");
    }

    #[test]
    fn test_signature() {
        let mut reader = reader("name: 'n' graph { node { op: 'Add' } input: 'x' } version: 3");
        let tags = reader.signature().unwrap();
        let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
        assert_eq!(
            tags,
            vec!["graph", "graph.input", "graph.node", "name", "version"]
        );
        // rewound afterwards
        assert_eq!(reader.token(), &Token::Ident("name".into()));
    }

    #[test]
    fn test_open_sniffing() {
        assert!(TextReader::open(b"# header\nname: 1\n").unwrap().is_some());
        assert!(TextReader::open(b"[ext]: 1").unwrap().is_some());
        assert!(TextReader::open(b"\x08\x96\x01").unwrap().is_none());
        assert!(TextReader::open(b"1: 2").unwrap().is_none());
        assert!(TextReader::open(b"").unwrap().is_none());
        assert!(TextReader::open(b"+/v8").is_err());
    }

    #[test]
    fn test_utf16_input() {
        let mut data = vec![0xFF, 0xFE];
        for unit in "v: 'é'".encode_utf16() {
            data.extend_from_slice(&unit.to_le_bytes());
        }
        let mut reader = TextReader::new(&data).unwrap();
        reader.start().unwrap();
        reader.tag().unwrap();
        assert_eq!(reader.string().unwrap(), "é");
        assert!(reader.end().unwrap());
    }

    #[test]
    fn test_repeated_limit() {
        let config = ReaderConfig::new().max_repeated_len(2);
        let mut reader = TextReader::from_str("v: [1, 2, 3]").unwrap().with_config(config);
        reader.start().unwrap();
        reader.tag().unwrap();
        let mut values = Vec::new();
        assert_eq!(
            reader.array(&mut values, |r| r.int32()).unwrap_err(),
            Error::RepeatedTooLong { limit: 2 }
        );
    }
}
