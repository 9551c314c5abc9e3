//! Splits a blob of back-to-back JSON objects into one token per object.
//!
//! Producers write events with no separator at all (`{...}{...}`), sometimes with newlines or
//! other whitespace between them. Tokens are not validated here: anything that doesn't look like
//! a complete object is still yielded so that decoding reports it instead of it vanishing.
//!
//! The structural scanner follows string literals and bracket depth, so `}{` inside a string
//! doesn't split a record. A record that is cut off mid-string throws that tracking off for
//! everything after it, so when a scanned object doesn't hold up the scanner falls back to the
//! plain `}<ws>{` boundary and starts over from there.

use std::borrow::Cow;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::IgnoredAny;

static OBJECT_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\}\s*\{").expect("object boundary regex is valid"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));

// Can't appear unescaped in valid JSON text, and isn't whitespace.
const BOUNDARY_MARKER: &str = "\u{0}";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenizerMode {
    /// Scan string literals and bracket depth, yield objects exactly as written.
    #[default]
    Structural,
    /// Legacy behaviour: mark `}<ws>{` boundaries, drop every whitespace character in the
    /// blob, split on the marks. Corrupts string values that contain whitespace.
    StripWhitespace,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseTokenizerModeError(String);

impl std::fmt::Display for ParseTokenizerModeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} is not a valid tokenizer mode", self.0)
    }
}

impl FromStr for TokenizerMode {
    type Err = ParseTokenizerModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "structural" => Ok(TokenizerMode::Structural),
            "strip_whitespace" => Ok(TokenizerMode::StripWhitespace),
            invalid => Err(ParseTokenizerModeError(invalid.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Tokenizer {
    mode: TokenizerMode,
}

impl Tokenizer {
    pub fn new(mode: TokenizerMode) -> Self {
        Self { mode }
    }

    pub fn split<'a>(&self, raw: &'a str) -> Tokens<'a> {
        let inner = match self.mode {
            TokenizerMode::Structural => TokensInner::Structural(ObjectScanner { raw, pos: 0 }),
            TokenizerMode::StripWhitespace => {
                TokensInner::Stripped(strip_and_split(raw).into_iter())
            }
        };
        Tokens { inner }
    }
}

/// Split with the default structural scanner.
pub fn split(raw: &str) -> Tokens<'_> {
    Tokenizer::default().split(raw)
}

/// Lazy sequence of tokens. Structural tokens borrow from the blob.
pub struct Tokens<'a> {
    inner: TokensInner<'a>,
}

enum TokensInner<'a> {
    Structural(ObjectScanner<'a>),
    Stripped(std::vec::IntoIter<String>),
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Cow<'a, str>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            TokensInner::Structural(scanner) => scanner.next().map(Cow::Borrowed),
            TokensInner::Stripped(pieces) => pieces.next().map(Cow::Owned),
        }
    }
}

fn strip_and_split(raw: &str) -> Vec<String> {
    let marked = OBJECT_BOUNDARY.replace_all(raw, format!("}}{BOUNDARY_MARKER}{{"));
    let stripped = WHITESPACE.replace_all(&marked, "");
    stripped
        .split(BOUNDARY_MARKER)
        .filter(|piece| !piece.is_empty())
        .map(str::to_owned)
        .collect()
}

struct ObjectScanner<'a> {
    raw: &'a str,
    pos: usize,
}

impl<'a> ObjectScanner<'a> {
    fn skip_whitespace(&mut self) {
        let rest = &self.raw[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    // Scanning bytes is fine for UTF-8 input: every byte we react to is ASCII, and ASCII bytes
    // never occur inside a multi-byte sequence. None when the object never closes.
    fn scan_object(&self, start: usize) -> Option<usize> {
        let bytes = self.raw.as_bytes();
        let mut depth: usize = 0;
        let mut in_string = false;
        let mut escaped = false;

        for (offset, byte) in bytes[start..].iter().enumerate() {
            if in_string {
                if escaped {
                    escaped = false;
                } else if *byte == b'\\' {
                    escaped = true;
                } else if *byte == b'"' {
                    in_string = false;
                }
                continue;
            }

            match byte {
                b'"' => in_string = true,
                b'{' | b'[' => depth += 1,
                b'}' | b']' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(start + offset + 1);
                    }
                }
                _ => {}
            }
        }

        None
    }

    /// End of the token at the first `}<ws>{` boundary after `start`, or the rest of the blob.
    fn resync(&self, start: usize) -> usize {
        OBJECT_BOUNDARY
            .find(&self.raw[start..])
            .map_or(self.raw.len(), |boundary| start + boundary.start() + 1)
    }

    fn scan_garbage(&self, start: usize) -> usize {
        self.raw[start..]
            .find('{')
            .map_or(self.raw.len(), |offset| start + offset)
    }
}

impl<'a> Iterator for ObjectScanner<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();
        if self.pos >= self.raw.len() {
            return None;
        }

        let start = self.pos;
        let end = if self.raw.as_bytes()[start] == b'{' {
            match self.scan_object(start) {
                Some(end) if holds_up(&self.raw[start..end]) => end,
                _ => self.resync(start),
            }
        } else {
            self.scan_garbage(start)
        };
        self.pos = end;

        Some(self.raw[start..end].trim_end())
    }
}

// An object with no `}<ws>{` inside can't be hiding a second record. One that has one is only
// kept whole if it parses, otherwise the boundary wins.
fn holds_up(candidate: &str) -> bool {
    !OBJECT_BOUNDARY.is_match(candidate)
        || serde_json::from_str::<IgnoredAny>(candidate).is_ok()
}
