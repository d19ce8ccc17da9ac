//! Text payload encodings served by the writer: `UTF8_STRING` and
//! ISO-8859-1 `STRING`.

/// Replacement for characters with no ISO-8859-1 code point.
const LATIN1_REPLACEMENT: u8 = b'?';

/// The two byte buffers a write offers, built once per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    utf8: Vec<u8>,
    latin1: Vec<u8>,
}

impl Payload {
    pub fn encode(text: &str) -> Self {
        Self {
            utf8: text.as_bytes().to_vec(),
            latin1: to_latin1(text),
        }
    }

    pub fn utf8(&self) -> &[u8] {
        &self.utf8
    }

    pub fn latin1(&self) -> &[u8] {
        &self.latin1
    }
}

/// Transcode to ISO-8859-1; characters above U+00FF become `?`.
pub fn to_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(LATIN1_REPLACEMENT))
        .collect()
}
