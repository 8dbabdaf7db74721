/// Incremental UTF-8 decoder for chunked response bodies.
///
/// A multi-byte character split across chunk boundaries is held back until
/// the rest of it arrives. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk`, returning all text that is complete so far.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            // incomplete trailing sequence
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    /// Flush at end of stream. Leftover bytes of an unfinished character
    /// become a single U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        self.pending.clear();
        char::REPLACEMENT_CHARACTER.to_string()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_through() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"hello"), "hello");
        assert!(!decoder.has_pending());
    }

    #[test]
    fn split_multibyte_character_is_joined() {
        let bytes = "héllo €".as_bytes();
        // 'é' is 2 bytes starting at 1; '€' is 3 bytes at the end
        let mut decoder = Utf8StreamDecoder::new();
        let mut out = String::new();
        out.push_str(&decoder.decode(&bytes[..2]));
        assert_eq!(out, "h");
        assert!(decoder.has_pending());
        out.push_str(&decoder.decode(&bytes[2..bytes.len() - 1]));
        out.push_str(&decoder.decode(&bytes[bytes.len() - 1..]));
        out.push_str(&decoder.finish());
        assert_eq!(out, "héllo €");
    }

    #[test]
    fn byte_at_a_time() {
        let text = "日本語テキスト";
        let mut decoder = Utf8StreamDecoder::new();
        let out: String = text
            .as_bytes()
            .iter()
            .map(|b| decoder.decode(std::slice::from_ref(b)))
            .collect();
        assert_eq!(out, text);
    }

    #[test]
    fn invalid_bytes_become_replacement() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn truncated_tail_flushes_as_replacement() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&[b'x', 0xE2, 0x82]), "x");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }
}
