//! Incremental fragment decoder for the backend's streamed reply
//!
//! The chat endpoint streams newline-delimited JSON objects, but HTTP
//! chunk boundaries do not respect object boundaries. This parser
//! accumulates raw bytes and extracts complete top-level JSON objects
//! with a single-pass bracket-matching scan (string and escape aware),
//! then decodes each into a [`ChatFragment`].

use crate::backend::types::ChatFragment;
use crate::errors::{BridgeError, Result};

/// Maximum accumulation buffer size (1MB)
pub const MAX_BUFFER_SIZE: usize = 1_048_576;

/// Incremental NDJSON fragment parser
#[derive(Debug)]
pub struct FragmentParser {
    /// Accumulation buffer
    buffer: Vec<u8>,

    /// Maximum buffer size
    max_buffer_size: usize,
}

impl FragmentParser {
    /// Create new parser with default settings
    pub fn new() -> Self {
        Self::with_capacity(MAX_BUFFER_SIZE)
    }

    /// Create parser with custom buffer capacity
    pub fn with_capacity(max_buffer_size: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            max_buffer_size,
        }
    }

    /// Add bytes and decode every complete fragment now available.
    ///
    /// A single network chunk can carry zero, one or several complete
    /// objects; all complete ones are returned in arrival order and any
    /// trailing partial object stays buffered.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<ChatFragment>> {
        if self.buffer.len() + bytes.len() > self.max_buffer_size {
            return Err(BridgeError::Streaming(format!(
                "fragment buffer overflow: {} bytes exceeds maximum {}",
                self.buffer.len() + bytes.len(),
                self.max_buffer_size
            )));
        }

        self.buffer.extend_from_slice(bytes);

        let mut fragments = Vec::new();
        while let Some((start, end)) = self.find_complete_object()? {
            let fragment = serde_json::from_slice(&self.buffer[start..=end])
                .map_err(|e| BridgeError::Streaming(format!("malformed fragment: {e}")))?;
            self.buffer.drain(..=end);
            fragments.push(fragment);
        }
        Ok(fragments)
    }

    /// Find one complete top-level JSON object by bracket matching.
    ///
    /// Returns `Some((start_index, end_index))` or `None` when the buffer
    /// holds no complete object yet.
    fn find_complete_object(&self) -> Result<Option<(usize, usize)>> {
        let mut depth: i32 = 0;
        let mut start: Option<usize> = None;
        let mut in_string = false;
        let mut escape_next = false;

        for (i, &byte) in self.buffer.iter().enumerate() {
            if escape_next {
                escape_next = false;
                continue;
            }

            if byte == b'\\' && in_string {
                escape_next = true;
                continue;
            }

            if byte == b'"' {
                in_string = !in_string;
                continue;
            }

            if in_string {
                continue;
            }

            match byte {
                b'{' => {
                    if depth == 0 {
                        start = Some(i);
                    }
                    depth += 1;
                }
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(start) = start {
                            return Ok(Some((start, i)));
                        }
                    }
                    if depth < 0 {
                        return Err(BridgeError::Streaming(
                            "mismatched braces in backend stream".to_string(),
                        ));
                    }
                }
                _ => {}
            }
        }

        Ok(None)
    }

    /// Get current buffer size
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for FragmentParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_fragment() {
        let mut parser = FragmentParser::new();

        let fragments = parser
            .push(br#"{"message":{"role":"assistant","content":"hi"},"done":false}"#)
            .unwrap();

        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].message.content, "hi");
        assert!(parser.is_empty());
    }

    #[test]
    fn test_fragment_split_across_chunks() {
        let mut parser = FragmentParser::new();

        assert!(parser.push(br#"{"message":{"role":"assi"#).unwrap().is_empty());
        assert!(parser.push(br#"stant","content":"par"#).unwrap().is_empty());
        let fragments = parser.push(br#"tial"},"done":true}"#).unwrap();

        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].message.content, "partial");
        assert!(fragments[0].done);
    }

    #[test]
    fn test_multiple_fragments_in_one_chunk() {
        let mut parser = FragmentParser::new();

        let chunk = concat!(
            r#"{"message":{"content":"a"},"done":false}"#,
            "\n",
            r#"{"message":{"content":"b"},"done":false}"#,
            "\n",
        );
        let fragments = parser.push(chunk.as_bytes()).unwrap();

        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].message.content, "a");
        assert_eq!(fragments[1].message.content, "b");
    }

    #[test]
    fn test_braces_inside_content_strings() {
        let mut parser = FragmentParser::new();

        let fragments = parser
            .push(br#"{"message":{"content":"code { nested } here"},"done":false}"#)
            .unwrap();

        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].message.content, "code { nested } here");
    }

    #[test]
    fn test_escaped_quotes_in_content() {
        let mut parser = FragmentParser::new();

        let fragments = parser
            .push(br#"{"message":{"content":"say \"hi\" {"},"done":false}"#)
            .unwrap();

        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].message.content, r#"say "hi" {"#);
    }

    #[test]
    fn test_tool_call_fragment_decodes() {
        let mut parser = FragmentParser::new();

        let fragments = parser
            .push(br#"{"message":{"content":"","tool_calls":[{"function":{"name":"f","arguments":{"x":"1"}}}]},"done":false}"#)
            .unwrap();

        assert_eq!(fragments[0].message.tool_calls.len(), 1);
        assert_eq!(fragments[0].message.tool_calls[0].function.name, "f");
    }

    #[test]
    fn test_buffer_overflow() {
        let mut parser = FragmentParser::with_capacity(64);

        let err = parser.push(&vec![b'a'; 100]).unwrap_err();
        assert!(matches!(err, BridgeError::Streaming(_)));
    }

    #[test]
    fn test_malformed_fragment_is_an_error() {
        let mut parser = FragmentParser::new();

        // Complete object but not a fragment shape that serde can accept
        let result = parser.push(br#"{"message": 42}"#);
        assert!(result.is_err());
    }
}
