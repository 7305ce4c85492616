// ABOUTME: Incremental UTF-8 decoding of channel output.
// ABOUTME: Holds back a character split across packets until its remaining bytes arrive.

/// Turns a sequence of byte packets into text without splitting characters.
#[derive(Debug, Default)]
pub(crate) struct ChunkDecoder {
    pending: Vec<u8>,
}

impl ChunkDecoder {
    /// Decode one packet. Returns `None` when every byte so far belongs to an
    /// incomplete trailing character.
    pub(crate) fn push(&mut self, data: &[u8]) -> Option<String> {
        self.pending.extend_from_slice(data);

        let mut text = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    text.push_str(valid);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    text.push_str(&String::from_utf8_lossy(&self.pending[..valid_up_to]));
                    match e.error_len() {
                        // Truncated sequence at the end: keep it for the next packet
                        None => {
                            self.pending.drain(..valid_up_to);
                            break;
                        }
                        Some(invalid) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid_up_to + invalid);
                        }
                    }
                }
            }
        }

        (!text.is_empty()).then_some(text)
    }

    /// Flush bytes still held back at end of stream.
    pub(crate) fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(rest)
    }

    pub(crate) fn reset(&mut self) {
        self.pending.clear();
    }
}
