//! The incremental decoder (L3): turns arbitrary byte chunks into complete
//! [`Sentence`]s, with no assumption that a TCP segment boundary aligns with
//! a word or sentence boundary in either direction.

use crate::error::ReceiverError;
use crate::length::decode_length;
use crate::sentence::Sentence;
use crate::word::Word;

/// Where the [`Receiver`] is in decoding the current word.
#[derive(Debug, Clone, PartialEq, Eq)]
enum WordState {
    /// The next bytes are a length prefix. Any bytes of a prefix that
    /// arrived but weren't enough to decode are held in `partial`.
    AwaitingLength { partial: Vec<u8> },
    /// The next `remaining` bytes (appended to `buf`) complete the current
    /// word's payload.
    AwaitingPayload { buf: Vec<u8>, remaining: u32 },
}

impl Default for WordState {
    fn default() -> Self {
        WordState::AwaitingLength { partial: Vec::new() }
    }
}

/// The sans-IO sentence decoder.
///
/// Feed it bytes as they arrive from the socket, in any chunking; it emits
/// every sentence that becomes complete as a result. Internally it tracks:
/// whether it is mid length-prefix or mid word-payload, the word bytes
/// accumulated so far, and the words collected for the sentence in
/// progress. State is never rolled back — sufficiency of the input is
/// checked before any state is advanced, so there is no backtracking.
#[derive(Debug, Default)]
pub struct Receiver {
    word_state: WordState,
    current_sentence: Vec<Word>,
}

impl Receiver {
    /// Creates a fresh decoder with no buffered state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of bytes into the decoder, returning every sentence
    /// that became complete as a result, in wire order.
    ///
    /// On [`ReceiverError`] the decoder's internal state is left as-is, but
    /// per the protocol this is a connection-scoped failure: the caller
    /// should tear down the connection rather than keep feeding bytes.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<Sentence>, ReceiverError> {
        let mut sentences = Vec::new();
        let mut offset = 0usize;

        loop {
            match &mut self.word_state {
                WordState::AwaitingPayload { buf, remaining } => {
                    let available = bytes.len() - offset;
                    let take = available.min(*remaining as usize);
                    buf.extend_from_slice(&bytes[offset..offset + take]);
                    offset += take;
                    *remaining -= take as u32;

                    if *remaining == 0 {
                        let word = Word::decode(buf)?;
                        self.current_sentence.push(word);
                        self.word_state = WordState::AwaitingLength { partial: Vec::new() };
                    } else {
                        // Ran out of input mid-payload; stay in this state
                        // and wait for the next `feed` call.
                        debug_assert_eq!(offset, bytes.len());
                        break;
                    }
                }
                WordState::AwaitingLength { partial } => {
                    // Decode against `partial ++ bytes[offset..]`. The
                    // no-partial case is the common one and avoids the
                    // extra allocation.
                    let partial_len = partial.len();
                    let combined;
                    let view = if partial.is_empty() {
                        &bytes[offset..]
                    } else {
                        combined = [partial.as_slice(), &bytes[offset..]].concat();
                        combined.as_slice()
                    };

                    let Some(decoded) = decode_length(view)? else {
                        // Not enough bytes yet for a full prefix: buffer
                        // everything we have and wait for more.
                        let mut buffered = std::mem::take(partial);
                        buffered.extend_from_slice(&bytes[offset..]);
                        self.word_state = WordState::AwaitingLength { partial: buffered };
                        break;
                    };

                    // `decoded.prefix_len` counts bytes within `view`;
                    // translate back to an offset into `bytes` by
                    // subtracting what `partial` already contributed.
                    offset += decoded.prefix_len - partial_len;

                    if decoded.value == 0 {
                        // Zero-length word terminates the sentence.
                        let finished = std::mem::take(&mut self.current_sentence);
                        sentences.push(Sentence(finished));
                        self.word_state = WordState::AwaitingLength { partial: Vec::new() };
                    } else {
                        self.word_state = WordState::AwaitingPayload {
                            buf: Vec::with_capacity(decoded.value as usize),
                            remaining: decoded.value,
                        };
                    }
                }
            }

            if offset >= bytes.len() {
                break;
            }
        }

        Ok(sentences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word::WordCategory;

    fn encode_sentence(words: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        for w in words {
            crate::word::encode_str_word(w, &mut buf);
        }
        buf.push(0x00);
        buf
    }

    #[test]
    fn s1_framing_one_byte_at_a_time() {
        let data = encode_sentence(&["/login"]);
        let mut rx = Receiver::new();
        let mut all = Vec::new();
        for byte in data {
            all.extend(rx.feed(&[byte]).unwrap());
        }
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].0, vec![Word::Message("/login".to_string())]);
    }

    #[test]
    fn s2_long_word() {
        let payload = "a".repeat(300);
        let data = encode_sentence(&[&payload]);
        let mut rx = Receiver::new();
        let sentences = rx.feed(&data).unwrap();
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].0.len(), 1);
        assert_eq!(sentences[0].0[0], Word::Message(payload));
    }

    #[test]
    fn single_packet_multiple_sentences_and_trailing_partial_prefix() {
        let mut data = encode_sentence(&["!done", ".tag=1"]);
        data.extend(encode_sentence(&["!done", ".tag=2"]));
        // Append the start of a third sentence's word: a 2-byte length
        // prefix split so only its first byte arrives this packet.
        let mut tail = Vec::new();
        crate::word::encode_str_word("hello", &mut tail);
        data.push(tail[0]);

        let mut rx = Receiver::new();
        let sentences = rx.feed(&data).unwrap();
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].tag(), Some(1));
        assert_eq!(sentences[1].tag(), Some(2));

        // Completing the rest of that word plus a terminator in a later
        // `feed` call must still work and produce the third sentence.
        let mut rest = tail[1..].to_vec();
        rest.push(0x00);
        let more = rx.feed(&rest).unwrap();
        assert_eq!(more.len(), 1);
        assert_eq!(more[0].0, vec![Word::Message("hello".to_string())]);
    }

    #[test]
    fn tag_multiplexing_interleaved_sentences() {
        let mut data = encode_sentence(&["!re", ".tag=2", "=a=1"]);
        data.extend(encode_sentence(&["!re", ".tag=1", "=a=2"]));
        data.extend(encode_sentence(&["!done", ".tag=1"]));
        data.extend(encode_sentence(&["!done", ".tag=2"]));

        let mut rx = Receiver::new();
        let sentences = rx.feed(&data).unwrap();
        assert_eq!(sentences.len(), 4);
        assert_eq!(sentences[0].tag(), Some(2));
        assert_eq!(sentences[0].category(), Some(&WordCategory::Reply));
        assert_eq!(sentences[1].tag(), Some(1));
        assert_eq!(sentences[2].tag(), Some(1));
        assert_eq!(sentences[2].category(), Some(&WordCategory::Done));
        assert_eq!(sentences[3].tag(), Some(2));
    }

    #[test]
    fn byte_by_byte_matches_whole_buffer() {
        let mut data = encode_sentence(&["!trap", ".tag=5", "=message=missing value"]);
        data.extend(encode_sentence(&["!done", ".tag=5"]));

        let mut whole = Receiver::new();
        let whole_result = whole.feed(&data).unwrap();

        let mut incremental = Receiver::new();
        let mut incremental_result = Vec::new();
        for byte in &data {
            incremental_result.extend(incremental.feed(std::slice::from_ref(byte)).unwrap());
        }

        assert_eq!(whole_result, incremental_result);
    }

    #[test]
    fn invalid_prefix_is_an_error() {
        let mut rx = Receiver::new();
        assert!(rx.feed(&[0xF8]).is_err());
    }

    proptest::proptest! {
        #[test]
        fn prop_segmentation_independent(
            words in proptest::collection::vec("[a-zA-Z0-9=._/!]{1,12}", 1..6),
            chunk_sizes in proptest::collection::vec(1usize..4, 1..40),
        ) {
            let data = encode_sentence(&words.iter().map(String::as_str).collect::<Vec<_>>());

            let mut whole_rx = Receiver::new();
            let expected = whole_rx.feed(&data).unwrap();

            let mut rx = Receiver::new();
            let mut got = Vec::new();
            let mut pos = 0;
            let mut size_iter = chunk_sizes.iter().cycle();
            while pos < data.len() {
                let size = *size_iter.next().unwrap();
                let end = (pos + size).min(data.len());
                got.extend(rx.feed(&data[pos..end]).unwrap());
                pos = end;
            }

            proptest::prop_assert_eq!(got, expected);
        }
    }
}
