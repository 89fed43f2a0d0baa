//! Wire codec: length-prefixed words inside length-delimited sentences.
//!
//! ```text
//! +---------------------------+------------------------------------------+
//! | payload length (u32, BE)  | word | word | ...                         |
//! +---------------------------+------------------------------------------+
//!                             | len (u32, BE) | UTF-8 bytes |
//! ```
//!
//! Decoding is resumable: a partial frame is left untouched in the buffer
//! and reported as "need more bytes" (`Ok(None)`), so any TCP fragmentation
//! of the same stream yields the same sentences. A zero-length word is a
//! valid empty string; a zero-length frame is a keepalive and is skipped.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::Error;
use crate::sentence::Sentence;

/// Size of every length prefix on the wire.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Default cap on a single sentence frame (16 MiB).
pub const DEFAULT_MAX_SENTENCE_LEN: usize = 16 * 1024 * 1024;

/// `tokio_util` codec for [`Sentence`] frames.
///
/// Used by the client session and by the test double alike.
#[derive(Debug, Clone, Copy)]
pub struct SentenceCodec {
    max_sentence_len: usize,
}

impl SentenceCodec {
    pub fn new(max_sentence_len: usize) -> Self {
        Self { max_sentence_len }
    }

    pub fn max_sentence_len(&self) -> usize {
        self.max_sentence_len
    }
}

impl Default for SentenceCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SENTENCE_LEN)
    }
}

impl Decoder for SentenceCodec {
    type Item = Sentence;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Sentence>, Error> {
        loop {
            let Some(payload_len) = peek_len(src) else {
                src.reserve(LENGTH_PREFIX_LEN);
                return Ok(None);
            };

            if payload_len > self.max_sentence_len {
                return Err(Error::framing(format!(
                    "sentence of {payload_len} bytes exceeds limit of {} bytes",
                    self.max_sentence_len
                )));
            }

            let frame_len = LENGTH_PREFIX_LEN + payload_len;
            if src.len() < frame_len {
                src.reserve(frame_len - src.len());
                return Ok(None);
            }

            src.advance(LENGTH_PREFIX_LEN);
            let payload = src.split_to(payload_len).freeze();
            if payload.is_empty() {
                continue;
            }
            return parse_words(payload).map(Some);
        }
    }
}

impl Encoder<Sentence> for SentenceCodec {
    type Error = Error;

    fn encode(&mut self, item: Sentence, dst: &mut BytesMut) -> Result<(), Error> {
        Encoder::<&Sentence>::encode(self, &item, dst)
    }
}

impl Encoder<&Sentence> for SentenceCodec {
    type Error = Error;

    fn encode(&mut self, item: &Sentence, dst: &mut BytesMut) -> Result<(), Error> {
        if item.is_empty() {
            return Err(Error::framing("cannot encode an empty sentence"));
        }

        let payload_len: usize = item
            .words()
            .iter()
            .map(|w| LENGTH_PREFIX_LEN + w.len())
            .sum();
        if payload_len > self.max_sentence_len {
            return Err(Error::framing(format!(
                "sentence of {payload_len} bytes exceeds limit of {} bytes",
                self.max_sentence_len
            )));
        }

        dst.reserve(LENGTH_PREFIX_LEN + payload_len);
        dst.put_u32(to_prefix(payload_len)?);
        for word in item.words() {
            dst.put_u32(to_prefix(word.len())?);
            dst.put_slice(word.as_bytes());
        }
        Ok(())
    }
}

/// Encode one sentence into a standalone buffer.
pub fn encode_sentence(sentence: &Sentence) -> Result<Bytes, Error> {
    let mut buf = BytesMut::new();
    SentenceCodec::default().encode(sentence, &mut buf)?;
    Ok(buf.freeze())
}

/// Decode the next complete sentence from `buf`, consuming only its bytes.
///
/// Returns `Ok(None)` when `buf` holds less than one full frame.
pub fn decode_sentence(buf: &mut BytesMut) -> Result<Option<Sentence>, Error> {
    SentenceCodec::default().decode(buf)
}

fn peek_len(src: &[u8]) -> Option<usize> {
    let prefix: [u8; LENGTH_PREFIX_LEN] = src.get(..LENGTH_PREFIX_LEN)?.try_into().ok()?;
    usize::try_from(u32::from_be_bytes(prefix)).ok()
}

fn to_prefix(len: usize) -> Result<u32, Error> {
    u32::try_from(len).map_err(|_| Error::framing(format!("length {len} does not fit in u32")))
}

/// Split a complete frame payload into its words.
fn parse_words(mut payload: Bytes) -> Result<Sentence, Error> {
    let mut words = Vec::new();
    while payload.has_remaining() {
        let Some(len) = peek_len(&payload) else {
            return Err(Error::framing(format!(
                "truncated word length prefix ({} trailing bytes)",
                payload.remaining()
            )));
        };
        payload.advance(LENGTH_PREFIX_LEN);
        if len > payload.remaining() {
            return Err(Error::framing(format!(
                "word of {len} bytes overruns sentence ({} bytes left)",
                payload.remaining()
            )));
        }
        let raw = payload.split_to(len);
        let word = String::from_utf8(raw.to_vec())
            .map_err(|e| Error::framing(format!("word is not valid UTF-8: {e}")))?;
        words.push(word);
    }
    Ok(Sentence::from_words(words))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn stream_of(sentences: &[Sentence]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        let mut codec = SentenceCodec::default();
        for s in sentences {
            codec.encode(s, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    fn decode_in_chunks(bytes: &[u8], chunk: usize) -> Vec<Sentence> {
        let mut codec = SentenceCodec::default();
        let mut buf = BytesMut::new();
        let mut out = Vec::new();
        for piece in bytes.chunks(chunk.max(1)) {
            buf.extend_from_slice(piece);
            while let Some(sentence) = codec.decode(&mut buf).unwrap() {
                out.push(sentence);
            }
        }
        assert!(buf.is_empty(), "left {} undecoded bytes", buf.len());
        out
    }

    #[test]
    fn encodes_big_endian_prefixes() {
        let bytes = encode_sentence(&Sentence::from_words(["!done"])).unwrap();
        assert_eq!(
            bytes.as_ref(),
            &[0, 0, 0, 9, 0, 0, 0, 5, b'!', b'd', b'o', b'n', b'e']
        );
    }

    #[test]
    fn round_trip_with_empty_and_multibyte_words() {
        let sentence = Sentence::from_words(["/ip/hotspot/user/add", "", "=comment=café ☕", ""]);
        let mut buf = BytesMut::from(encode_sentence(&sentence).unwrap().as_ref());
        let decoded = decode_sentence(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, sentence);
        assert_eq!(decoded.words()[1], "");
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_frame_needs_more_bytes_without_consuming() {
        let bytes = encode_sentence(&Sentence::from_words(["!done", "=ret=abc"])).unwrap();
        for cut in 0..bytes.len() {
            let mut buf = BytesMut::from(&bytes[..cut]);
            assert_eq!(decode_sentence(&mut buf).unwrap(), None);
            assert_eq!(buf.len(), cut, "decoder consumed a partial frame");
        }
    }

    #[test]
    fn zero_length_frame_is_skipped() {
        let mut buf = BytesMut::from(&[0u8, 0, 0, 0][..]);
        buf.extend_from_slice(&encode_sentence(&Sentence::from_words(["!done"])).unwrap());
        let decoded = decode_sentence(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.words(), ["!done"]);
    }

    #[test]
    fn overrunning_word_is_a_framing_error() {
        // Frame claims 6 payload bytes; inner word claims 10.
        let mut buf = BytesMut::from(&[0u8, 0, 0, 6, 0, 0, 0, 10, b'a', b'b'][..]);
        let err = decode_sentence(&mut buf).unwrap_err();
        assert!(matches!(err, Error::Framing { .. }), "{err:?}");
    }

    #[test]
    fn truncated_inner_prefix_is_a_framing_error() {
        let mut buf = BytesMut::from(&[0u8, 0, 0, 2, 0, 0][..]);
        let err = decode_sentence(&mut buf).unwrap_err();
        assert!(matches!(err, Error::Framing { .. }), "{err:?}");
    }

    #[test]
    fn invalid_utf8_is_a_framing_error() {
        let mut buf = BytesMut::from(&[0u8, 0, 0, 6, 0, 0, 0, 2, 0xff, 0xfe][..]);
        assert!(matches!(
            decode_sentence(&mut buf),
            Err(Error::Framing { .. })
        ));
    }

    #[test]
    fn oversize_frame_is_rejected() {
        let mut codec = SentenceCodec::new(8);
        let mut buf = BytesMut::from(&[0u8, 0, 0, 9][..]);
        assert!(matches!(codec.decode(&mut buf), Err(Error::Framing { .. })));
    }

    #[test]
    fn empty_sentence_cannot_be_encoded() {
        assert!(matches!(
            encode_sentence(&Sentence::new()),
            Err(Error::Framing { .. })
        ));
    }

    #[test]
    fn decodes_back_to_back_sentences_from_one_read() {
        let sentences = vec![
            Sentence::from_words(["!re", "=name=V1"]),
            Sentence::from_words(["!re", "=name=V2"]),
            Sentence::from_words(["!done"]),
        ];
        let bytes = stream_of(&sentences);
        assert_eq!(decode_in_chunks(&bytes, bytes.len()), sentences);
    }

    fn word() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            "[a-z=/!?.*-]{1,24}",
            "\\PC{0,12}",
        ]
    }

    fn sentence() -> impl Strategy<Value = Sentence> {
        prop::collection::vec(word(), 1..8).prop_map(Sentence::from_words)
    }

    proptest! {
        #[test]
        fn round_trip_any_sentence(s in sentence()) {
            let mut buf = BytesMut::from(encode_sentence(&s).unwrap().as_ref());
            prop_assert_eq!(decode_sentence(&mut buf).unwrap(), Some(s));
            prop_assert!(buf.is_empty());
        }

        #[test]
        fn chunk_size_invariance(
            sentences in prop::collection::vec(sentence(), 1..6),
            chunk in 1usize..64,
        ) {
            let bytes = stream_of(&sentences);
            prop_assert_eq!(decode_in_chunks(&bytes, chunk), sentences);
        }
    }
}
