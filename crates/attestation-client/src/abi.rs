//! Minimal Solidity ABI codec
//!
//! Covers the types the registry and the sourcing schema use: `bytes32`,
//! `uint64`/`uint256` values that fit in 64 bits, `address`, `bool`, `bytes`,
//! `string` and tuples of those.

use sha3::{Digest, Keccak256};
use thiserror::Error;

/// ABI word size in bytes
pub const WORD: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AbiError {
    #[error("unexpected end of data: need {needed} bytes at offset {offset}, have {len}")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        len: usize,
    },

    #[error("value at offset {0} does not fit in 64 bits")]
    Overflow(usize),

    #[error("non-zero padding at offset {0}")]
    InvalidPadding(usize),

    #[error("invalid boolean at offset {0}")]
    InvalidBool(usize),

    #[error("string at offset {0} is not valid UTF-8")]
    InvalidUtf8(usize),
}

/// Keccak-256 digest
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// 4-byte function selector for a canonical signature such as `getAttestation(bytes32)`
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Read-only view over an ABI-encoded tuple.
///
/// `base` is the byte position where the tuple starts; dynamic offsets are
/// relative to it.
#[derive(Debug, Clone, Copy)]
pub struct Reader<'a> {
    buf: &'a [u8],
    base: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, base: 0 }
    }

    /// Number of whole words between the tuple start and the end of the buffer
    pub fn words_available(&self) -> usize {
        self.buf.len().saturating_sub(self.base) / WORD
    }

    fn slice(&self, start: usize, n: usize) -> Result<&'a [u8], AbiError> {
        start
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .map(|end| &self.buf[start..end])
            .ok_or(AbiError::UnexpectedEof {
                offset: start,
                needed: n,
                len: self.buf.len(),
            })
    }

    fn word_pos(&self, index: usize) -> usize {
        self.base.saturating_add(index.saturating_mul(WORD))
    }

    /// Raw 32-byte head word
    pub fn word(&self, index: usize) -> Result<&'a [u8], AbiError> {
        self.slice(self.word_pos(index), WORD)
    }

    pub fn bytes32(&self, index: usize) -> Result<[u8; 32], AbiError> {
        let mut out = [0u8; 32];
        out.copy_from_slice(self.word(index)?);
        Ok(out)
    }

    /// Unsigned integer; anything wider than 64 bits is rejected
    pub fn uint64(&self, index: usize) -> Result<u64, AbiError> {
        let pos = self.word_pos(index);
        word_to_u64(self.word(index)?, pos)
    }

    pub fn address(&self, index: usize) -> Result<[u8; 20], AbiError> {
        let pos = self.word_pos(index);
        let word = self.word(index)?;
        if word[..12].iter().any(|&b| b != 0) {
            return Err(AbiError::InvalidPadding(pos));
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(&word[12..]);
        Ok(out)
    }

    pub fn boolean(&self, index: usize) -> Result<bool, AbiError> {
        let pos = self.word_pos(index);
        match self.uint64(index)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(AbiError::InvalidBool(pos)),
        }
    }

    /// Offset stored in a dynamic field's head word, relative to the tuple start
    pub fn offset(&self, index: usize) -> Result<usize, AbiError> {
        let pos = self.word_pos(index);
        usize::try_from(self.uint64(index)?).map_err(|_| AbiError::Overflow(pos))
    }

    /// Length-prefixed `bytes` referenced by the head word at `index`
    pub fn bytes(&self, index: usize) -> Result<&'a [u8], AbiError> {
        let start = self.base.saturating_add(self.offset(index)?);
        let len = word_to_u64(self.slice(start, WORD)?, start)?;
        let len = usize::try_from(len).map_err(|_| AbiError::Overflow(start))?;
        self.slice(start + WORD, len)
    }

    pub fn string(&self, index: usize) -> Result<&'a str, AbiError> {
        let bytes = self.bytes(index)?;
        std::str::from_utf8(bytes).map_err(|_| AbiError::InvalidUtf8(self.word_pos(index)))
    }

    /// Nested dynamic tuple referenced by the head word at `index`
    pub fn tuple(&self, index: usize) -> Result<Reader<'a>, AbiError> {
        let base = self.base.saturating_add(self.offset(index)?);
        self.slice(base, 0)?;
        Ok(Reader {
            buf: self.buf,
            base,
        })
    }
}

fn word_to_u64(word: &[u8], pos: usize) -> Result<u64, AbiError> {
    if word[..24].iter().any(|&b| b != 0) {
        return Err(AbiError::Overflow(pos));
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(tail))
}

/// Value to encode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    FixedBytes([u8; 32]),
    Uint(u64),
    Address([u8; 20]),
    Bool(bool),
    Bytes(Vec<u8>),
    String(String),
    Tuple(Vec<Token>),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        match self {
            Token::Bytes(_) | Token::String(_) => true,
            Token::Tuple(items) => items.iter().any(Token::is_dynamic),
            _ => false,
        }
    }

    fn head_len(&self) -> usize {
        match self {
            Token::Tuple(items) if !self.is_dynamic() => items.iter().map(Token::head_len).sum(),
            _ => WORD,
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Token::FixedBytes(b) => out.extend_from_slice(b),
            Token::Uint(v) => push_u64(out, *v),
            Token::Address(a) => {
                out.extend_from_slice(&[0u8; 12]);
                out.extend_from_slice(a);
            }
            Token::Bool(b) => push_u64(out, u64::from(*b)),
            Token::Bytes(b) => push_bytes(out, b),
            Token::String(s) => push_bytes(out, s.as_bytes()),
            Token::Tuple(items) => out.extend_from_slice(&encode(items)),
        }
    }
}

/// Encode a sequence of tokens as a tuple (function arguments or a struct body)
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len: usize = tokens.iter().map(Token::head_len).sum();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            push_u64(&mut head, (head_len + tail.len()) as u64);
            token.encode_into(&mut tail);
        } else {
            token.encode_into(&mut head);
        }
    }

    head.extend_from_slice(&tail);
    head
}

fn push_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&[0u8; 24]);
    out.extend_from_slice(&v.to_be_bytes());
}

fn push_bytes(out: &mut Vec<u8>, v: &[u8]) {
    push_u64(out, v.len() as u64);
    out.extend_from_slice(v);
    let padding = (WORD - v.len() % WORD) % WORD;
    out.extend(std::iter::repeat(0u8).take(padding));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_selectors() {
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(selector("balanceOf(address)"), [0x70, 0xa0, 0x82, 0x31]);
    }

    #[test]
    fn test_encode_static_and_string() {
        // (uint256 1, string "abc")
        let encoded = encode(&[Token::Uint(1), Token::String("abc".to_string())]);
        assert_eq!(encoded.len(), 4 * WORD);
        assert_eq!(encoded[31], 1);
        assert_eq!(encoded[63], 0x40); // offset of the string
        assert_eq!(encoded[95], 3); // string length
        assert_eq!(&encoded[96..99], b"abc");
        assert!(encoded[99..].iter().all(|&b| b == 0));

        let reader = Reader::new(&encoded);
        assert_eq!(reader.uint64(0).unwrap(), 1);
        assert_eq!(reader.string(1).unwrap(), "abc");
    }

    #[test]
    fn test_empty_string_has_no_tail_body() {
        let encoded = encode(&[Token::String(String::new())]);
        assert_eq!(encoded.len(), 2 * WORD);
        assert_eq!(Reader::new(&encoded).string(0).unwrap(), "");
    }

    #[test]
    fn test_nested_dynamic_tuple() {
        let encoded = encode(&[Token::Tuple(vec![
            Token::Address([7u8; 20]),
            Token::Bool(true),
            Token::Bytes(vec![1, 2, 3]),
        ])]);

        let outer = Reader::new(&encoded);
        assert_eq!(outer.offset(0).unwrap(), WORD);
        let inner = outer.tuple(0).unwrap();
        assert_eq!(inner.address(0).unwrap(), [7u8; 20]);
        assert!(inner.boolean(1).unwrap());
        assert_eq!(inner.bytes(2).unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_reader_rejects_out_of_range() {
        let encoded = encode(&[Token::Uint(5)]);
        let reader = Reader::new(&encoded);
        assert!(matches!(
            reader.word(1),
            Err(AbiError::UnexpectedEof { .. })
        ));

        let mut wide = [0u8; 32];
        wide[0] = 1;
        assert_eq!(
            Reader::new(&wide).uint64(0),
            Err(AbiError::Overflow(0))
        );
    }

    #[test]
    fn test_bytes_length_beyond_buffer() {
        // offset 0x20, then a length word claiming 64 bytes with nothing after it
        let mut data = encode(&[Token::Uint(WORD as u64)]);
        data.extend_from_slice(&encode(&[Token::Uint(64)]));
        assert!(Reader::new(&data).bytes(0).is_err());
    }

    #[test]
    fn test_invalid_bool_and_address_padding() {
        let two = encode(&[Token::Uint(2)]);
        assert_eq!(Reader::new(&two).boolean(0), Err(AbiError::InvalidBool(0)));

        let not_address = [0xffu8; 32];
        assert!(matches!(
            Reader::new(&not_address).address(0),
            Err(AbiError::InvalidPadding(0))
        ));
    }
}
