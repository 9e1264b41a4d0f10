//! Minimal ABI encoding for static-argument contract calls

use sha3::{Digest, Keccak256};

use crate::types::Address;

pub type Word = [u8; 32];

/// First four bytes of the Keccak-256 hash of a canonical signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Static call arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(u64),
}

impl Token {
    fn to_word(self) -> Word {
        match self {
            Token::Address(a) => a.to_abi_word(),
            Token::Uint(v) => {
                let mut word = [0u8; 32];
                word[24..].copy_from_slice(&v.to_be_bytes());
                word
            }
        }
    }
}

/// Selector followed by one 32-byte word per argument.
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32 * args.len());
    data.extend_from_slice(&selector(signature));
    for arg in args {
        data.extend_from_slice(&arg.to_word());
    }
    data
}

/// Split return data into words, requiring at least `expected` of them.
pub fn split_words(data: &[u8], expected: usize) -> Result<Vec<Word>, String> {
    if data.len() % 32 != 0 {
        return Err(format!("return data length {} is not a multiple of 32", data.len()));
    }
    if data.len() < expected * 32 {
        return Err(format!(
            "expected {} words, got {}",
            expected,
            data.len() / 32
        ));
    }
    Ok(data
        .chunks_exact(32)
        .map(|chunk| {
            let mut word = [0u8; 32];
            word.copy_from_slice(chunk);
            word
        })
        .collect())
}

pub fn decode_bool(word: &Word) -> Result<bool, String> {
    if word[..31].iter().any(|b| *b != 0) || word[31] > 1 {
        return Err(format!("invalid bool word 0x{}", hex::encode(word)));
    }
    Ok(word[31] == 1)
}

/// Signed integer (any `intN` with N <= 128), sign-extended to 256 bits.
pub fn decode_int(word: &Word) -> Result<i128, String> {
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    let value = i128::from_be_bytes(low);
    let extension = if value < 0 { 0xff } else { 0x00 };
    if word[..16].iter().any(|b| *b != extension) {
        return Err(format!("signed value 0x{} overflows i128", hex::encode(word)));
    }
    Ok(value)
}

/// Unsigned integer that must fit an `i128`.
pub fn decode_uint(word: &Word) -> Result<i128, String> {
    if word[..16].iter().any(|b| *b != 0) {
        return Err(format!("unsigned value 0x{} overflows u128", hex::encode(word)));
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    i128::try_from(u128::from_be_bytes(low))
        .map_err(|_| format!("unsigned value 0x{} overflows i128", hex::encode(word)))
}

pub fn decode_u64(word: &Word) -> Result<u64, String> {
    let value = decode_uint(word)?;
    u64::try_from(value).map_err(|_| format!("value {} overflows u64", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_of_known_signature() {
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn test_encode_call_layout() {
        let token = Address::new([0x11; 20]);
        let data = encode_call(
            "getIndex(address,address,uint32)",
            &[Token::Address(token), Token::Address(token), Token::Uint(7)],
        );
        assert_eq!(data.len(), 4 + 3 * 32);
        assert_eq!(&data[4..16], &[0u8; 12]);
        assert_eq!(&data[16..36], &[0x11; 20]);
        assert_eq!(data[4 + 3 * 32 - 1], 7);
    }

    #[test]
    fn test_decode_negative_int96() {
        // -1000 sign-extended to 256 bits
        let mut word = [0xffu8; 32];
        word[16..].copy_from_slice(&(-1000i128).to_be_bytes());
        assert_eq!(decode_int(&word).unwrap(), -1000);

        let mut positive = [0u8; 32];
        positive[31] = 42;
        assert_eq!(decode_int(&positive).unwrap(), 42);
    }

    #[test]
    fn test_decode_rejects_overflow() {
        let mut word = [0u8; 32];
        word[0] = 1;
        assert!(decode_uint(&word).is_err());
        assert!(decode_int(&word).is_err());

        let max = [0xffu8; 32];
        // all ones is -1 as a signed value but overflows as unsigned
        assert_eq!(decode_int(&max).unwrap(), -1);
        assert!(decode_uint(&max).is_err());
    }

    #[test]
    fn test_decode_bool() {
        let mut word = [0u8; 32];
        assert!(!decode_bool(&word).unwrap());
        word[31] = 1;
        assert!(decode_bool(&word).unwrap());
        word[31] = 2;
        assert!(decode_bool(&word).is_err());
    }

    #[test]
    fn test_split_words_requires_length() {
        assert!(split_words(&[0u8; 64], 3).is_err());
        assert!(split_words(&[0u8; 33], 1).is_err());
        assert_eq!(split_words(&[0u8; 128], 4).unwrap().len(), 4);
    }
}
