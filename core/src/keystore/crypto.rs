// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Secret derived keys and tags

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use qrsign_proto::hash::tagged_hash;

use crate::{
    consts::{AUTH_TAG, WORDLIST_LEN},
    Error,
};

type HmacSha512 = Hmac<Sha512>;
type HmacSha256 = Hmac<Sha256>;

/// Master secret length
pub const SECRET_LEN: usize = 32;

/// Integrity tag length
pub const TAG_LEN: usize = 64;

/// PIN derived key, first half of `HMAC-SHA512(secret, pin)`
pub fn pin_key(secret: &[u8], pin: &[u8]) -> Result<Zeroizing<[u8; 32]>, Error> {
    let mut m = <HmacSha512 as Mac>::new_from_slice(secret).map_err(|_| Error::InvalidState)?;
    m.update(pin);

    let mut h = Zeroizing::new([0u8; 64]);
    h.copy_from_slice(&m.finalize().into_bytes());

    let mut k = Zeroizing::new([0u8; 32]);
    k.copy_from_slice(&h[..32]);
    Ok(k)
}

/// Integrity tag `HMAC-SHA512(key, secret)`
pub fn integrity_tag(key: &[u8], secret: &[u8]) -> Result<[u8; TAG_LEN], Error> {
    let mut m = <HmacSha512 as Mac>::new_from_slice(key).map_err(|_| Error::InvalidState)?;
    m.update(secret);

    let mut t = [0u8; TAG_LEN];
    t.copy_from_slice(&m.finalize().into_bytes());
    Ok(t)
}

/// Constant time tag comparison
pub fn tags_match(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Index of the antiphishing word for a PIN fragment
pub fn auth_word_index(secret: &[u8], pin_part: &[u8]) -> Result<usize, Error> {
    let key = Zeroizing::new(tagged_hash(AUTH_TAG, secret));

    let mut m = <HmacSha256 as Mac>::new_from_slice(&key[..]).map_err(|_| Error::InvalidState)?;
    m.update(pin_part);
    let h = m.finalize().into_bytes();

    // 2048 divides 2^16 so the reduction is unbiased
    Ok(u16::from_be_bytes([h[0], h[1]]) as usize % WORDLIST_LEN)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tag_depends_on_pin() {
        let secret = [7u8; SECRET_LEN];

        let k1 = pin_key(&secret, b"1234").unwrap();
        let k2 = pin_key(&secret, b"1235").unwrap();
        assert_ne!(*k1, *k2);

        let t1 = integrity_tag(&k1[..], &secret).unwrap();
        let t2 = integrity_tag(&k2[..], &secret).unwrap();
        assert!(tags_match(&t1, &t1));
        assert!(!tags_match(&t1, &t2));
    }

    #[test]
    fn word_index_depends_on_secret() {
        // (digit, index for secret [1; 32], index for secret [2; 32])
        let tests: &[(u8, usize, usize)] = &[
            (b'0', 1852, 1862),
            (b'1', 1628, 181),
            (b'2', 262, 1875),
            (b'3', 1688, 827),
            (b'4', 100, 182),
            (b'9', 1840, 1762),
        ];

        for (digit, a, b) in tests {
            assert_eq!(auth_word_index(&[1u8; SECRET_LEN], &[*digit]).unwrap(), *a);
            assert_eq!(auth_word_index(&[2u8; SECRET_LEN], &[*digit]).unwrap(), *b);
        }
    }

    #[test]
    fn word_index_in_range() {
        for i in 0..=9u8 {
            let n = auth_word_index(&[1u8; SECRET_LEN], &[b'0' + i]).unwrap();
            assert!(n < WORDLIST_LEN);
        }
    }
}
