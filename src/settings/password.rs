//! Password obfuscation for the properties file
//!
//! Passwords are stored as standard base64 (RFC 4648) of their UTF-8
//! bytes.  This only keeps them from being read over a shoulder, it is
//! not encryption.

use crate::error::SettingsError;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Encode a plaintext password for storage
pub fn encode(password: &str) -> String {
    let data = password.as_bytes();
    let mut result = String::with_capacity((data.len() + 2) / 3 * 4);

    for chunk in data.chunks(3) {
        let b0 = chunk[0];
        let b1 = if chunk.len() > 1 { chunk[1] } else { 0 };
        let b2 = if chunk.len() > 2 { chunk[2] } else { 0 };

        let i0 = (b0 >> 2) as usize;
        let i1 = (((b0 & 0x03) << 4) | (b1 >> 4)) as usize;
        let i2 = (((b1 & 0x0F) << 2) | (b2 >> 6)) as usize;
        let i3 = (b2 & 0x3F) as usize;

        result.push(ALPHABET[i0] as char);
        result.push(ALPHABET[i1] as char);
        result.push(if chunk.len() > 1 { ALPHABET[i2] as char } else { '=' });
        result.push(if chunk.len() > 2 { ALPHABET[i3] as char } else { '=' });
    }

    result
}

/// Decode a stored password, `key` is only used for error reporting
pub fn decode(key: &str, encoded: &str) -> Result<String, SettingsError> {
    let invalid = || SettingsError::InvalidValue {
        key: key.to_owned(),
        value: encoded.to_owned(),
        expected: "base64 encoded UTF-8 password",
    };

    let trimmed = encoded.trim();
    if trimmed.len() % 4 != 0 {
        return Err(invalid());
    }

    let mut bytes = Vec::with_capacity(trimmed.len() / 4 * 3);
    let quads: Vec<&[u8]> = trimmed.as_bytes().chunks(4).collect();
    for (n, quad) in quads.iter().enumerate() {
        let padding = quad.iter().rev().take_while(|&&c| c == b'=').count();
        // padding is only allowed at the very end
        if padding > 2 || (padding > 0 && n + 1 != quads.len()) {
            return Err(invalid());
        }

        let mut sextets = [0u8; 4];
        for (i, &c) in quad[..4 - padding].iter().enumerate() {
            sextets[i] = sextet(c).ok_or_else(invalid)?;
        }

        bytes.push((sextets[0] << 2) | (sextets[1] >> 4));
        if padding < 2 {
            bytes.push((sextets[1] << 4) | (sextets[2] >> 2));
        }
        if padding < 1 {
            bytes.push((sextets[2] << 6) | sextets[3]);
        }
    }

    String::from_utf8(bytes).map_err(|_| invalid())
}

fn sextet(c: u8) -> Option<u8> {
    match c {
        b'A'..=b'Z' => Some(c - b'A'),
        b'a'..=b'z' => Some(c - b'a' + 26),
        b'0'..=b'9' => Some(c - b'0' + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}
