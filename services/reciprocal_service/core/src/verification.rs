//! Verification-code generation for visits: 128 bits of randomness, rendered as 32
//! lowercase hex characters.

use rand::RngCore;

pub fn generate_verification_code() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_32_lowercase_hex_characters() {
        let code = generate_verification_code();
        assert_eq!(code.len(), 32);
        assert!(code.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn successive_codes_differ() {
        assert_ne!(generate_verification_code(), generate_verification_code());
    }
}
