use base64::{engine::general_purpose::STANDARD, engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;

/// Cryptographically random byte blobs.
pub struct RandomBlobGenerator;

impl RandomBlobGenerator {
    pub fn generate_bytes(size: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; size];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes
    }

    /// Random string made only of `a-z`, `A-Z` and `0-9`.
    pub fn generate_string(size_in_bytes: usize) -> String {
        let encoded = STANDARD.encode(Self::generate_bytes(size_in_bytes));
        encoded
            .chars()
            .map(|c| match c {
                '+' => 'o',
                '/' => 'Z',
                '=' => 'i',
                other => other,
            })
            .collect()
    }

    /// Random bytes encoded as unpadded base64url.
    pub fn generate_url_safe(size_in_bytes: usize) -> String {
        URL_SAFE_NO_PAD.encode(Self::generate_bytes(size_in_bytes))
    }
}
