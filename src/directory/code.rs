//! Class join codes.

use rand::Rng;

/// Uppercase letters and digits without `I`, `O`, `0` and `1`.
pub const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LENGTH: usize = 6;
/// Draws per class creation before giving up.
pub const MAX_CODE_ATTEMPTS: usize = 10;

pub trait CodeGenerator: Send + Sync {
    fn next_code(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodes;

impl CodeGenerator for RandomCodes {
    fn next_code(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..CODE_LENGTH)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect()
    }
}

/// Upper-cased and trimmed, the way codes are stored.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub fn is_valid_code(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|it| CODE_ALPHABET.contains(&it))
}
