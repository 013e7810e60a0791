//! Verification code generation.

use rand::Rng;

use crate::config::CodeFormat;

const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generate a verification code.
///
/// Numeric codes are zero-padded to `length`; alphanumeric codes draw each
/// character uniformly from `0-9A-Z`.
pub fn generate_code(format: CodeFormat, length: usize) -> String {
    let mut rng = rand::thread_rng();
    match format {
        CodeFormat::Numeric => {
            let max = 10u64.pow(length as u32);
            format!("{:0width$}", rng.gen_range(0..max), width = length)
        }
        CodeFormat::Alphanumeric => (0..length)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect(),
    }
}
