//! Signing, masking and identifier helpers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const MASK_CHAR: char = '*';
const FULL_MASK: &str = "****";

static LAST_REQUEST_ID: AtomicU64 = AtomicU64::new(0);

/// HMAC-SHA256 over `data`, hex encoded.
pub fn sign_data(data: &str, key: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(data.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Checks `signature` against a fresh HMAC of `data` in constant time.
pub fn verify_signature(signature: &str, data: &str, key: &str) -> bool {
    let expected = sign_data(data, key);
    constant_time_eq(signature.as_bytes(), expected.as_bytes())
}

/// Length mismatches return false without inspecting content.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Keeps the last four digits; inputs with fewer than four digits are masked entirely.
pub fn mask_card_number(card_number: &str) -> String {
    let digits = sanitize_card_number(card_number);
    if digits.len() < 4 {
        return FULL_MASK.to_string();
    }

    let visible = &digits[digits.len() - 4..];
    let mut masked: String = std::iter::repeat(MASK_CHAR).take(digits.len() - 4).collect();
    masked.push_str(visible);
    masked
}

pub fn hash_card_number(card_number: &str) -> String {
    let digits = sanitize_card_number(card_number);
    hex::encode(Sha256::digest(digits.as_bytes()))
}

pub(crate) fn sanitize_card_number(card_number: &str) -> String {
    card_number.chars().filter(char::is_ascii_digit).collect()
}

/// Nanosecond timestamp id, strictly increasing within the process.
pub fn generate_request_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();

    let mut last = LAST_REQUEST_ID.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_REQUEST_ID.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next.to_string(),
            Err(current) => last = current,
        }
    }
}
