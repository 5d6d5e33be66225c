//! Deterministic cache keys for fields, forms and profiles.
//!
//! Signatures are FNV-1a 64-bit hashes of normalized text rendered in base 36.
//! They are cache keys only: a collision can at worst surface a cached guess
//! for a different field, and every cached key is re-validated against the
//! current profile before use.

use fieldmatch_protocol::{normalize_key, FieldSignals};

const FNV1A64_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV1A64_PRIME: u64 = 0x0100_0000_01b3;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of the time bucket embedded in form signatures.
pub const DAY_MS: u64 = 86_400_000;

/// Signature of a single field: label, name, placeholder, aria-label, input
/// type and section header, each normalized. DOM position and neighbouring
/// labels are not inputs.
pub fn field_signature(signals: &FieldSignals) -> String {
    let parts = [
        normalize_key(&signals.label),
        normalize_key(&signals.name),
        normalize_key(&signals.placeholder),
        normalize_key(&signals.aria_label),
        normalize_key(&signals.input_type),
        normalize_key(&signals.section_header),
    ];
    hash_to_base36(&parts.join("|"))
}

/// Signature of a whole form on a page for the day containing `now_ms`.
/// Field order does not matter; the day bucket rotates the key daily.
pub fn form_signature(fields: &[FieldSignals], page_url: &str, now_ms: u64) -> String {
    let mut field_sigs: Vec<String> = fields.iter().map(field_signature).collect();
    field_sigs.sort_unstable();
    let payload = format!(
        "{}|{}|{}",
        field_sigs.join(","),
        normalize_page_path(page_url),
        now_ms / DAY_MS
    );
    hash_to_base36(&payload)
}

/// Signature of the available profile keys, independent of their order.
pub fn profile_signature<S: AsRef<str>>(available_keys: &[S]) -> String {
    let mut keys: Vec<&str> = available_keys.iter().map(AsRef::as_ref).collect();
    keys.sort_unstable();
    keys.dedup();
    hash_to_base36(&keys.join("|"))
}

/// Path component of a page URL, lowercased, without trailing slash. Scheme,
/// host, query and fragment are dropped.
pub fn normalize_page_path(page_url: &str) -> String {
    let raw = page_url.trim();
    let path = match url::Url::parse(raw) {
        Ok(parsed) if !parsed.cannot_be_a_base() => parsed.path().to_string(),
        _ => {
            let without_scheme = raw.split_once("://").map_or(raw, |(_, rest)| rest);
            let cut = without_scheme
                .find(|c: char| c == '?' || c == '#')
                .map_or(without_scheme, |idx| &without_scheme[..idx]);
            if raw.contains("://") {
                cut.find('/').map_or("/", |idx| &cut[idx..]).to_string()
            } else {
                cut.to_string()
            }
        }
    };
    let trimmed = path.trim_end_matches('/').to_lowercase();
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed
    }
}

pub fn fnv1a_64(input: &str) -> u64 {
    let mut hash = FNV1A64_OFFSET;
    for byte in input.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV1A64_PRIME);
    }
    hash
}

pub fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::with_capacity(13);
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

fn hash_to_base36(input: &str) -> String {
    to_base36(fnv1a_64(input))
}
