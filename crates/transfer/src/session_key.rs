/// Derives the client-side session key for a file.
///
/// The key is a pure function of `(name, size, modified_ms, destination)`:
/// the string `"{name}:{size}:{modified_ms}:{destination or 0}"` is folded
/// over its UTF-16 code units with `h = h * 31 + unit (mod 2^32)` and the
/// result formatted as `up_{h:x}_{size:x}`. Keys produced this way match the
/// ones issued by the web client, so either client can resume the other's
/// sessions.
///
/// Distinct inputs usually give distinct keys, but the 32-bit hash does not
/// rule out collisions; the server's metadata check on negotiate catches a
/// colliding key with different file metadata.
pub fn derive_session_key(
    name: &str,
    size: u64,
    modified_ms: i64,
    destination: Option<i64>,
) -> String {
    let raw = format!("{name}:{size}:{modified_ms}:{}", destination.unwrap_or(0));
    let hash = raw
        .encode_utf16()
        .fold(0u32, |h, unit| h.wrapping_mul(31).wrapping_add(u32::from(unit)));
    format!("up_{hash:x}_{size:x}")
}
