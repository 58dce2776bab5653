//! Fuzzy key matching.
//!
//! Keys match when they are equal after dropping every non-alphanumeric
//! byte and folding ASCII case, so `"Gyro_X"`, `"gyro x"` and `"gyrox"` all
//! name the same command or setting. Lookups are linear scans over small
//! tables.

fn skip_non_alphanumeric(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(u8::is_ascii_alphanumeric)
        .unwrap_or(bytes.len());
    &bytes[start..]
}

/// Returns true if `input` and `target` name the same key.
pub fn key_compare(input: &[u8], target: &[u8]) -> bool {
    let mut input = input;
    let mut target = target;
    loop {
        input = skip_non_alphanumeric(input);
        target = skip_non_alphanumeric(target);
        match (input.split_first(), target.split_first()) {
            (None, None) => return true,
            (Some((a, rest_a)), Some((b, rest_b))) if a.eq_ignore_ascii_case(b) => {
                input = rest_a;
                target = rest_b;
            }
            _ => return false,
        }
    }
}

/// Checks whether `input` starts with `target`.
///
/// On a match the remainder of `input` is returned, positioned at its first
/// alphanumeric byte, so a pseudo-key such as `"enumerate_3"` matched
/// against `"enumerate"` yields `"3"`.
pub fn key_compare_partial<'a>(input: &'a [u8], target: &[u8]) -> Option<&'a [u8]> {
    let mut input = input;
    let mut target = target;
    loop {
        input = skip_non_alphanumeric(input);
        target = skip_non_alphanumeric(target);
        let Some((b, rest_b)) = target.split_first() else {
            return Some(input);
        };
        let (a, rest_a) = input.split_first()?;
        if !a.eq_ignore_ascii_case(b) {
            return None;
        }
        input = rest_a;
        target = rest_b;
    }
}
