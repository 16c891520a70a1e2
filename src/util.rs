/// The digits of our base64 flavor, in order of their value. This is the
/// URL-safe alphabet, so encoded keys can be used in URLs without escaping.
pub(crate) const BASE64_DIGITS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Returns the value of a single base64 digit or `None` if `digit` is not part
/// of [`BASE64_DIGITS`].
pub(crate) fn base64_decode(digit: u8) -> Option<u8> {
    match digit {
        b'A'..=b'Z' => Some(digit - b'A'),
        b'a'..=b'z' => Some(digit - b'a' + 26),
        b'0'..=b'9' => Some(digit - b'0' + 52),
        b'-' => Some(62),
        b'_' => Some(63),
        _ => None,
    }
}

/// Uninhabited type. `Result<Never>` is returned by functions that only ever
/// return on failure.
pub(crate) enum Never {}


#[cfg(test)]
mod tests {
    use super::{BASE64_DIGITS, base64_decode};

    #[test]
    fn decode_is_inverse_of_digits() {
        for (i, &d) in BASE64_DIGITS.iter().enumerate() {
            assert_eq!(base64_decode(d), Some(i as u8));
        }
    }

    #[test]
    fn decode_rejects_foreign_chars() {
        for d in [b'+', b'/', b'=', b'*', b' ', 0xC3] {
            assert_eq!(base64_decode(d), None);
        }
    }
}
