use bytes::BytesMut;
use postgres_types::{FromSql, IsNull, ToSql, Type, to_sql_checked};
use std::{error::Error, fmt::{self, Write as _}};

use crate::util::{BASE64_DIGITS, base64_decode};


type SqlResult<T> = Result<T, Box<dyn Error + Sync + Send>>;

/// Key of a document within its collection.
///
/// Stored as `bigint` identity column, so conversion to and from SQL goes
/// through `i64`. Its textual form is 11 base64 digits (see
/// [`BASE64_DIGITS`]), most significant digit first.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Key(pub(crate) u64);

impl Key {
    /// Parses the 11 digit textual form. Values that would not fit into 64
    /// bits are rejected.
    pub(crate) fn decode(s: &str) -> Option<Self> {
        let digits: &[u8; 11] = s.as_bytes().try_into().ok()?;

        // The top digit only carries 4 bits.
        if !(b'A'..=b'P').contains(&digits[0]) {
            return None;
        }

        digits.iter()
            .try_fold(0u64, |acc, &d| Some(acc << 6 | u64::from(base64_decode(d)?)))
            .map(Key)
    }

    fn digits(self) -> [u8; 11] {
        let mut out = [0; 11];
        let mut rest = self.0;
        for slot in out.iter_mut().rev() {
            *slot = BASE64_DIGITS[(rest & 0x3f) as usize];
            rest >>= 6;
        }
        out
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.digits().iter().try_for_each(|&d| f.write_char(d.into()))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({}, {self})", self.0 as i64)
    }
}

impl ToSql for Key {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> SqlResult<IsNull> {
        (self.0 as i64).to_sql(ty, out)
    }

    fn accepts(ty: &Type) -> bool {
        <i64 as ToSql>::accepts(ty)
    }

    to_sql_checked!();
}

impl<'a> FromSql<'a> for Key {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> SqlResult<Self> {
        Ok(Key(i64::from_sql(ty, raw)? as u64))
    }

    fn accepts(ty: &Type) -> bool {
        <i64 as FromSql>::accepts(ty)
    }
}


#[cfg(test)]
mod tests {
    use super::Key;

    #[test]
    fn text_form() {
        assert_eq!(Key(0).to_string(), "AAAAAAAAAAA");
        assert_eq!(Key(64).to_string(), "AAAAAAAAABA");
        assert_eq!(Key(u64::MAX).to_string(), "P__________");
        assert_eq!(Key::decode("AAAAAAAAABB"), Some(Key(65)));
        assert_eq!(Key::decode("P__________"), Some(Key(u64::MAX)));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert_eq!(Key::decode(""), None);
        assert_eq!(Key::decode("AAAAAAAAAA"), None);
        assert_eq!(Key::decode("AAAAAAAAAAAA"), None);
        assert_eq!(Key::decode("QAAAAAAAAAA"), None);
        assert_eq!(Key::decode("AAAAAAAAAA="), None);
    }
}
