use juniper::{GraphQLScalar, InputValue, ScalarValue};
use paste::paste;
use static_assertions::const_assert;
use std::fmt::{self, Write as _};

use crate::model::Key;


/// Public identifier of a user, client or project.
///
/// Rendered as 13 ASCII characters: a two letter kind (`us`, `cl` or `pr`)
/// followed by the [`Key`] of the document. Clients must treat it as opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, GraphQLScalar)]
#[graphql(
    name = "ID",
    description = "An opaque, globally-unique identifier",
    parse_token(String),
)]
pub(crate) struct Id {
    kind: [u8; 2],

    /// Private so that callers have to go through [`Self::key_for`].
    key: Key,
}


/// Defines a `FOO_KIND` constant and a `foo(key)` constructor for every entry
/// and checks at compile time that all prefixes are alphanumeric and unique.
macro_rules! define_kinds {
    ($($name:ident = $val:literal ,)+) => {
        paste!(
            impl Id {
                $(
                    pub(crate) const [<$name:upper _KIND>]: [u8; 2] = *$val;

                    pub(crate) fn $name(key: Key) -> Self {
                        Self { kind: Self::[<$name:upper _KIND>], key }
                    }
                )+
            }
        );

        $(
            const_assert!($val[0].is_ascii_alphanumeric() && $val[1].is_ascii_alphanumeric());
        )+

        // Duplicate discriminants don't compile.
        #[allow(non_camel_case_types, dead_code)]
        #[repr(u16)]
        enum _UniqueKinds {
            $( $name = u16::from_ne_bytes(*$val), )+
        }
    };
}

define_kinds![
    user = b"us",
    client = b"cl",
    project = b"pr",
];


impl Id {
    /// The key, if this ID is of kind `expected_kind`.
    pub(crate) fn key_for(&self, expected_kind: [u8; 2]) -> Option<Key> {
        if self.kind == expected_kind {
            Some(self.key)
        } else {
            None
        }
    }

    fn to_output<S: ScalarValue>(&self) -> juniper::Value<S> {
        juniper::Value::scalar(self.to_string())
    }

    /// Malformed IDs are rejected here, during input coercion, so a request
    /// containing one fails as a whole before any resolver runs.
    fn from_input<S: ScalarValue>(input: &InputValue<S>) -> Result<Self, String> {
        let s = input.as_string_value().ok_or("expected string")?;
        s.parse().map_err(|e| format!("malformed ID '{s}': {e}"))
    }
}

impl std::str::FromStr for Id {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 13 {
            return Err("invalid length");
        }

        let bytes = s.as_bytes();
        let kind = [bytes[0], bytes[1]];
        if !kind.iter().all(u8::is_ascii_alphanumeric) {
            return Err("invalid kind");
        }

        let key = s.get(2..)
            .and_then(Key::decode)
            .ok_or("invalid base64")?;

        Ok(Self { kind, key })
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_char(self.kind[0].into())?;
        f.write_char(self.kind[1].into())?;
        write!(f, "{}", self.key)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use super::{Id, Key};

    #[test]
    fn simple() {
        #[track_caller]
        fn check(kind: [u8; 2], key: u64, s: &str) {
            let left = Id { kind, key: Key(key) };
            assert_eq!(left.to_string(), s);
            assert_eq!(Id::from_str(s), Ok(left));
        }

        check(Id::CLIENT_KIND, 0, "clAAAAAAAAAAA");
        check(Id::CLIENT_KIND, 1, "clAAAAAAAAAAB");
        check(Id::CLIENT_KIND, 62, "clAAAAAAAAAA-");
        check(Id::PROJECT_KIND, 63, "prAAAAAAAAAA_");
        check(Id::PROJECT_KIND, 64, "prAAAAAAAAABA");
        check(Id::USER_KIND, 65, "usAAAAAAAAABB");

        check(Id::USER_KIND, u64::MAX - 1, "usP_________-");
        check(Id::USER_KIND, u64::MAX, "usP__________");
    }

    #[test]
    fn invalid_decode() {
        // Wrong length
        assert_eq!(Id::from_str(""), Err("invalid length"));
        assert_eq!(Id::from_str("cl"), Err("invalid length"));
        assert_eq!(Id::from_str("clAAAAAAAAAAAA"), Err("invalid length"));
        assert_eq!(Id::from_str("507f1f77bcf86cd799439011"), Err("invalid length"));

        // Invalid characters
        assert_eq!(Id::from_str("cl0000000000*"), Err("invalid base64"));
        assert_eq!(Id::from_str("cl0000000000?"), Err("invalid base64"));
        assert_eq!(Id::from_str("cl0000000000/"), Err("invalid base64"));

        // Multi-byte characters that make the string 13 bytes long
        assert_eq!(Id::from_str("cläAAAAAAAAA"), Err("invalid base64"));
        assert_eq!(Id::from_str("äAAAAAAAAAAA"), Err("invalid kind"));
        assert_eq!(Id::from_str("c!AAAAAAAAAAA"), Err("invalid kind"));

        // Encoded value > u64::MAX
        assert_eq!(Id::from_str("prQAAAAAAAAAA"), Err("invalid base64"));
        assert_eq!(Id::from_str("pr___________"), Err("invalid base64"));
    }

    #[test]
    fn key_for_checks_kind() {
        let id = Id::client(Key(5));
        assert_eq!(id.key_for(Id::CLIENT_KIND), Some(Key(5)));
        assert_eq!(id.key_for(Id::PROJECT_KIND), None);
        assert_eq!(id.key_for(Id::USER_KIND), None);
    }

    #[test]
    fn always_ascii() {
        for n in 0..=u16::MAX {
            for &shift in &[0, 8, 16, 24, 32, 40, 48] {
                let id = Id { kind: Id::PROJECT_KIND, key: Key((n as u64) << shift) };
                let s = id.to_string();
                assert_eq!(s[..2].as_bytes(), Id::PROJECT_KIND);
                assert!(s[2..].bytes().all(|d| crate::util::BASE64_DIGITS.contains(&d)));
            }
        }
    }
}
