//! Items that define the domain data model and are shared between the store
//! and the API.

mod key;

pub(crate) use self::key::Key;
