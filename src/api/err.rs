//! The error type returned by resolvers.
//!
//! Lookups that match nothing resolve to `null` and are not errors. Errors
//! carry a `kind` that ends up in the `extensions` of the GraphQL error.

use juniper::{FieldError, IntoFieldError, ScalarValue, graphql_value};

use crate::{prelude::*, store::StoreError};


pub(crate) type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) msg: String,
    pub(crate) kind: ApiErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApiErrorKind {
    /// Anything the API user cannot do anything about.
    InternalServerError,

    /// The entity store could not be reached.
    StoreUnavailable,
}

impl ApiErrorKind {
    fn kind_str(&self) -> &str {
        match self {
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
        }
    }

    fn message_prefix(&self) -> &str {
        match self {
            Self::InternalServerError => "Internal server error",
            Self::StoreUnavailable => "Store unavailable",
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(src: StoreError) -> Self {
        error!("Store operation failed: {src}");
        debug!("{src:#?}");

        let kind = if src.is_unavailable() {
            ApiErrorKind::StoreUnavailable
        } else {
            ApiErrorKind::InternalServerError
        };

        Self {
            msg: src.to_string(),
            kind,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(src: serde_json::Error) -> Self {
        error!("Failed to convert stored document: {src}");
        Self {
            msg: format!("stored document has unexpected shape: {src}"),
            kind: ApiErrorKind::InternalServerError,
        }
    }
}

impl<S: ScalarValue> IntoFieldError<S> for ApiError {
    fn into_field_error(self) -> FieldError<S> {
        let msg = format!("{}: {}", self.kind.message_prefix(), self.msg);
        FieldError::new(msg, graphql_value!({ "kind": (self.kind.kind_str()) }))
    }
}


/// `api_err!(Kind, "format {}", args)`
macro_rules! api_err {
    ($kind:ident, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::api::err::ApiError {
            msg: format!($fmt $(, $arg)*),
            kind: $crate::api::err::ApiErrorKind::$kind,
        }
    };
}

macro_rules! internal_server_error {
    ($($t:tt)+) => { $crate::api::err::api_err!(InternalServerError, $($t)*) };
}

pub(crate) use api_err;
pub(crate) use internal_server_error;


#[cfg(test)]
mod tests {
    use juniper::{DefaultScalarValue, IntoFieldError, graphql_value};

    use deadpool_postgres::PoolError;

    use crate::{model::Key, store::{Collection, StoreError}};
    use super::{ApiError, ApiErrorKind};

    #[test]
    fn store_errors_map_to_kinds() {
        let err = ApiError::from(StoreError::NotAnObject { collection: Collection::Clients, key: Key(3) });
        assert_eq!(err.kind, ApiErrorKind::InternalServerError);
        assert!(err.msg.contains("clients"));

        let err = ApiError::from(StoreError::Unavailable(PoolError::Closed));
        assert_eq!(err.kind, ApiErrorKind::StoreUnavailable);
    }

    #[test]
    fn field_error_carries_kind() {
        let err = super::internal_server_error!("nope {}", 1);
        let field_err = IntoFieldError::<DefaultScalarValue>::into_field_error(err);
        assert_eq!(field_err.message(), "Internal server error: nope 1");
        assert_eq!(field_err.extensions(), &graphql_value!({ "kind": "INTERNAL_SERVER_ERROR" }));
    }
}
