use async_graphql::ErrorExtensions;
use doggy_common_types::InvalidId;
use doggy_store::StoreError;

/// Everything a resolver can fail with. Each variant surfaces to clients with
/// a machine-readable `code` extension.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    InvalidId(#[from] InvalidId),
    #[error("{0}")]
    NotFound(String),
    #[error("email `{0}` is already registered")]
    DuplicateEmail(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("database write failed")]
    Write(#[source] StoreError),
    #[error("database query failed")]
    Query(#[source] StoreError),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidId(_) => "INVALID_ID",
            Self::NotFound(_) => "NOT_FOUND",
            Self::DuplicateEmail(_) => "DUPLICATE_EMAIL",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Write(_) => "WRITE_ERROR",
            Self::Query(_) => "QUERY_ERROR",
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::NotFound(err.to_string()),
            StoreError::DuplicateEmail(email) => Self::DuplicateEmail(email),
            StoreError::NoProfileImage(_) => Self::InvalidInput(err.to_string()),
            StoreError::Write(_) => Self::Write(err),
            StoreError::Connection(_) | StoreError::Query(_) => Self::Query(err),
        }
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| e.set("code", self.code()))
    }
}

#[cfg(test)]
mod tests {
    use doggy_common_types::Table;

    use super::*;

    #[test]
    fn store_errors_keep_their_meaning() {
        let not_found: ApiError = StoreError::not_found(Table::Dogs, "abc").into();
        assert_eq!(not_found.code(), "NOT_FOUND");

        let duplicate: ApiError = StoreError::DuplicateEmail("a@b.dog".to_string()).into();
        assert!(matches!(duplicate, ApiError::DuplicateEmail(ref email) if email == "a@b.dog"));

        let unavailable: ApiError = StoreError::Connection("refused".to_string()).into();
        assert_eq!(unavailable.code(), "QUERY_ERROR");
    }

    #[test]
    fn graphql_errors_carry_the_code() {
        let err = ApiError::InvalidId(InvalidId("nope".to_string())).extend();
        assert_eq!(err.message, "invalid ID `nope`");

        let extensions = err.extensions.unwrap();
        assert_eq!(
            extensions.get("code"),
            Some(&async_graphql::Value::from("INVALID_ID"))
        );
    }
}
