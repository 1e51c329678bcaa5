use diesel::result::{DatabaseErrorKind, Error as DieselError};
use doggy_common_types::Table;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures of [`DoggyStore`](crate::DoggyStore) operations.
///
/// [`StoreError::NotFound`] is an expected outcome rather than an
/// operational failure; every other variant means the database did not do
/// what was asked.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database unavailable: {0}")]
    Connection(String),
    #[error("no row in `{table}` matches `{key}`")]
    NotFound { table: Table, key: String },
    #[error("email `{0}` is already registered")]
    DuplicateEmail(String),
    #[error("`{0}` rows have no profile image")]
    NoProfileImage(Table),
    #[error("write failed: {0}")]
    Write(#[source] BoxError),
    #[error("query failed: {0}")]
    Query(#[source] BoxError),
}

impl StoreError {
    pub fn not_found(table: Table, key: impl ToString) -> Self {
        Self::NotFound {
            table,
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Classifies a failed insert or update. Unique violations on the email
    /// column are a business rule, not an I/O problem.
    pub(crate) fn write(err: DieselError, email: Option<&str>) -> Self {
        match (&err, email) {
            (DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info), Some(email))
                if info.constraint_name() == Some("users_email_key") =>
            {
                Self::DuplicateEmail(email.to_string())
            }
            _ => Self::Write(Box::new(err)),
        }
    }
}

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        Self::Query(Box::new(err))
    }
}
