use std::str::FromStr;

use quickcheck::Arbitrary;

/// Returned for table names outside the allow-list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown table `{0}`")]
pub struct UnknownTable(pub String);

/// The closed set of tables that table-parameterized store operations may
/// address. Every variant maps to fixed queries inside the store; table names
/// are never interpolated into SQL.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum Table {
    Users,
    Dogs,
    DoggyDates,
}

impl Table {
    /// Parses a table name as it appears in URLs, e.g. `doggy_dates`.
    pub fn parse(name: &str) -> Result<Self, UnknownTable> {
        Self::from_str(name).map_err(|_| UnknownTable(name.to_string()))
    }

    /// Whether rows of this table carry a profile image URL.
    pub fn has_profile_image(self) -> bool {
        matches!(self, Table::Users | Table::Dogs)
    }
}

impl Arbitrary for Table {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        *g.choose(&[Table::Users, Table::Dogs, Table::DoggyDates])
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use quickcheck::TestResult;
    use quickcheck_macros::quickcheck;
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn table_names() {
        let names: Vec<String> = Table::iter().map(|t| t.to_string()).collect();
        assert_eq!(names, vec!["users", "dogs", "doggy_dates"]);
    }

    #[quickcheck]
    fn known_names_parse(table: Table) -> bool {
        Table::from_str(table.as_ref()) == Ok(table)
    }

    #[quickcheck]
    fn unknown_names_are_rejected(name: String) -> TestResult {
        if Table::iter().any(|t| t.as_ref() == name) {
            return TestResult::discard();
        }
        TestResult::from_bool(Table::from_str(&name).is_err())
    }

    #[test]
    fn injection_attempts_are_rejected() {
        for name in [
            "users; DROP TABLE dogs",
            "Users",
            "users ",
            "pg_catalog.pg_user",
            "",
        ] {
            assert_eq!(Table::parse(name), Err(UnknownTable(name.to_string())));
        }
    }

    #[test]
    fn only_users_and_dogs_have_images() {
        assert!(Table::Users.has_profile_image());
        assert!(Table::Dogs.has_profile_image());
        assert!(!Table::DoggyDates.has_profile_image());
    }
}
