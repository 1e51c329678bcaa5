//! Field bundles for rows that are about to be inserted. Identifiers and
//! timestamps are assigned by the store, never by the caller.

use chrono::{DateTime, Utc};
use quickcheck::Arbitrary;
use uuid::Uuid;

/// The user half of a `createUser` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub profile_image_url: String,
}

/// The form in which email addresses are stored and looked up: without
/// surrounding whitespace. Blank addresses are refused.
pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim();
    (!email.is_empty()).then(|| email.to_string())
}

/// The dog that every new user must register together with their account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDog {
    pub name: String,
    /// Non-negative; enforced by the API and by a database constraint.
    pub age: i32,
    pub breed: String,
    pub profile_image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDoggyDate {
    pub date: DateTime<Utc>,
    pub description: String,
    /// Participating dogs, in the order given by the organizer.
    pub dogs: Vec<Uuid>,
    pub location: String,
    /// The organizing user.
    pub user: Uuid,
}

impl Arbitrary for NewUser {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        Self {
            name: String::arbitrary(g),
            email: format!("{}@{}.dog", u32::arbitrary(g), String::arbitrary(g)),
            profile_image_url: String::arbitrary(g),
        }
    }
}

impl Arbitrary for NewDog {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        Self {
            name: String::arbitrary(g),
            age: i32::from(u8::arbitrary(g)),
            breed: String::arbitrary(g),
            profile_image_url: String::arbitrary(g),
        }
    }
}
