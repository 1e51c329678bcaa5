pub mod mocks;

use std::sync::Arc;
use std::time::Duration;

use doggy_common_types::{NewDog, NewUser};

use self::mocks::{MockObjectStorage, MockStore};
use crate::graphql_api::{api_schema, ApiSchema, ApiSchemaContext};
use crate::rest::RestState;

pub const TEST_BUCKET: &str = "doggy-date-app";

/// A GraphQL schema backed by `store`.
pub fn schema_with_store(store: Arc<MockStore>) -> ApiSchema {
    api_schema(ApiSchemaContext::new(store))
}

pub fn rest_state(
    store: Arc<MockStore>,
    storage: Arc<MockObjectStorage>,
    upload_timeout: Duration,
) -> RestState {
    RestState {
        store,
        storage,
        bucket: TEST_BUCKET.to_string(),
        upload_timeout,
    }
}

pub fn new_user(name: &str, email: &str) -> NewUser {
    NewUser {
        name: name.to_string(),
        email: email.to_string(),
        profile_image_url: String::new(),
    }
}

pub fn new_dog(name: &str, age: i32) -> NewDog {
    NewDog {
        name: name.to_string(),
        age,
        breed: "Mutt".to_string(),
        profile_image_url: String::new(),
    }
}
