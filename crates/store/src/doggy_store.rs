use async_trait::async_trait;
use doggy_common_types::{NewDog, NewDoggyDate, NewUser, Table};
use tracing::{error, warn};
use uuid::Uuid;

use crate::models::{Dog, DogLookup, DogWithOwner, DoggyDate, DoggyDateListing, User, UserWithDogs};
use crate::StoreError;

/// Every database operation the API needs. [`crate::Store`] implements it on
/// top of PostgreSQL; tests use an in-memory implementation.
#[async_trait]
pub trait DoggyStore: Send + Sync + 'static {
    /// Looks up a user and their dogs by email.
    async fn user_by_email(&self, email: &str) -> Result<UserWithDogs, StoreError>;

    /// Looks up a user and their dogs by primary key.
    async fn user_by_id(&self, id: Uuid) -> Result<UserWithDogs, StoreError>;

    /// Returns all users with exactly the given name, or all users if `name`
    /// is `None`.
    async fn users_by_name(&self, name: Option<&str>) -> Result<Vec<UserWithDogs>, StoreError>;

    async fn dog_by_id(&self, id: Uuid) -> Result<DogWithOwner, StoreError>;

    /// Fetches many dogs and their owners in a single round trip. Unknown IDs
    /// are skipped; an empty `ids` never reaches the database.
    async fn dogs_by_ids(&self, ids: &[Uuid]) -> Result<DogLookup, StoreError>;

    async fn dogs_by_name(&self, name: Option<&str>) -> Result<Vec<DogWithOwner>, StoreError>;

    /// Returns every doggy date together with lookup maps for the organizers
    /// and the participating dogs.
    async fn doggy_dates(&self) -> Result<DoggyDateListing, StoreError>;

    /// `Ok(false)` when no user has this email.
    async fn email_exists(&self, email: &str) -> Result<bool, StoreError>;

    async fn id_exists(&self, table: Table, id: Uuid) -> Result<bool, StoreError>;

    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    async fn insert_dog(&self, dog: &Dog) -> Result<(), StoreError>;

    async fn insert_doggy_date(&self, date: NewDoggyDate) -> Result<DoggyDate, StoreError>;

    /// Returns whether a row was updated. Fails for tables without an image
    /// column.
    async fn update_profile_image(
        &self,
        table: Table,
        id: Uuid,
        url: &str,
    ) -> Result<bool, StoreError>;

    async fn delete_dog(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Creates a user together with their first dog.
    ///
    /// This default implementation is for stores without transactions: the
    /// dog is written first, and if writing the user then fails the dog is
    /// deleted again. The original error is returned whether or not that
    /// rollback succeeds.
    async fn insert_user_with_dog(
        &self,
        user: NewUser,
        dog: NewDog,
    ) -> Result<(User, Dog), StoreError> {
        let (user, dog) = User::new_with_dog(user, dog);

        self.insert_dog(&dog).await?;

        if let Err(err) = self.insert_user(&user).await {
            warn!(
                dog_id = %dog.id,
                error = %err,
                "User insert failed, deleting the dog that was written for it"
            );
            match self.delete_dog(dog.id).await {
                Ok(true) => {}
                Ok(false) => error!(dog_id = %dog.id, "Rollback found no dog to delete"),
                Err(rollback_err) => {
                    error!(dog_id = %dog.id, error = %rollback_err, "Failed to roll back dog insert")
                }
            }
            return Err(err);
        }

        Ok((user, dog))
    }
}
