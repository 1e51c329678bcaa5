use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use doggy_common_types::{NewDog, NewDoggyDate, NewUser, Table};
use doggy_store::models::{
    Dog, DogLookup, DogWithOwner, DoggyDate, DoggyDateListing, User, UserWithDogs,
};
use doggy_store::{DoggyStore, StoreError};
use uuid::Uuid;

use crate::object_storage::{ObjectStorage, UploadError};

#[derive(Debug, Default)]
struct Rows {
    /// Insertion order.
    users: Vec<User>,
    dogs: Vec<Dog>,
    dates: Vec<DoggyDate>,
}

impl Rows {
    fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn dog(&self, id: Uuid) -> Option<&Dog> {
        self.dogs.iter().find(|d| d.id == id)
    }

    fn with_dogs(&self, user: &User) -> UserWithDogs {
        let mut dogs: Vec<Dog> = self
            .dogs
            .iter()
            .filter(|d| d.owner == user.id)
            .cloned()
            .collect();
        dogs.sort_by(|a, b| (&a.name, a.id).cmp(&(&b.name, b.id)));
        UserWithDogs {
            user: user.clone(),
            dogs,
        }
    }

    fn with_owner(&self, dog: &Dog) -> Option<DogWithOwner> {
        self.user(dog.owner).map(|owner| DogWithOwner {
            dog: dog.clone(),
            owner: self.with_dogs(owner),
        })
    }

    fn lookup(&self, ids: &[Uuid]) -> DogLookup {
        let mut lookup = DogLookup::default();
        for id in ids {
            if let Some(DogWithOwner { dog, owner }) = self.dog(*id).and_then(|d| self.with_owner(d)) {
                lookup.insert(dog, owner.user);
                for dog in owner.dogs {
                    lookup.owned_dogs.insert(dog.id, dog);
                }
            }
        }
        lookup
    }
}

/// An in-memory [`DoggyStore`] that counts calls per operation and can be
/// told to fail any of them. It doesn't override
/// [`DoggyStore::insert_user_with_dog`], so user creation goes through the
/// compensating-delete path.
#[derive(Debug, Default)]
pub struct MockStore {
    rows: Mutex<Rows>,
    calls: Mutex<HashMap<&'static str, usize>>,
    failing: Mutex<HashSet<&'static str>>,
}

const WRITES: [&str; 5] = [
    "insert_user",
    "insert_dog",
    "insert_doggy_date",
    "update_profile_image",
    "delete_dog",
];

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following call of `operation` fail with a write (for
    /// writes) or query error.
    pub fn fail_on(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn write_calls(&self) -> usize {
        WRITES.iter().map(|op| self.calls(op)).sum()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Adds a user and their dog without going through (and counting) the
    /// store API.
    pub fn seed(&self, user: NewUser, dog: NewDog) -> (User, Dog) {
        let (user, dog) = User::new_with_dog(user, dog);
        let mut rows = self.rows.lock().unwrap();
        rows.users.push(user.clone());
        rows.dogs.push(dog.clone());
        (user, dog)
    }

    /// Gives an already seeded user another dog.
    pub fn seed_dog(&self, owner: Uuid, dog: NewDog) -> Dog {
        let dog = Dog {
            id: Uuid::new_v4(),
            name: dog.name,
            age: dog.age,
            breed: dog.breed,
            owner,
            profile_image_url: dog.profile_image_url,
        };
        let mut rows = self.rows.lock().unwrap();
        if let Some(user) = rows.users.iter_mut().find(|u| u.id == owner) {
            user.dogs.push(dog.id);
        }
        rows.dogs.push(dog.clone());
        dog
    }

    pub fn user_count(&self) -> usize {
        self.rows.lock().unwrap().users.len()
    }

    pub fn dog_count(&self) -> usize {
        self.rows.lock().unwrap().dogs.len()
    }

    fn enter(&self, operation: &'static str) -> Result<(), StoreError> {
        *self.calls.lock().unwrap().entry(operation).or_default() += 1;

        if !self.failing.lock().unwrap().contains(operation) {
            return Ok(());
        }
        let message = format!("injected {operation} failure");
        if WRITES.contains(&operation) {
            Err(StoreError::Write(message.into()))
        } else {
            Err(StoreError::Query(message.into()))
        }
    }
}

#[async_trait]
impl DoggyStore for MockStore {
    async fn user_by_email(&self, email: &str) -> Result<UserWithDogs, StoreError> {
        self.enter("user_by_email")?;
        let rows = self.rows.lock().unwrap();
        rows.users
            .iter()
            .find(|u| u.email == email)
            .map(|u| rows.with_dogs(u))
            .ok_or_else(|| StoreError::not_found(Table::Users, email))
    }

    async fn user_by_id(&self, id: Uuid) -> Result<UserWithDogs, StoreError> {
        self.enter("user_by_id")?;
        let rows = self.rows.lock().unwrap();
        rows.user(id)
            .map(|u| rows.with_dogs(u))
            .ok_or_else(|| StoreError::not_found(Table::Users, id))
    }

    async fn users_by_name(&self, name: Option<&str>) -> Result<Vec<UserWithDogs>, StoreError> {
        self.enter("users_by_name")?;
        let rows = self.rows.lock().unwrap();
        let mut users: Vec<UserWithDogs> = rows
            .users
            .iter()
            .filter(|u| name.map_or(true, |name| u.name == name))
            .map(|u| rows.with_dogs(u))
            .collect();
        users.sort_by(|a, b| (&a.user.name, a.user.id).cmp(&(&b.user.name, b.user.id)));
        Ok(users)
    }

    async fn dog_by_id(&self, id: Uuid) -> Result<DogWithOwner, StoreError> {
        self.enter("dog_by_id")?;
        let rows = self.rows.lock().unwrap();
        rows.dog(id)
            .and_then(|d| rows.with_owner(d))
            .ok_or_else(|| StoreError::not_found(Table::Dogs, id))
    }

    async fn dogs_by_ids(&self, ids: &[Uuid]) -> Result<DogLookup, StoreError> {
        self.enter("dogs_by_ids")?;
        Ok(self.rows.lock().unwrap().lookup(ids))
    }

    async fn dogs_by_name(&self, name: Option<&str>) -> Result<Vec<DogWithOwner>, StoreError> {
        self.enter("dogs_by_name")?;
        let rows = self.rows.lock().unwrap();
        let mut dogs: Vec<DogWithOwner> = rows
            .dogs
            .iter()
            .filter(|d| name.map_or(true, |name| d.name == name))
            .filter_map(|d| rows.with_owner(d))
            .collect();
        dogs.sort_by(|a, b| (&a.dog.name, a.dog.id).cmp(&(&b.dog.name, b.dog.id)));
        Ok(dogs)
    }

    async fn doggy_dates(&self) -> Result<DoggyDateListing, StoreError> {
        self.enter("doggy_dates")?;
        let rows = self.rows.lock().unwrap();

        let mut dates = rows.dates.clone();
        dates.sort_by_key(|d| (d.date, d.id));

        let participants: Vec<Uuid> = dates.iter().flat_map(|d| d.dogs.clone()).collect();
        let DogLookup {
            mut dogs,
            owners: mut users,
            owned_dogs,
        } = rows.lookup(&participants);
        dogs.extend(owned_dogs);
        for date in &dates {
            if let Some(organizer) = rows.user(date.user) {
                users.insert(organizer.id, organizer.clone());
                for dog in rows.with_dogs(organizer).dogs {
                    dogs.insert(dog.id, dog);
                }
            }
        }

        Ok(DoggyDateListing { dates, users, dogs })
    }

    async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        self.enter("email_exists")?;
        Ok(self.rows.lock().unwrap().users.iter().any(|u| u.email == email))
    }

    async fn id_exists(&self, table: Table, id: Uuid) -> Result<bool, StoreError> {
        self.enter("id_exists")?;
        let rows = self.rows.lock().unwrap();
        Ok(match table {
            Table::Users => rows.user(id).is_some(),
            Table::Dogs => rows.dog(id).is_some(),
            Table::DoggyDates => rows.dates.iter().any(|d| d.id == id),
        })
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        self.enter("insert_user")?;
        let mut rows = self.rows.lock().unwrap();
        if rows.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail(user.email.clone()));
        }
        rows.users.push(user.clone());
        Ok(())
    }

    async fn insert_dog(&self, dog: &Dog) -> Result<(), StoreError> {
        self.enter("insert_dog")?;
        self.rows.lock().unwrap().dogs.push(dog.clone());
        Ok(())
    }

    async fn insert_doggy_date(&self, date: NewDoggyDate) -> Result<DoggyDate, StoreError> {
        self.enter("insert_doggy_date")?;
        let date = DoggyDate::from(date);
        self.rows.lock().unwrap().dates.push(date.clone());
        Ok(date)
    }

    async fn update_profile_image(
        &self,
        table: Table,
        id: Uuid,
        url: &str,
    ) -> Result<bool, StoreError> {
        self.enter("update_profile_image")?;
        let mut rows = self.rows.lock().unwrap();
        let image = match table {
            Table::Users => rows
                .users
                .iter_mut()
                .find(|u| u.id == id)
                .map(|u| &mut u.profile_image_url),
            Table::Dogs => rows
                .dogs
                .iter_mut()
                .find(|d| d.id == id)
                .map(|d| &mut d.profile_image_url),
            Table::DoggyDates => return Err(StoreError::NoProfileImage(table)),
        };
        Ok(image.map(|image| *image = url.to_string()).is_some())
    }

    async fn delete_dog(&self, id: Uuid) -> Result<bool, StoreError> {
        self.enter("delete_dog")?;
        let mut rows = self.rows.lock().unwrap();
        let before = rows.dogs.len();
        rows.dogs.retain(|d| d.id != id);
        Ok(rows.dogs.len() < before)
    }
}

/// Object storage that keeps nothing but the keys it was asked to store.
#[derive(Debug, Default)]
pub struct MockObjectStorage {
    /// Every `put` takes this long.
    delay: Option<Duration>,
    /// Answer every `put` with this HTTP status.
    reject_with: Option<u16>,
    keys: Mutex<Vec<String>>,
}

impl MockObjectStorage {
    pub const PUBLIC_BASE_URL: &'static str = "https://cdn.doggy.test";

    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn rejecting(status: u16) -> Self {
        Self {
            reject_with: Some(status),
            ..Default::default()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStorage for MockObjectStorage {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        _content: Bytes,
        _content_type: &str,
    ) -> Result<String, UploadError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(status) = self.reject_with {
            return Err(UploadError::Rejected(status));
        }
        self.keys.lock().unwrap().push(key.to_string());
        Ok(format!("{}/{}/{}", Self::PUBLIC_BASE_URL, bucket, key))
    }
}
