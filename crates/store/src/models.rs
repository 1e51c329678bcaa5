use std::collections::HashMap;

use chrono::{DateTime, SubsecRound, Utc};
use diesel::{Insertable, Queryable, Selectable};
use doggy_common_types::{NewDog, NewDoggyDate, NewUser};
use uuid::Uuid;

use super::schema::*;

/// A registered user. `dogs` lists the IDs of the dogs they own, in
/// registration order.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub dogs: Vec<Uuid>,
    #[diesel(column_name = profile_image)]
    pub profile_image_url: String,
    pub join_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = dogs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Dog {
    pub id: Uuid,
    pub name: String,
    pub age: i32,
    pub breed: String,
    pub owner: Uuid,
    #[diesel(column_name = profile_image)]
    pub profile_image_url: String,
}

/// A planned meetup between some dogs, organized by a user.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = doggy_dates)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DoggyDate {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub description: String,
    pub dogs: Vec<Uuid>,
    pub location: String,
    pub user: Uuid,
}

impl User {
    /// Assigns fresh identifiers to a user and their first dog, and links the
    /// two together.
    pub fn new_with_dog(user: NewUser, dog: NewDog) -> (User, Dog) {
        let user_id = Uuid::new_v4();
        let dog_id = Uuid::new_v4();

        let user = User {
            id: user_id,
            name: user.name,
            email: user.email,
            dogs: vec![dog_id],
            profile_image_url: user.profile_image_url,
            // Postgres only keeps microseconds.
            join_date: Utc::now().trunc_subsecs(6),
        };
        let dog = Dog {
            id: dog_id,
            name: dog.name,
            age: dog.age,
            breed: dog.breed,
            owner: user_id,
            profile_image_url: dog.profile_image_url,
        };

        (user, dog)
    }
}

impl From<NewDoggyDate> for DoggyDate {
    fn from(date: NewDoggyDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            date: date.date.trunc_subsecs(6),
            description: date.description,
            dogs: date.dogs,
            location: date.location,
            user: date.user,
        }
    }
}

/// A user together with the dogs that were joined onto it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserWithDogs {
    pub user: User,
    /// Ordered by name.
    pub dogs: Vec<Dog>,
}

/// A dog and its owner. The owner comes with all of their dogs, this one
/// included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DogWithOwner {
    pub dog: Dog,
    pub owner: UserWithDogs,
}

/// The result of a batch lookup of dogs, keyed by ID. IDs that matched no
/// row are simply missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DogLookup {
    pub dogs: HashMap<Uuid, Dog>,
    pub owners: HashMap<Uuid, User>,
    /// Every dog of every owner in `owners`, requested or not.
    pub owned_dogs: HashMap<Uuid, Dog>,
}

impl DogLookup {
    pub fn insert(&mut self, dog: Dog, owner: User) {
        self.owners.insert(owner.id, owner);
        self.owned_dogs.insert(dog.id, dog.clone());
        self.dogs.insert(dog.id, dog);
    }

    pub fn is_empty(&self) -> bool {
        self.dogs.is_empty()
    }
}

/// All doggy dates, plus everything that's needed to resolve their
/// organizers and participants without further queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoggyDateListing {
    /// Ordered by date.
    pub dates: Vec<DoggyDate>,
    pub users: HashMap<Uuid, User>,
    pub dogs: HashMap<Uuid, Dog>,
}
