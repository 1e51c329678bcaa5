//! GraphQL views over the domain model.
//!
//! Every view holds its entity plus a shared [`Lookup`] that was filled by the
//! resolver that produced it. Nested fields are read from that lookup, so
//! walking the object graph never goes back to the database.
//!
//! The plain accessors on each view (`UserView::dogs`, `DogView::owner`,
//! `DoggyDateView::user`, ...) are its field contract. The `#[Object]` impls
//! only rename and delegate to them.

use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::{Object, ID};
use chrono::{DateTime, Utc};
use doggy_store::models::{
    Dog, DogLookup, DogWithOwner, DoggyDate, DoggyDateListing, User, UserWithDogs,
};
use uuid::Uuid;

/// Request-scoped ID→entity maps.
#[derive(Debug, Default)]
pub struct Lookup {
    pub users: HashMap<Uuid, User>,
    pub dogs: HashMap<Uuid, Dog>,
}

impl Lookup {
    fn add_user(&mut self, user: User) {
        self.users.insert(user.id, user);
    }

    fn add_dog(&mut self, dog: Dog) {
        self.dogs.insert(dog.id, dog);
    }

    fn add_user_with_dogs(&mut self, user: User, dogs: Vec<Dog>) {
        self.add_user(user);
        for dog in dogs {
            self.add_dog(dog);
        }
    }

    /// All dogs of `owner` in this lookup, ordered by name.
    fn dogs_of(&self, owner: Uuid) -> Vec<&Dog> {
        let mut dogs: Vec<&Dog> = self.dogs.values().filter(|d| d.owner == owner).collect();
        dogs.sort_by(|a, b| (&a.name, a.id).cmp(&(&b.name, b.id)));
        dogs
    }
}

impl From<DogLookup> for Lookup {
    fn from(lookup: DogLookup) -> Self {
        let mut dogs = lookup.owned_dogs;
        dogs.extend(lookup.dogs);
        Self {
            users: lookup.owners,
            dogs,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserView {
    user: User,
    lookup: Arc<Lookup>,
}

impl UserView {
    pub fn new(user: User, lookup: Arc<Lookup>) -> Self {
        Self { user, lookup }
    }

    pub fn from_joined(joined: UserWithDogs) -> Self {
        let mut lookup = Lookup::default();
        lookup.add_user_with_dogs(joined.user.clone(), joined.dogs);
        Self::new(joined.user, Arc::new(lookup))
    }

    /// Builds views for many joined users at once, sharing one lookup.
    pub fn many_from_joined(joined: Vec<UserWithDogs>) -> Vec<Self> {
        let mut lookup = Lookup::default();
        let mut users = Vec::with_capacity(joined.len());
        for UserWithDogs { user, dogs } in joined {
            lookup.add_user_with_dogs(user.clone(), dogs);
            users.push(user);
        }

        let lookup = Arc::new(lookup);
        users
            .into_iter()
            .map(|user| Self::new(user, lookup.clone()))
            .collect()
    }

    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn name(&self) -> &str {
        &self.user.name
    }

    pub fn email(&self) -> &str {
        &self.user.email
    }

    /// Ordered by name. Every producer of a lookup loads all dogs of the
    /// users it contains, so this is the same list however the user was
    /// reached.
    pub fn dogs(&self) -> Vec<DogView> {
        self.lookup
            .dogs_of(self.user.id)
            .into_iter()
            .map(|dog| DogView::new(dog.clone(), self.lookup.clone()))
            .collect()
    }

    pub fn profile_image_url(&self) -> &str {
        &self.user.profile_image_url
    }

    pub fn join_date(&self) -> DateTime<Utc> {
        self.user.join_date
    }
}

/// A registered user.
#[Object(name = "User")]
impl UserView {
    #[graphql(name = "id")]
    async fn graphql_id(&self) -> ID {
        ID(self.id().to_string())
    }

    #[graphql(name = "name")]
    async fn graphql_name(&self) -> &str {
        self.name()
    }

    #[graphql(name = "email")]
    async fn graphql_email(&self) -> &str {
        self.email()
    }

    /// The dogs this user owns.
    #[graphql(name = "dogs")]
    async fn graphql_dogs(&self) -> Vec<DogView> {
        self.dogs()
    }

    #[graphql(name = "profileImageURL")]
    async fn graphql_profile_image_url(&self) -> &str {
        self.profile_image_url()
    }

    /// When the user signed up, in RFC 3339 format.
    #[graphql(name = "joinDate")]
    async fn graphql_join_date(&self) -> DateTime<Utc> {
        self.join_date()
    }
}

#[derive(Debug, Clone)]
pub struct DogView {
    dog: Dog,
    lookup: Arc<Lookup>,
}

impl DogView {
    pub fn new(dog: Dog, lookup: Arc<Lookup>) -> Self {
        Self { dog, lookup }
    }

    pub fn from_joined(joined: DogWithOwner) -> Self {
        let mut lookup = Lookup::default();
        lookup.add_user_with_dogs(joined.owner.user, joined.owner.dogs);
        lookup.add_dog(joined.dog.clone());
        Self::new(joined.dog, Arc::new(lookup))
    }

    pub fn many_from_joined(joined: Vec<DogWithOwner>) -> Vec<Self> {
        let mut lookup = Lookup::default();
        let mut dogs = Vec::with_capacity(joined.len());
        for DogWithOwner { dog, owner } in joined {
            lookup.add_user_with_dogs(owner.user, owner.dogs);
            lookup.add_dog(dog.clone());
            dogs.push(dog);
        }

        let lookup = Arc::new(lookup);
        dogs.into_iter()
            .map(|dog| Self::new(dog, lookup.clone()))
            .collect()
    }

    pub fn id(&self) -> Uuid {
        self.dog.id
    }

    pub fn name(&self) -> &str {
        &self.dog.name
    }

    pub fn age(&self) -> i32 {
        self.dog.age
    }

    pub fn breed(&self) -> &str {
        &self.dog.breed
    }

    pub fn owner_id(&self) -> Uuid {
        self.dog.owner
    }

    pub fn owner(&self) -> Option<UserView> {
        self.lookup
            .users
            .get(&self.dog.owner)
            .map(|user| UserView::new(user.clone(), self.lookup.clone()))
    }

    pub fn profile_image_url(&self) -> &str {
        &self.dog.profile_image_url
    }
}

/// A dog, always owned by exactly one user.
#[Object(name = "Dog")]
impl DogView {
    #[graphql(name = "id")]
    async fn graphql_id(&self) -> ID {
        ID(self.id().to_string())
    }

    #[graphql(name = "name")]
    async fn graphql_name(&self) -> &str {
        self.name()
    }

    /// Age in years.
    #[graphql(name = "age")]
    async fn graphql_age(&self) -> i32 {
        self.age()
    }

    #[graphql(name = "breed")]
    async fn graphql_breed(&self) -> &str {
        self.breed()
    }

    #[graphql(name = "owner")]
    async fn graphql_owner(&self) -> Option<UserView> {
        self.owner()
    }

    #[graphql(name = "profileImageURL")]
    async fn graphql_profile_image_url(&self) -> &str {
        self.profile_image_url()
    }
}

#[derive(Debug, Clone)]
pub struct DoggyDateView {
    date: DoggyDate,
    lookup: Arc<Lookup>,
}

impl DoggyDateView {
    pub fn new(date: DoggyDate, lookup: Arc<Lookup>) -> Self {
        Self { date, lookup }
    }

    pub fn many_from_listing(listing: DoggyDateListing) -> Vec<Self> {
        let lookup = Arc::new(Lookup {
            users: listing.users,
            dogs: listing.dogs,
        });
        listing
            .dates
            .into_iter()
            .map(|date| Self::new(date, lookup.clone()))
            .collect()
    }

    pub fn id(&self) -> Uuid {
        self.date.id
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date.date
    }

    pub fn description(&self) -> &str {
        &self.date.description
    }

    /// Participating dogs, in the order they were given when planning.
    pub fn dogs(&self) -> Vec<DogView> {
        self.date
            .dogs
            .iter()
            .filter_map(|id| self.lookup.dogs.get(id))
            .map(|dog| DogView::new(dog.clone(), self.lookup.clone()))
            .collect()
    }

    pub fn location(&self) -> &str {
        &self.date.location
    }

    /// The organizer.
    pub fn user(&self) -> Option<UserView> {
        self.lookup
            .users
            .get(&self.date.user)
            .map(|user| UserView::new(user.clone(), self.lookup.clone()))
    }
}

/// A planned meetup between dogs.
#[Object(name = "DoggyDate")]
impl DoggyDateView {
    #[graphql(name = "id")]
    async fn graphql_id(&self) -> ID {
        ID(self.id().to_string())
    }

    /// When the date takes place, in RFC 3339 format.
    #[graphql(name = "date")]
    async fn graphql_date(&self) -> DateTime<Utc> {
        self.date()
    }

    #[graphql(name = "description")]
    async fn graphql_description(&self) -> &str {
        self.description()
    }

    #[graphql(name = "dogs")]
    async fn graphql_dogs(&self) -> Vec<DogView> {
        self.dogs()
    }

    #[graphql(name = "location")]
    async fn graphql_location(&self) -> &str {
        self.location()
    }

    /// The user who organized this date.
    #[graphql(name = "user")]
    async fn graphql_user(&self) -> Option<UserView> {
        self.user()
    }
}
