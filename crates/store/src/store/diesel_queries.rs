//! Provides the diesel queries, callers should handle connection pooling and
//! transactions.

use std::collections::{HashMap, HashSet};

use diesel::dsl::exists;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use doggy_common_types::Table;
use uuid::Uuid;

use crate::models::{Dog, DogLookup, DogWithOwner, DoggyDate, DoggyDateListing, User, UserWithDogs};
use crate::schema::{doggy_dates, dogs, users};

/// Folds `users LEFT JOIN dogs` rows into one entry per user, keeping the
/// order in which users first appear.
fn group_dogs_by_user(rows: Vec<(User, Option<Dog>)>) -> Vec<UserWithDogs> {
    let mut grouped: Vec<UserWithDogs> = vec![];
    let mut positions = HashMap::new();

    for (user, dog) in rows {
        let i = *positions.entry(user.id).or_insert_with(|| {
            grouped.push(UserWithDogs {
                user,
                dogs: vec![],
            });
            grouped.len() - 1
        });
        if let Some(dog) = dog {
            grouped[i].dogs.push(dog);
        }
    }

    grouped
}

pub(super) async fn user_by_id(
    conn: &mut AsyncPgConnection,
    id: Uuid,
) -> QueryResult<Option<UserWithDogs>> {
    let rows = users::table
        .left_join(dogs::table)
        .filter(users::id.eq(id))
        .select((users::all_columns, dogs::all_columns.nullable()))
        .order_by((dogs::name.asc(), dogs::id.asc()))
        .load::<(User, Option<Dog>)>(conn)
        .await?;

    Ok(group_dogs_by_user(rows).into_iter().next())
}

pub(super) async fn user_by_email(
    conn: &mut AsyncPgConnection,
    email: &str,
) -> QueryResult<Option<UserWithDogs>> {
    let rows = users::table
        .left_join(dogs::table)
        .filter(users::email.eq(email))
        .select((users::all_columns, dogs::all_columns.nullable()))
        .order_by((dogs::name.asc(), dogs::id.asc()))
        .load::<(User, Option<Dog>)>(conn)
        .await?;

    Ok(group_dogs_by_user(rows).into_iter().next())
}

pub(super) async fn users_by_name(
    conn: &mut AsyncPgConnection,
    name: Option<&str>,
) -> QueryResult<Vec<UserWithDogs>> {
    let mut query = users::table
        .left_join(dogs::table)
        .select((users::all_columns, dogs::all_columns.nullable()))
        .order_by((
            users::name.asc(),
            users::id.asc(),
            dogs::name.asc(),
            dogs::id.asc(),
        ))
        .into_boxed();

    if let Some(name) = name {
        query = query.filter(users::name.eq(name));
    }

    let rows = query.load::<(User, Option<Dog>)>(conn).await?;
    Ok(group_dogs_by_user(rows))
}

async fn users_by_ids(conn: &mut AsyncPgConnection, ids: &[Uuid]) -> QueryResult<Vec<User>> {
    if ids.is_empty() {
        return Ok(vec![]);
    }

    users::table
        .filter(users::id.eq_any(ids))
        .select(users::all_columns)
        .load::<User>(conn)
        .await
}

/// All dogs of the given owners, ordered by name.
async fn dogs_owned_by(conn: &mut AsyncPgConnection, owners: &[Uuid]) -> QueryResult<Vec<Dog>> {
    if owners.is_empty() {
        return Ok(vec![]);
    }

    dogs::table
        .filter(dogs::owner.eq_any(owners))
        .select(dogs::all_columns)
        .order_by((dogs::name.asc(), dogs::id.asc()))
        .load::<Dog>(conn)
        .await
}

fn with_owner(dog: Dog, owner: User, owned: &[Dog]) -> DogWithOwner {
    let dogs = owned.iter().filter(|d| d.owner == owner.id).cloned().collect();
    DogWithOwner {
        dog,
        owner: UserWithDogs { user: owner, dogs },
    }
}

pub(super) async fn dog_by_id(
    conn: &mut AsyncPgConnection,
    id: Uuid,
) -> QueryResult<Option<DogWithOwner>> {
    let row = dogs::table
        .inner_join(users::table)
        .filter(dogs::id.eq(id))
        .select((dogs::all_columns, users::all_columns))
        .first::<(Dog, User)>(conn)
        .await
        .optional()?;

    let Some((dog, owner)) = row else {
        return Ok(None);
    };
    let owned = dogs_owned_by(conn, &[owner.id]).await?;
    Ok(Some(with_owner(dog, owner, &owned)))
}

// This is a single SQL statement, regardless of how many IDs are requested.
// Besides the requested dogs it returns the other dogs of their owners, found
// through the owners' `dogs` arrays.
pub(super) async fn dogs_by_ids(
    conn: &mut AsyncPgConnection,
    ids: &[Uuid],
) -> QueryResult<DogLookup> {
    let mut lookup = DogLookup::default();
    if ids.is_empty() {
        return Ok(lookup);
    }

    let rows = dogs::table
        .inner_join(users::table)
        .filter(dogs::id.eq_any(ids).or(users::dogs.overlaps_with(ids)))
        .select((dogs::all_columns, users::all_columns))
        .load::<(Dog, User)>(conn)
        .await?;

    let requested: HashSet<Uuid> = ids.iter().copied().collect();
    let (hits, others): (Vec<_>, Vec<_>) = rows
        .into_iter()
        .partition(|(dog, _)| requested.contains(&dog.id));
    for (dog, owner) in hits {
        lookup.insert(dog, owner);
    }
    for (dog, owner) in others {
        if lookup.owners.contains_key(&owner.id) {
            lookup.owned_dogs.insert(dog.id, dog);
        }
    }
    Ok(lookup)
}

pub(super) async fn dogs_by_name(
    conn: &mut AsyncPgConnection,
    name: Option<&str>,
) -> QueryResult<Vec<DogWithOwner>> {
    let mut query = dogs::table
        .inner_join(users::table)
        .select((dogs::all_columns, users::all_columns))
        .order_by((dogs::name.asc(), dogs::id.asc()))
        .into_boxed();

    if let Some(name) = name {
        query = query.filter(dogs::name.eq(name));
    }

    let rows = query.load::<(Dog, User)>(conn).await?;
    let owners = distinct(rows.iter().map(|(_, owner)| owner.id));
    let owned = dogs_owned_by(conn, &owners).await?;

    Ok(rows
        .into_iter()
        .map(|(dog, owner)| with_owner(dog, owner, &owned))
        .collect())
}

/// Loads all doggy dates with at most four queries: the dates, their
/// participating dogs (with owners and the owners' dogs), the organizers that
/// weren't among those owners, and finally those organizers' dogs.
pub(super) async fn doggy_dates(conn: &mut AsyncPgConnection) -> QueryResult<DoggyDateListing> {
    let dates = doggy_dates::table
        .select(doggy_dates::all_columns)
        .order_by((doggy_dates::date.asc(), doggy_dates::id.asc()))
        .load::<DoggyDate>(conn)
        .await?;

    let participants = distinct(dates.iter().flat_map(|date| date.dogs.iter().copied()));
    let DogLookup {
        mut dogs,
        owners: mut users,
        owned_dogs,
    } = dogs_by_ids(conn, &participants).await?;
    dogs.extend(owned_dogs);

    let missing_organizers = distinct(
        dates
            .iter()
            .map(|date| date.user)
            .filter(|id| !users.contains_key(id)),
    );
    for user in users_by_ids(conn, &missing_organizers).await? {
        users.insert(user.id, user);
    }
    for dog in dogs_owned_by(conn, &missing_organizers).await? {
        dogs.insert(dog.id, dog);
    }

    Ok(DoggyDateListing { dates, users, dogs })
}

fn distinct(ids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}

pub(super) async fn email_exists(conn: &mut AsyncPgConnection, email: &str) -> QueryResult<bool> {
    diesel::select(exists(users::table.filter(users::email.eq(email))))
        .get_result::<bool>(conn)
        .await
}

pub(super) async fn id_exists(
    conn: &mut AsyncPgConnection,
    table: Table,
    id: Uuid,
) -> QueryResult<bool> {
    match table {
        Table::Users => {
            diesel::select(exists(users::table.find(id)))
                .get_result::<bool>(conn)
                .await
        }
        Table::Dogs => {
            diesel::select(exists(dogs::table.find(id)))
                .get_result::<bool>(conn)
                .await
        }
        Table::DoggyDates => {
            diesel::select(exists(doggy_dates::table.find(id)))
                .get_result::<bool>(conn)
                .await
        }
    }
}

pub(super) async fn insert_user(conn: &mut AsyncPgConnection, user: &User) -> QueryResult<()> {
    diesel::insert_into(users::table)
        .values(user)
        .execute(conn)
        .await?;
    Ok(())
}

pub(super) async fn insert_dog(conn: &mut AsyncPgConnection, dog: &Dog) -> QueryResult<()> {
    diesel::insert_into(dogs::table)
        .values(dog)
        .execute(conn)
        .await?;
    Ok(())
}

pub(super) async fn insert_doggy_date(
    conn: &mut AsyncPgConnection,
    date: &DoggyDate,
) -> QueryResult<()> {
    diesel::insert_into(doggy_dates::table)
        .values(date)
        .execute(conn)
        .await?;
    Ok(())
}

/// Only callable for tables that have an image column; the caller rejects
/// the rest.
pub(super) async fn update_profile_image(
    conn: &mut AsyncPgConnection,
    table: Table,
    id: Uuid,
    url: &str,
) -> QueryResult<usize> {
    match table {
        Table::Users => {
            diesel::update(users::table.find(id))
                .set(users::profile_image.eq(url))
                .execute(conn)
                .await
        }
        Table::Dogs => {
            diesel::update(dogs::table.find(id))
                .set(dogs::profile_image.eq(url))
                .execute(conn)
                .await
        }
        Table::DoggyDates => Ok(0),
    }
}

pub(super) async fn delete_dog(conn: &mut AsyncPgConnection, id: Uuid) -> QueryResult<usize> {
    diesel::delete(dogs::table.find(id)).execute(conn).await
}
