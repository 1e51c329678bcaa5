use std::sync::Arc;

use async_graphql::{Context, ErrorExtensions, Object, ID};
use chrono::{DateTime, Utc};
use doggy_common_types::{normalize_email, parse_id, NewDog, NewDoggyDate, NewUser};
use doggy_store::models::UserWithDogs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::api_types::{DogView, DoggyDateView, Lookup, UserView};
use super::error::ApiError;
use super::{ctx_data, ApiSchemaContext};
use crate::metrics;

/// Records the outcome of a resolver and turns [`ApiError`]s into GraphQL
/// errors with a `code` extension.
fn finish<T>(operation: &'static str, result: Result<T, ApiError>) -> async_graphql::Result<T> {
    metrics().record_resolver_call(operation, &result);
    result.map_err(|err| {
        match &err {
            ApiError::Write(source) | ApiError::Query(source) => {
                warn!(operation, error = %source, "Resolver failed")
            }
            _ => debug!(operation, error = %err, "Resolver rejected request"),
        }
        err.extend()
    })
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Fetches a single user, and their dogs, by ID.
    async fn user(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<UserView> {
        finish("user", user(ctx_data(ctx), &id).await)
    }

    /// Fetches a single dog, and its owner, by ID.
    async fn dog(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<DogView> {
        finish("dog", dog(ctx_data(ctx), &id).await)
    }

    /// Looks a user up by email. There's no password; knowing the email is
    /// enough.
    async fn login_user(
        &self,
        ctx: &Context<'_>,
        email: String,
    ) -> async_graphql::Result<UserView> {
        finish("loginUser", login_user(ctx_data(ctx), &email).await)
    }

    /// Lists users with exactly the given name, or all users.
    async fn users(
        &self,
        ctx: &Context<'_>,
        name: Option<String>,
    ) -> async_graphql::Result<Vec<UserView>> {
        let result = ctx_data(ctx)
            .store
            .users_by_name(name.as_deref())
            .await
            .map(UserView::many_from_joined)
            .map_err(ApiError::from);
        finish("users", result)
    }

    /// Lists dogs with exactly the given name, or all dogs.
    async fn dogs(
        &self,
        ctx: &Context<'_>,
        name: Option<String>,
    ) -> async_graphql::Result<Vec<DogView>> {
        let result = ctx_data(ctx)
            .store
            .dogs_by_name(name.as_deref())
            .await
            .map(DogView::many_from_joined)
            .map_err(ApiError::from);
        finish("dogs", result)
    }

    /// All doggy dates, ordered by date.
    async fn get_doggy_dates(
        &self,
        ctx: &Context<'_>,
    ) -> async_graphql::Result<Vec<DoggyDateView>> {
        let result = ctx_data(ctx)
            .store
            .doggy_dates()
            .await
            .map(DoggyDateView::many_from_listing)
            .map_err(ApiError::from);
        finish("getDoggyDates", result)
    }
}

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Signs up a new user together with their first dog.
    #[allow(clippy::too_many_arguments)]
    async fn create_user(
        &self,
        ctx: &Context<'_>,
        name: String,
        email: String,
        #[graphql(name = "userProfileImageURL", default)] user_profile_image_url: String,
        dog_name: String,
        #[graphql(validator(minimum = 0))] dog_age: i32,
        dog_breed: String,
        #[graphql(name = "dogProfileImageURL", default)] dog_profile_image_url: String,
    ) -> async_graphql::Result<UserView> {
        let user = NewUser {
            name,
            email,
            profile_image_url: user_profile_image_url,
        };
        let dog = NewDog {
            name: dog_name,
            age: dog_age,
            breed: dog_breed,
            profile_image_url: dog_profile_image_url,
        };
        finish("createUser", create_user(ctx_data(ctx), user, dog).await)
    }

    /// Plans a doggy date organized by `user`.
    async fn plan_date(
        &self,
        ctx: &Context<'_>,
        date: DateTime<Utc>,
        description: String,
        dogs: Vec<ID>,
        location: String,
        user: ID,
    ) -> async_graphql::Result<DoggyDateView> {
        let result = async {
            let input = NewDoggyDate {
                date,
                description,
                dogs: dogs
                    .iter()
                    .map(|id| parse_id(id))
                    .collect::<Result<Vec<_>, _>>()?,
                location,
                user: parse_id(&user)?,
            };
            plan_date(ctx_data(ctx), input).await
        };
        finish("planDate", result.await)
    }
}

pub(crate) async fn user(ctx: &ApiSchemaContext, id: &str) -> Result<UserView, ApiError> {
    let id = parse_id(id)?;
    let joined = ctx.store.user_by_id(id).await?;
    Ok(UserView::from_joined(joined))
}

pub(crate) async fn dog(ctx: &ApiSchemaContext, id: &str) -> Result<DogView, ApiError> {
    let id = parse_id(id)?;
    let joined = ctx.store.dog_by_id(id).await?;
    Ok(DogView::from_joined(joined))
}

fn valid_email(email: &str) -> Result<String, ApiError> {
    normalize_email(email)
        .ok_or_else(|| ApiError::InvalidInput("email must not be blank".to_string()))
}

pub(crate) async fn login_user(ctx: &ApiSchemaContext, email: &str) -> Result<UserView, ApiError> {
    let joined = ctx.store.user_by_email(&valid_email(email)?).await?;
    Ok(UserView::from_joined(joined))
}

/// Refuses emails that are already taken before writing anything.
pub(crate) async fn create_user(
    ctx: &ApiSchemaContext,
    mut user: NewUser,
    dog: NewDog,
) -> Result<UserView, ApiError> {
    user.email = valid_email(&user.email)?;
    if ctx.store.email_exists(&user.email).await? {
        return Err(ApiError::DuplicateEmail(user.email));
    }

    let (user, dog) = ctx.store.insert_user_with_dog(user, dog).await?;
    info!(user_id = %user.id, dog_id = %dog.id, "Created user");

    Ok(UserView::from_joined(UserWithDogs {
        user,
        dogs: vec![dog],
    }))
}

/// Resolves the organizer and every participant before inserting, so the
/// returned view needs no further queries and dangling references are never
/// written.
pub(crate) async fn plan_date(
    ctx: &ApiSchemaContext,
    input: NewDoggyDate,
) -> Result<DoggyDateView, ApiError> {
    let organizer = ctx.store.user_by_id(input.user).await?;
    let participants = ctx.store.dogs_by_ids(&input.dogs).await?;

    let unknown: Vec<Uuid> = input
        .dogs
        .iter()
        .filter(|id| !participants.dogs.contains_key(id))
        .copied()
        .collect();
    if !unknown.is_empty() {
        let unknown: Vec<String> = unknown.iter().map(Uuid::to_string).collect();
        return Err(ApiError::InvalidInput(format!(
            "unknown dogs: {}",
            unknown.join(", ")
        )));
    }

    let date = ctx.store.insert_doggy_date(input).await?;
    info!(date_id = %date.id, organizer = %date.user, "Planned doggy date");

    let mut lookup = Lookup::from(participants);
    for dog in organizer.dogs {
        lookup.dogs.entry(dog.id).or_insert(dog);
    }
    lookup.users.insert(organizer.user.id, organizer.user);

    Ok(DoggyDateView::new(date, Arc::new(lookup)))
}
