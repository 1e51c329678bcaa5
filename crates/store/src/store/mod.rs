mod diesel_queries;

use std::fmt::Debug;

use async_trait::async_trait;
use diesel_async::pooled_connection::deadpool::{Object, Pool};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use diesel_async_migrations::{embed_migrations, EmbeddedMigrations};
use doggy_common_types::{NewDog, NewDoggyDate, NewUser, Table};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::models::{Dog, DogLookup, DogWithOwner, DoggyDate, DoggyDateListing, User, UserWithDogs};
use crate::{DoggyStore, StoreError};

/// An abstraction over all database operations. It uses [`Arc`] internally, so
/// it's cheaply cloneable.
///
/// [`Arc`]: std::sync::Arc
#[derive(Clone)]
pub struct Store {
    pool: Pool<AsyncPgConnection>,
}

impl Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // It might contain sensitive data, so don't print it.
        f.debug_struct("Store").finish()
    }
}

impl Store {
    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

    /// Connects to the database, checks that it's reachable, and runs all
    /// pending migrations.
    pub async fn new(db_url: &str) -> Result<Self, StoreError> {
        info!("Initializing database connection pool");

        let manager = AsyncDieselConnectionManager::new(db_url);
        let pool = Pool::builder(manager)
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let store = Self { pool };

        store.ping().await?;
        store.run_migrations().await?;

        Ok(store)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        diesel::sql_query("SELECT 1")
            .execute(&mut conn)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;

        // Several API instances may start at once; only one of them may
        // migrate at a time. Blocks until we get the lock.
        diesel::sql_query("select pg_advisory_lock(1)")
            .execute(&mut conn)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        info!("Run database migrations");

        let migrated = Self::MIGRATIONS
            .run_pending_migrations(&mut conn)
            .await
            .map_err(|e| StoreError::Connection(format!("migrations failed: {e}")));

        diesel::sql_query("select pg_advisory_unlock(1)")
            .execute(&mut conn)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        migrated
    }

    pub async fn conn(&self) -> Result<Object<AsyncPgConnection>, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}

/// Logs failures where they happen. Missing rows are expected and only
/// show up at debug level.
fn logged<T>(operation: &'static str, result: Result<T, StoreError>) -> Result<T, StoreError> {
    match &result {
        Err(err) if err.is_not_found() => debug!(operation, error = %err, "No matching row"),
        Err(err) => error!(operation, error = %err, "Database operation failed"),
        Ok(_) => {}
    }
    result
}

/// Getters.
#[async_trait]
impl DoggyStore for Store {
    async fn user_by_email(&self, email: &str) -> Result<UserWithDogs, StoreError> {
        debug!(%email, "Querying user by email");
        let result = async {
            let mut conn = self.conn().await?;
            diesel_queries::user_by_email(&mut conn, email)
                .await?
                .ok_or_else(|| StoreError::not_found(Table::Users, email))
        };
        logged("user_by_email", result.await)
    }

    async fn user_by_id(&self, id: Uuid) -> Result<UserWithDogs, StoreError> {
        debug!(%id, "Querying user by ID");
        let result = async {
            let mut conn = self.conn().await?;
            diesel_queries::user_by_id(&mut conn, id)
                .await?
                .ok_or_else(|| StoreError::not_found(Table::Users, id))
        };
        logged("user_by_id", result.await)
    }

    async fn users_by_name(&self, name: Option<&str>) -> Result<Vec<UserWithDogs>, StoreError> {
        debug!(?name, "Querying users by name");
        let result = async {
            let mut conn = self.conn().await?;
            Ok::<_, StoreError>(diesel_queries::users_by_name(&mut conn, name).await?)
        };
        logged("users_by_name", result.await)
    }

    async fn dog_by_id(&self, id: Uuid) -> Result<DogWithOwner, StoreError> {
        debug!(%id, "Querying dog by ID");
        let result = async {
            let mut conn = self.conn().await?;
            diesel_queries::dog_by_id(&mut conn, id)
                .await?
                .ok_or_else(|| StoreError::not_found(Table::Dogs, id))
        };
        logged("dog_by_id", result.await)
    }

    async fn dogs_by_ids(&self, ids: &[Uuid]) -> Result<DogLookup, StoreError> {
        if ids.is_empty() {
            return Ok(DogLookup::default());
        }

        debug!(count = ids.len(), "Querying dogs by IDs");
        let result = async {
            let mut conn = self.conn().await?;
            Ok::<_, StoreError>(diesel_queries::dogs_by_ids(&mut conn, ids).await?)
        };
        logged("dogs_by_ids", result.await)
    }

    async fn dogs_by_name(&self, name: Option<&str>) -> Result<Vec<DogWithOwner>, StoreError> {
        debug!(?name, "Querying dogs by name");
        let result = async {
            let mut conn = self.conn().await?;
            Ok::<_, StoreError>(diesel_queries::dogs_by_name(&mut conn, name).await?)
        };
        logged("dogs_by_name", result.await)
    }

    async fn doggy_dates(&self) -> Result<DoggyDateListing, StoreError> {
        debug!("Querying all doggy dates");
        let result = async {
            let mut conn = self.conn().await?;
            Ok::<_, StoreError>(diesel_queries::doggy_dates(&mut conn).await?)
        };
        logged("doggy_dates", result.await)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        let result = async {
            let mut conn = self.conn().await?;
            Ok::<_, StoreError>(diesel_queries::email_exists(&mut conn, email).await?)
        };
        logged("email_exists", result.await)
    }

    async fn id_exists(&self, table: Table, id: Uuid) -> Result<bool, StoreError> {
        let result = async {
            let mut conn = self.conn().await?;
            Ok::<_, StoreError>(diesel_queries::id_exists(&mut conn, table, id).await?)
        };
        logged("id_exists", result.await)
    }

    // Setters and write operations.

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let result = async {
            let mut conn = self.conn().await?;
            diesel_queries::insert_user(&mut conn, user)
                .await
                .map_err(|e| StoreError::write(e, Some(&user.email)))
        };
        logged("insert_user", result.await)
    }

    async fn insert_dog(&self, dog: &Dog) -> Result<(), StoreError> {
        let result = async {
            let mut conn = self.conn().await?;
            diesel_queries::insert_dog(&mut conn, dog)
                .await
                .map_err(|e| StoreError::write(e, None))
        };
        logged("insert_dog", result.await)
    }

    /// Both rows are written in one transaction, so a failure leaves nothing
    /// behind and no compensating delete is needed.
    async fn insert_user_with_dog(
        &self,
        user: NewUser,
        dog: NewDog,
    ) -> Result<(User, Dog), StoreError> {
        let (user, dog) = User::new_with_dog(user, dog);
        info!(user_id = %user.id, dog_id = %dog.id, "Inserting user with dog");

        let result = async {
            let mut conn = self.conn().await?;
            conn.transaction::<_, StoreError, _>(|conn| {
                async move {
                    diesel_queries::insert_user(conn, &user)
                        .await
                        .map_err(|e| StoreError::write(e, Some(&user.email)))?;
                    diesel_queries::insert_dog(conn, &dog)
                        .await
                        .map_err(|e| StoreError::write(e, None))?;
                    Ok((user, dog))
                }
                .scope_boxed()
            })
            .await
        };
        logged("insert_user_with_dog", result.await)
    }

    async fn insert_doggy_date(&self, date: NewDoggyDate) -> Result<DoggyDate, StoreError> {
        let date = DoggyDate::from(date);
        info!(date_id = %date.id, organizer = %date.user, "Inserting doggy date");

        let result = async {
            let mut conn = self.conn().await?;
            diesel_queries::insert_doggy_date(&mut conn, &date)
                .await
                .map_err(|e| StoreError::write(e, None))
        };
        logged("insert_doggy_date", result.await)?;
        Ok(date)
    }

    async fn update_profile_image(
        &self,
        table: Table,
        id: Uuid,
        url: &str,
    ) -> Result<bool, StoreError> {
        if !table.has_profile_image() {
            return logged("update_profile_image", Err(StoreError::NoProfileImage(table)));
        }

        info!(%table, %id, %url, "Updating profile image");
        let result = async {
            let mut conn = self.conn().await?;
            diesel_queries::update_profile_image(&mut conn, table, id, url)
                .await
                .map(|updated| updated > 0)
                .map_err(|e| StoreError::write(e, None))
        };
        logged("update_profile_image", result.await)
    }

    async fn delete_dog(&self, id: Uuid) -> Result<bool, StoreError> {
        info!(%id, "Deleting dog");
        let result = async {
            let mut conn = self.conn().await?;
            diesel_queries::delete_dog(&mut conn, id)
                .await
                .map(|deleted| deleted > 0)
                .map_err(|e| StoreError::write(e, None))
        };
        logged("delete_dog", result.await)
    }
}
