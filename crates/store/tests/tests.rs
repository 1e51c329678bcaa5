mod common;

use chrono::{TimeZone, Utc};
use doggy_common_types::{NewDog, NewDoggyDate, NewUser, Table};
use doggy_store::models::Dog;
use doggy_store::{DoggyStore, StoreError};
use tracing_test::traced_test;
use uuid::Uuid;

use crate::common::EmptyStoreForTesting;

fn new_user(email: &str) -> NewUser {
    NewUser {
        name: "Alice".to_string(),
        email: email.to_string(),
        profile_image_url: String::new(),
    }
}

fn new_dog(name: &str) -> NewDog {
    NewDog {
        name: name.to_string(),
        age: 3,
        breed: "Beagle".to_string(),
        profile_image_url: "https://img.example/rex.png".to_string(),
    }
}

#[tokio::test]
async fn empty_store_has_no_users_or_dates() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    assert!(store.users_by_name(None).await.unwrap().is_empty());
    assert!(store.dogs_by_name(None).await.unwrap().is_empty());
    assert!(store.doggy_dates().await.unwrap().dates.is_empty());
}

#[tokio::test]
async fn email_exists_after_user_is_created() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    assert!(!store.email_exists("alice@example.com").await.unwrap());
    store
        .insert_user_with_dog(new_user("alice@example.com"), new_dog("Rex"))
        .await
        .unwrap();
    assert!(store.email_exists("alice@example.com").await.unwrap());
    assert!(!store.email_exists("bob@example.com").await.unwrap());
}

#[tokio::test]
async fn dogs_by_empty_ids_is_empty() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    assert!(store.dogs_by_ids(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn inserted_user_and_dog_read_back_identically() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    let (user, dog) = store
        .insert_user_with_dog(new_user("alice@example.com"), new_dog("Rex"))
        .await
        .unwrap();
    assert_eq!(user.dogs, vec![dog.id]);
    assert_eq!(dog.owner, user.id);

    let by_id = store.user_by_id(user.id).await.unwrap();
    assert_eq!(by_id.user, user);
    assert_eq!(by_id.dogs, vec![dog.clone()]);

    let by_email = store.user_by_email("alice@example.com").await.unwrap();
    assert_eq!(by_email, by_id);

    let dog_with_owner = store.dog_by_id(dog.id).await.unwrap();
    assert_eq!(dog_with_owner.dog, dog);
    assert_eq!(dog_with_owner.owner, by_id);
}

#[tokio::test]
async fn duplicate_email_is_rejected_without_partial_writes() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    store
        .insert_user_with_dog(new_user("alice@example.com"), new_dog("Rex"))
        .await
        .unwrap();
    let err = store
        .insert_user_with_dog(new_user("alice@example.com"), new_dog("Fido"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateEmail(email) if email == "alice@example.com"));

    // The transaction was rolled back, so Fido never made it in.
    assert!(store.dogs_by_name(Some("Fido")).await.unwrap().is_empty());
    assert_eq!(store.users_by_name(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn missing_rows_are_not_found() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    let id = Uuid::new_v4();

    assert!(store.user_by_id(id).await.unwrap_err().is_not_found());
    assert!(store.dog_by_id(id).await.unwrap_err().is_not_found());
    assert!(store
        .user_by_email("nobody@example.com")
        .await
        .unwrap_err()
        .is_not_found());
    assert!(!store.id_exists(Table::Users, id).await.unwrap());
}

#[tokio::test]
async fn dogs_by_ids_skips_unknown_ids() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    let (user, dog) = store
        .insert_user_with_dog(new_user("alice@example.com"), new_dog("Rex"))
        .await
        .unwrap();
    let lookup = store.dogs_by_ids(&[dog.id, Uuid::new_v4()]).await.unwrap();

    assert_eq!(lookup.dogs.len(), 1);
    assert_eq!(lookup.dogs[&dog.id], dog);
    assert_eq!(lookup.owners[&user.id], user);
}

#[tokio::test]
async fn dog_reads_bring_all_of_the_owners_dogs() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    let (user, rex) = store
        .insert_user_with_dog(new_user("alice@example.com"), new_dog("Rex"))
        .await
        .unwrap();
    let bella = Dog {
        id: Uuid::new_v4(),
        name: "Bella".to_string(),
        age: 5,
        breed: "Collie".to_string(),
        owner: user.id,
        profile_image_url: String::new(),
    };
    store.insert_dog(&bella).await.unwrap();

    let owner = store.dog_by_id(rex.id).await.unwrap().owner;
    assert_eq!(owner.dogs, vec![bella.clone(), rex.clone()]);

    let lookup = store.dogs_by_ids(&[rex.id]).await.unwrap();
    assert_eq!(lookup.dogs.len(), 1);
    assert_eq!(lookup.owned_dogs.len(), 2);
    assert_eq!(lookup.owned_dogs[&bella.id], bella);

    let rexes = store.dogs_by_name(Some("Rex")).await.unwrap();
    assert_eq!(rexes[0].owner.dogs, vec![bella, rex]);
}

#[tokio::test]
async fn name_filters_match_exactly() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    store
        .insert_user_with_dog(new_user("alice@example.com"), new_dog("Rex"))
        .await
        .unwrap();
    store
        .insert_user_with_dog(
            NewUser {
                name: "Bob".to_string(),
                ..new_user("bob@example.com")
            },
            new_dog("Fido"),
        )
        .await
        .unwrap();

    let bobs = store.users_by_name(Some("Bob")).await.unwrap();
    assert_eq!(bobs.len(), 1);
    assert_eq!(bobs[0].dogs[0].name, "Fido");
    assert!(store.users_by_name(Some("bob")).await.unwrap().is_empty());

    let rexes = store.dogs_by_name(Some("Rex")).await.unwrap();
    assert_eq!(rexes.len(), 1);
    assert_eq!(rexes[0].owner.user.name, "Alice");
    assert_eq!(store.dogs_by_name(None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn doggy_dates_come_with_their_users_and_dogs() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    let (alice, rex) = store
        .insert_user_with_dog(new_user("alice@example.com"), new_dog("Rex"))
        .await
        .unwrap();
    let (bob, fido) = store
        .insert_user_with_dog(new_user("bob@example.com"), new_dog("Fido"))
        .await
        .unwrap();

    let date = store
        .insert_doggy_date(NewDoggyDate {
            date: Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap(),
            description: "Walk in the park".to_string(),
            dogs: vec![fido.id],
            location: "Central Park".to_string(),
            user: alice.id,
        })
        .await
        .unwrap();
    assert!(store.id_exists(Table::DoggyDates, date.id).await.unwrap());

    let listing = store.doggy_dates().await.unwrap();
    assert_eq!(listing.dates, vec![date]);
    // Organizer, participant, and participant's owner.
    assert_eq!(listing.users[&alice.id], alice);
    assert_eq!(listing.users[&bob.id], bob);
    assert_eq!(listing.dogs[&fido.id], fido);
    // The organizer's own dogs are there too.
    assert_eq!(listing.dogs[&rex.id], rex);
}

#[tokio::test]
async fn profile_images_can_be_replaced() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    let (user, dog) = store
        .insert_user_with_dog(new_user("alice@example.com"), new_dog("Rex"))
        .await
        .unwrap();

    let url = "https://img.example/new.png";
    assert!(store
        .update_profile_image(Table::Dogs, dog.id, url)
        .await
        .unwrap());
    assert!(store
        .update_profile_image(Table::Users, user.id, url)
        .await
        .unwrap());
    assert!(!store
        .update_profile_image(Table::Users, Uuid::new_v4(), url)
        .await
        .unwrap());

    assert_eq!(
        store.dog_by_id(dog.id).await.unwrap().dog.profile_image_url,
        url
    );
    assert_eq!(
        store.user_by_id(user.id).await.unwrap().user.profile_image_url,
        url
    );

    let err = store
        .update_profile_image(Table::DoggyDates, Uuid::new_v4(), url)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NoProfileImage(Table::DoggyDates)));
}

#[tokio::test]
async fn delete_dog_reports_whether_a_row_was_removed() {
    let store = EmptyStoreForTesting::new().await.unwrap();

    let (user, dog) = store
        .insert_user_with_dog(new_user("alice@example.com"), new_dog("Rex"))
        .await
        .unwrap();
    let second = Dog {
        id: Uuid::new_v4(),
        name: "Spot".to_string(),
        owner: user.id,
        ..dog
    };
    store.insert_dog(&second).await.unwrap();
    assert!(store.id_exists(Table::Dogs, second.id).await.unwrap());

    assert!(store.delete_dog(second.id).await.unwrap());
    assert!(!store.delete_dog(second.id).await.unwrap());
    assert!(!store.id_exists(Table::Dogs, second.id).await.unwrap());
}

#[tokio::test]
#[traced_test]
async fn lost_database_fails_and_logs_user_creation() {
    let store = EmptyStoreForTesting::new().await.unwrap();
    store.stop_database().await.unwrap();

    let result = store
        .insert_user_with_dog(new_user("alice@example.com"), new_dog("Rex"))
        .await;

    assert!(result.is_err());
    assert!(logs_contain("Database operation failed"));
    assert!(logs_contain("insert_user_with_dog"));
}
