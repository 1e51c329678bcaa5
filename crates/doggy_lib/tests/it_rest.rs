use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::StatusCode;
use doggy_common_types::Table;
use doggy_lib::object_storage::UploadError;
use doggy_lib::rest::{
    check_email, rest_routes, upload_profile_image, Image, RestError, RestState,
};
use doggy_lib::test_utils::mocks::{MockObjectStorage, MockStore};
use doggy_lib::test_utils::{new_dog, new_user, rest_state, TEST_BUCKET};
use doggy_store::DoggyStore;
use reqwest::multipart::{Form, Part};
use tokio::net::TcpListener;

const TIMEOUT: Duration = Duration::from_secs(30);
const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";

fn png() -> Image {
    Image {
        content: Bytes::from_static(PNG),
        content_type: "image/png".to_string(),
    }
}

/// Serves the REST routes on a random local port and returns the base URL.
async fn serve(state: RestState) -> String {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, rest_routes(state)).await });
    format!("http://{addr}")
}

#[tokio::test]
async fn email_exists_once_the_user_signs_up() {
    let store = MockStore::new();

    assert!(!check_email(&store, "alice@example.com").await.unwrap());
    store.seed(new_user("Alice", "alice@example.com"), new_dog("Rex", 3));
    assert!(check_email(&store, "alice@example.com").await.unwrap());
}

#[tokio::test]
async fn blank_email_is_a_bad_request() {
    let store = MockStore::new();

    let err = check_email(&store, "  ").await.unwrap_err();
    assert!(matches!(err, RestError::InvalidEmail));
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.total_calls(), 0);
}

#[tokio::test]
async fn email_exists_over_http() {
    let store = Arc::new(MockStore::new());
    store.seed(new_user("Alice", "alice@example.com"), new_dog("Rex", 3));
    let base = serve(rest_state(store, Arc::new(MockObjectStorage::default()), TIMEOUT)).await;

    let client = reqwest::Client::new();
    let url = format!("{base}/emailExists");

    let response = client
        .post(&url)
        .json(&serde_json::json!({ "email": "alice@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "true");

    let response = client
        .post(&url)
        .json(&serde_json::json!({ "email": "bob@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "false");

    let response = client
        .post(&url)
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(
        response.text().await.unwrap(),
        "Bad request: Please provide valid email!"
    );
}

#[tokio::test]
async fn upload_sets_the_profile_image() {
    let store = Arc::new(MockStore::new());
    let storage = Arc::new(MockObjectStorage::default());
    let (user, dog) = store.seed(new_user("Alice", "alice@example.com"), new_dog("Rex", 3));
    let state = rest_state(store.clone(), storage.clone(), TIMEOUT);

    let url = upload_profile_image(&state, "dogs", &dog.id.to_string(), png())
        .await
        .unwrap();

    let keys = storage.keys();
    assert_eq!(keys.len(), 1);
    assert!(keys[0].ends_with(".png"));
    assert_eq!(
        url,
        format!(
            "{}/{}/{}",
            MockObjectStorage::PUBLIC_BASE_URL,
            TEST_BUCKET,
            keys[0]
        )
    );
    assert_eq!(store.dog_by_id(dog.id).await.unwrap().dog.profile_image_url, url);

    upload_profile_image(&state, "users", &user.id.to_string(), png())
        .await
        .unwrap();
    assert_ne!(store.user_by_id(user.id).await.unwrap().user.profile_image_url, "");
}

#[tokio::test]
async fn multipart_upload_over_http() {
    let store = Arc::new(MockStore::new());
    let storage = Arc::new(MockObjectStorage::default());
    let (_user, dog) = store.seed(new_user("Alice", "alice@example.com"), new_dog("Rex", 3));
    let base = serve(rest_state(store.clone(), storage.clone(), TIMEOUT)).await;
    let client = reqwest::Client::new();
    let url = format!("{base}/upload/dogs/{}", dog.id);

    // Plain fields ahead of the file are skipped.
    let form = Form::new().text("caption", "Rex at the beach").part(
        "image",
        Part::bytes(PNG)
            .file_name("rex.png")
            .mime_str("image/png")
            .unwrap(),
    );
    let response = client.post(&url).multipart(form).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let stored = response.text().await.unwrap();
    assert!(stored.starts_with(&format!(
        "{}/{}/",
        MockObjectStorage::PUBLIC_BASE_URL,
        TEST_BUCKET
    )));
    assert!(stored.ends_with(".png"));
    assert_eq!(
        store.dog_by_id(dog.id).await.unwrap().dog.profile_image_url,
        stored
    );

    let form = Form::new().text("caption", "no picture today");
    let response = client.post(&url).multipart(form).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    assert!(response.text().await.unwrap().contains("no file in request"));

    let form = Form::new().part(
        "image",
        Part::bytes(&b"woof"[..])
            .file_name("rex.txt")
            .mime_str("text/plain")
            .unwrap(),
    );
    let response = client.post(&url).multipart(form).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    assert_eq!(storage.keys().len(), 1);
    assert_eq!(store.calls("update_profile_image"), 1);
}

#[tokio::test]
async fn upload_rejects_bad_targets() {
    let store = Arc::new(MockStore::new());
    let storage = Arc::new(MockObjectStorage::default());
    let (_user, dog) = store.seed(new_user("Alice", "alice@example.com"), new_dog("Rex", 3));
    let state = rest_state(store.clone(), storage.clone(), TIMEOUT);
    let id = dog.id.to_string();

    for table in ["cats", "dogs; DROP TABLE users", "Dogs", ""] {
        let err = upload_profile_image(&state, table, &id, png())
            .await
            .unwrap_err();
        assert!(matches!(err, RestError::UnknownTable(_)), "{table}");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    let err = upload_profile_image(&state, "doggy_dates", &id, png())
        .await
        .unwrap_err();
    assert!(matches!(err, RestError::NoProfileImage(Table::DoggyDates)));
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);

    let err = upload_profile_image(&state, "dogs", "rex", png())
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);

    let err = upload_profile_image(&state, "users", &id, png())
        .await
        .unwrap_err();
    assert!(matches!(err, RestError::NotFound(Table::Users, _)));
    assert_eq!(err.status(), StatusCode::NOT_FOUND);

    let text = Image {
        content: Bytes::from_static(b"woof"),
        content_type: "text/plain".to_string(),
    };
    let err = upload_profile_image(&state, "dogs", &id, text)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);

    assert!(storage.keys().is_empty());
    assert_eq!(store.calls("update_profile_image"), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_storage_times_out() {
    let store = Arc::new(MockStore::new());
    let storage = Arc::new(MockObjectStorage::delayed(Duration::from_secs(60)));
    let (_user, dog) = store.seed(new_user("Alice", "alice@example.com"), new_dog("Rex", 3));
    let state = rest_state(store.clone(), storage.clone(), TIMEOUT);

    let err = upload_profile_image(&state, "dogs", &dog.id.to_string(), png())
        .await
        .unwrap_err();

    assert!(matches!(err, RestError::Upload(UploadError::Timeout(t)) if t == TIMEOUT));
    assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(store.calls("update_profile_image"), 0);
}

#[tokio::test]
async fn rejected_upload_is_a_bad_gateway() {
    let store = Arc::new(MockStore::new());
    let storage = Arc::new(MockObjectStorage::rejecting(403));
    let (_user, dog) = store.seed(new_user("Alice", "alice@example.com"), new_dog("Rex", 3));
    let state = rest_state(store.clone(), storage, TIMEOUT);

    let err = upload_profile_image(&state, "dogs", &dog.id.to_string(), png())
        .await
        .unwrap_err();

    assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        store.dog_by_id(dog.id).await.unwrap().dog.profile_image_url,
        ""
    );
}
