/// E2E tests for the blog API
/// These tests run against a real server instance with a fresh data dir:
///   inkpost --port 3000 --data-dir /tmp/inkpost-e2e
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:3000";

fn client() -> Result<Client, reqwest::Error> {
    Client::builder().cookie_store(true).build()
}

/// Register (ignoring duplicates from earlier runs) and log in, leaving the
/// session cookie in the client's jar.
async fn sign_in(
    client: &Client,
    username: &str,
    email: &str,
    password: &str,
) -> Result<Value, Box<dyn std::error::Error>> {
    client
        .post(format!("{}/api/auth/register", BASE_URL))
        .json(&json!({ "username": username, "email": email, "password": password }))
        .send()
        .await?;

    let response = client
        .post(format!("{}/api/auth/login", BASE_URL))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.cookies().any(|c| c.name() == "inkpost_session"));

    Ok(response.json().await?)
}

#[tokio::test]
#[ignore] // Run with: cargo test --test e2e_api -- --ignored
async fn test_register_and_login() -> Result<(), Box<dyn std::error::Error>> {
    let client = client()?;
    let body = sign_in(&client, "e2euser1", "e2e1@test.com", "testpassword123").await?;
    assert_eq!(body["user"]["username"], "e2euser1");

    let session: Value = client
        .get(format!("{}/api/auth/session", BASE_URL))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(session["user"]["username"], "e2euser1");

    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_wrong_password_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let client = client()?;
    sign_in(&client, "e2euser1", "e2e1@test.com", "testpassword123").await?;

    let anonymous = Client::new();
    let response = anonymous
        .post(format!("{}/api/auth/login", BASE_URL))
        .json(&json!({ "username": "e2euser1", "password": "wrongpassword" }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await?;
    assert_eq!(body["error"], "Invalid username/password, Try again!");

    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_anonymous_comment_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let client = client()?;
    sign_in(&client, "e2euser2", "e2e2@test.com", "testpassword123").await?;

    let created: Value = client
        .post(format!("{}/api/posts", BASE_URL))
        .json(&json!({ "title": "E2E", "description": "e2e post", "body": "hello" }))
        .send()
        .await?
        .json()
        .await?;
    let post_id = created["post"]["id"].as_str().ok_or("post id missing")?;

    let anonymous = Client::new();
    let response = anonymous
        .post(format!("{}/api/posts/{}/comments", BASE_URL, post_id))
        .json(&json!({ "name": "ghost", "message": "boo" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let detail: Value = client
        .get(format!("{}/api/posts/{}", BASE_URL, post_id))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(detail["comments"], json!([]));

    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_password_reset_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let client = client()?;
    sign_in(&client, "e2euser3", "e2e3@test.com", "testpassword123").await?;

    let issued: Value = client
        .post(format!("{}/api/auth/forgot-password", BASE_URL))
        .json(&json!({ "email": "e2e3@test.com" }))
        .send()
        .await?
        .json()
        .await?;
    let token = issued["token"].as_str().ok_or("token missing")?;

    let check: Value = client
        .get(format!("{}/api/auth/reset-password", BASE_URL))
        .query(&[("token", token)])
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(check["valid"], true);

    let reset = client
        .post(format!("{}/api/auth/reset-password", BASE_URL))
        .json(&json!({ "token": token, "password": "testpassword123" }))
        .send()
        .await?;
    assert_eq!(reset.status(), StatusCode::OK);

    let reused = client
        .post(format!("{}/api/auth/reset-password", BASE_URL))
        .json(&json!({ "token": token, "password": "another" }))
        .send()
        .await?;
    assert_eq!(reused.status(), StatusCode::BAD_REQUEST);

    Ok(())
}
