mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn register_login_whoami_round_trip() -> Result<()> {
    if !common::db_available() {
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let email = common::unique_email("alice");
    let (token, id) = common::register_and_login(server, &client, &email).await?;

    let res = client
        .get(format!("{}/api/auth/whoami", server.base_url))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["data"]["id"], id.as_str());
    assert_eq!(body["data"]["email"], email.as_str());
    assert_eq!(body["data"]["role"], "user");
    Ok(())
}

#[tokio::test]
async fn duplicate_email_registration_conflicts() -> Result<()> {
    if !common::db_available() {
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let email = common::unique_email("dup");
    common::register(server, &client, "First", &email).await?;

    // Same email, different case - still a duplicate
    let res = client
        .post(format!("{}/auth/register", server.base_url))
        .json(&json!({
            "name": "Second",
            "email": email.to_uppercase(),
            "password": common::PASSWORD,
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_rejected() -> Result<()> {
    if !common::db_available() {
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let email = common::unique_email("badpw");
    common::register(server, &client, "Bad PW", &email).await?;

    let res = client
        .post(format!("{}/auth/login", server.base_url))
        .json(&json!({ "email": email, "password": "not-the-password" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_token() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/auth/whoami", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/api/data/items", server.base_url))
        .bearer_auth("not-a-jwt")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn allow_listed_email_is_admin_despite_fresh_row() -> Result<()> {
    if !common::db_available() {
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    // The directory row was created with the default role, but the
    // allow-list wins at issuance time
    let token = common::admin_token(server, &client).await?;

    let res = client
        .get(format!("{}/api/auth/whoami", server.base_url))
        .bearer_auth(&token)
        .send()
        .await?;
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["role"], "admin");
    Ok(())
}

#[tokio::test]
async fn refresh_rotates_tokens_and_re_resolves_role() -> Result<()> {
    if !common::db_available() {
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    // Login as the allow-listed admin to get a refresh token
    let _ = client
        .post(format!("{}/auth/register", server.base_url))
        .json(&json!({
            "name": "Admin",
            "email": common::ADMIN_EMAIL,
            "password": common::PASSWORD,
        }))
        .send()
        .await?;
    let res = client
        .post(format!("{}/auth/login", server.base_url))
        .json(&json!({ "email": common::ADMIN_EMAIL, "password": common::PASSWORD }))
        .send()
        .await?;
    let body: Value = res.json().await?;
    let refresh_token = body["data"]["refresh_token"].as_str().unwrap().to_string();

    // Refresh: new token pair, role resolved again from the live allow-list
    let res = client
        .post(format!("{}/auth/refresh", server.base_url))
        .json(&json!({ "refresh_token": refresh_token }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["principal"]["role"], "admin");
    let rotated = body["data"]["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(rotated, refresh_token);

    // The presented token was retired by rotation
    let res = client
        .post(format!("{}/auth/refresh", server.base_url))
        .json(&json!({ "refresh_token": refresh_token }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // The replacement recorded during rotation is live
    let res = client
        .post(format!("{}/auth/refresh", server.base_url))
        .json(&json!({ "refresh_token": rotated }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}
