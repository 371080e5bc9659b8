mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use tenet_api::tenancy::gateway::TenantGateway;
use tenet_api::tenancy::naming::PartitionKind;

const SENTINEL: &str = "Collection Metadata";

#[tokio::test]
async fn crud_round_trip_in_own_partition() -> Result<()> {
    if !common::db_available() {
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let email = common::unique_email("crud");
    let (token, id) = common::register_and_login(server, &client, &email).await?;

    // Freshly provisioned partition lists as empty - the sentinel is there
    // but never visible
    let res = client
        .get(format!("{}/api/data/items", server.base_url))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    // Create
    let res = client
        .post(format!("{}/api/data/items", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": "Widget", "attrs": { "price": 9.5, "units": 3 } }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await?;
    let record_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["owner_id"], id.as_str());

    // Read back
    let res = client
        .get(format!("{}/api/data/items/{}", server.base_url, record_id))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["name"], "Widget");
    assert_eq!(body["data"]["attrs"]["units"], 3);

    // Patch attrs only; name untouched
    let res = client
        .patch(format!("{}/api/data/items/{}", server.base_url, record_id))
        .bearer_auth(&token)
        .json(&json!({ "attrs": { "price": 11.0 } }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["name"], "Widget");
    assert_eq!(body["data"]["attrs"]["price"], 11.0);

    // Delete, then gone
    let res = client
        .delete(format!("{}/api/data/items/{}", server.base_url, record_id))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .get(format!("{}/api/data/items/{}", server.base_url, record_id))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn sentinel_never_appears_and_cannot_be_written() -> Result<()> {
    if !common::db_available() {
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let email = common::unique_email("sentinel");
    let (token, _) = common::register_and_login(server, &client, &email).await?;

    // The reserved name is rejected at write time
    let res = client
        .post(format!("{}/api/data/groups", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": SENTINEL }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Renaming onto it is rejected too
    let res = client
        .post(format!("{}/api/data/groups", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": "Legit" }))
        .send()
        .await?;
    let body: Value = res.json().await?;
    let record_id = body["data"]["id"].as_str().unwrap().to_string();

    let res = client
        .patch(format!("{}/api/data/groups/{}", server.base_url, record_id))
        .bearer_auth(&token)
        .json(&json!({ "name": SENTINEL }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // And no listing ever contains it
    let res = client
        .get(format!("{}/api/data/groups", server.base_url))
        .bearer_auth(&token)
        .send()
        .await?;
    let body: Value = res.json().await?;
    for record in body["data"].as_array().unwrap() {
        assert_ne!(record["name"], SENTINEL);
    }
    Ok(())
}

#[tokio::test]
async fn count_agrees_with_list_despite_the_sentinel() -> Result<()> {
    if !common::db_available() {
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let email = common::unique_email("counting");
    let (token, id) = common::register_and_login(server, &client, &email).await?;

    for name in ["One", "Two", "Three"] {
        let res = client
            .post(format!("{}/api/data/items", server.base_url))
            .bearer_auth(&token)
            .json(&json!({ "name": name }))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    // Both paths share one name filter, so the sentinel row in the
    // partition can never make them disagree
    let pool = common::test_pool().await?;
    let gateway = TenantGateway::open(pool, Uuid::parse_str(&id)?).await?;
    let partition = gateway.partition(PartitionKind::Items);

    let listed = partition.list().await?;
    assert_eq!(partition.count().await?, listed.len() as i64);
    assert_eq!(listed.len(), 3);
    Ok(())
}

#[tokio::test]
async fn unknown_kind_is_not_found() -> Result<()> {
    if !common::db_available() {
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let email = common::unique_email("kind");
    let (token, _) = common::register_and_login(server, &client, &email).await?;

    let res = client
        .get(format!("{}/api/data/products", server.base_url))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn cross_tenant_ids_resolve_to_not_found() -> Result<()> {
    if !common::db_available() {
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let (token_a, _) =
        common::register_and_login(server, &client, &common::unique_email("owner-a")).await?;
    let (token_b, _) =
        common::register_and_login(server, &client, &common::unique_email("owner-b")).await?;

    // A creates a record
    let res = client
        .post(format!("{}/api/data/items", server.base_url))
        .bearer_auth(&token_a)
        .json(&json!({ "name": "A's secret" }))
        .send()
        .await?;
    let body: Value = res.json().await?;
    let record_id = body["data"]["id"].as_str().unwrap().to_string();

    // B cannot read, update, or delete it - and never learns it exists
    for res in [
        client
            .get(format!("{}/api/data/items/{}", server.base_url, record_id))
            .bearer_auth(&token_b)
            .send()
            .await?,
        client
            .patch(format!("{}/api/data/items/{}", server.base_url, record_id))
            .bearer_auth(&token_b)
            .json(&json!({ "name": "hijacked" }))
            .send()
            .await?,
        client
            .delete(format!("{}/api/data/items/{}", server.base_url, record_id))
            .bearer_auth(&token_b)
            .send()
            .await?,
    ] {
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    // A still owns it, unchanged
    let res = client
        .get(format!("{}/api/data/items/{}", server.base_url, record_id))
        .bearer_auth(&token_a)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["name"], "A's secret");
    Ok(())
}
