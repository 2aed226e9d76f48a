use std::collections::BTreeSet;

use reqwest::StatusCode;
use serde_json::{Value, json};

use crate::support::TestServer;

async fn body(response: reqwest::Response) -> Value {
    response.json().await.expect("response body should be json")
}

#[tokio::test]
async fn seeded_scenario_runs_end_to_end() {
    let server = TestServer::start().await;
    let client = &server.client;

    let response = client
        .get(server.url("/resolutions?isDone=true"))
        .send()
        .await
        .expect("list request should succeed");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body(response).await,
        json!({"items": [{"id": 2, "title": "Run 20 minutes daily", "isDone": true}]})
    );

    let response = client
        .post(server.url("/resolutions"))
        .json(&json!({"title": "  Read daily  "}))
        .send()
        .await
        .expect("create request should succeed");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body(response).await;
    assert_eq!(created["id"], 3);
    assert_eq!(created["title"], "Read daily");
    assert_eq!(created["isDone"], false);

    let response = client
        .put(server.url("/resolutions/1"))
        .json(&json!({"id": 1, "title": "Walk 30 minutes daily", "isDone": true}))
        .send()
        .await
        .expect("replace request should succeed");
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body(response).await;
    assert_eq!(updated["isDone"], true);
    assert!(updated["updatedAt"].is_string());

    let response = client
        .get(server.url("/resolutions/99"))
        .send()
        .await
        .expect("get request should succeed");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body(response).await,
        json!({"error": "NotFound", "message": "Resolution not found.", "details": ["id: 99"]})
    );

    let response = client
        .get(server.url("/resolutions?isDone=maybe"))
        .send()
        .await
        .expect("list request should succeed");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(response).await["error"], "BadRequest");

    server.stop().await;
}

#[tokio::test]
async fn empty_done_filter_returns_full_list() {
    let server = TestServer::start().await;

    let response = server
        .client
        .get(server.url("/resolutions?isDone="))
        .send()
        .await
        .expect("list request should succeed");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await["items"].as_array().map(Vec::len), Some(2));

    server.stop().await;
}

#[tokio::test]
async fn create_sets_location_and_get_returns_created_record() {
    let server = TestServer::start().await;

    let response = server
        .client
        .post(server.url("/resolutions"))
        .json(&json!({"title": "Stretch", "isDone": true}))
        .send()
        .await
        .expect("create request should succeed");
    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response
        .headers()
        .get("location")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .expect("location header should be present");
    assert_eq!(location, format!("http://{}/resolutions/3", server.addr));

    let fetched = body(
        server
            .client
            .get(location)
            .send()
            .await
            .expect("get request should succeed"),
    )
    .await;
    assert_eq!(fetched["title"], "Stretch");
    assert_eq!(fetched["isDone"], false);
    assert!(fetched["createdAt"].is_string());

    server.stop().await;
}

#[tokio::test]
async fn delete_returns_no_content_then_not_found() {
    let server = TestServer::start().await;

    let response = server
        .client
        .delete(server.url("/resolutions/2"))
        .send()
        .await
        .expect("delete request should succeed");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(
        response
            .bytes()
            .await
            .expect("body should be readable")
            .is_empty()
    );

    let response = server
        .client
        .delete(server.url("/resolutions/2"))
        .send()
        .await
        .expect("second delete should succeed");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let list = body(
        server
            .client
            .get(server.url("/resolutions"))
            .send()
            .await
            .expect("list request should succeed"),
    )
    .await;
    assert_eq!(list["items"].as_array().map(Vec::len), Some(1));

    server.stop().await;
}

#[tokio::test]
async fn replace_with_mismatched_ids_returns_distinct_error() {
    let server = TestServer::start().await;

    let response = server
        .client
        .put(server.url("/resolutions/1"))
        .json(&json!({"id": 7, "title": "x"}))
        .send()
        .await
        .expect("replace request should succeed");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body(response).await,
        json!({
            "error": "BadRequest",
            "message": "Route id does not match body id.",
            "details": ["route id: 1", "body id: 7"]
        })
    );

    server.stop().await;
}

#[tokio::test]
async fn unknown_routes_and_methods_are_rejected() {
    let server = TestServer::start().await;

    let response = server
        .client
        .get(server.url("/todos"))
        .send()
        .await
        .expect("request should succeed");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body(response).await["details"][0], "path: /todos");

    let response = server
        .client
        .patch(server.url("/resolutions"))
        .send()
        .await
        .expect("request should succeed");
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        response
            .headers()
            .get("allow")
            .and_then(|value| value.to_str().ok()),
        Some("GET, POST")
    );

    let response = server
        .client
        .get(server.url("/resolutions/abc"))
        .send()
        .await
        .expect("request should succeed");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(response).await["details"][0], "id must be an integer");

    server.stop().await;
}

#[tokio::test]
async fn concurrent_creates_get_distinct_increasing_ids() {
    let server = TestServer::start().await;

    let mut tasks = Vec::new();
    for index in 0..16 {
        let client = server.client.clone();
        let url = server.url("/resolutions");
        tasks.push(tokio::spawn(async move {
            let response = client
                .post(url)
                .json(&json!({"title": format!("task {index}")}))
                .send()
                .await
                .expect("create request should succeed");
            assert_eq!(response.status(), StatusCode::CREATED);
            let created: Value = response.json().await.expect("body should be json");
            created["id"].as_i64().expect("id should be an integer")
        }));
    }

    let mut ids = BTreeSet::new();
    for task in tasks {
        ids.insert(task.await.expect("create task should join"));
    }
    assert_eq!(ids.len(), 16);
    assert_eq!(ids.first(), Some(&3));
    assert_eq!(ids.last(), Some(&18));

    server.stop().await;
}
