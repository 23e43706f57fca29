mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{EnvOptions, TestEnv, image_body};
use serde_json::json;
use smart_file_manager::models::{NewSuggestion, SuggestionKind};
use smart_file_manager::utils::auth::issue_token;

#[tokio::test]
async fn test_upload_then_process_image() {
    let env = TestEnv::new().await;

    let id = env.upload(image_body("a.jpg", "h1")).await;

    let (status, file) = env.request("GET", &format!("/api/files/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(file["status"], "pending");

    env.drain().await;

    let (status, file) = env.request("GET", &format!("/api/files/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(file["status"], "completed");
    assert_eq!(file["category"], "image");
    assert!(!file["description"].as_str().unwrap().is_empty());
    assert!(file["processed_at"].is_string());
    assert_eq!(file["thumbnail_path"], format!("thumbnails/{}.jpg", id));
}

#[tokio::test]
async fn test_same_hash_returns_same_record() {
    let env = TestEnv::new().await;

    let (status, first) = env
        .request("POST", "/api/files", Some(image_body("one.jpg", "h2")))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["existing"], false);

    let (status, second) = env
        .request("POST", "/api/files", Some(image_body("two.jpg", "h2")))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["existing"], true);
    assert_eq!(first["id"], second["id"]);

    let (status, list) = env.request("GET", "/api/files", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 1);
    assert_eq!(list["files"].as_array().unwrap().len(), 1);

    // Only the first upload queues an ingest.
    assert_eq!(env.take_queued().await.len(), 1);
}

#[tokio::test]
async fn test_find_duplicates_groups_forced_copies() {
    let env = TestEnv::new().await;

    let mut body = image_body("dup1.jpg", "dup");
    let a = env.upload(body.clone()).await;
    body["filename"] = json!("dup2.jpg");
    body["force"] = json!(true);
    let b = env.upload(body).await;
    assert_ne!(a, b);
    env.upload(image_body("single.jpg", "unique")).await;

    let (status, resp) = env.request("POST", "/api/find-duplicates", None).await;
    assert_eq!(status, StatusCode::OK);
    let groups = resp["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["content_hash"], "dup");
    assert_eq!(groups[0]["size"], 2);
    let ids: Vec<&str> = groups[0]["file_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert!(ids.contains(&a.as_str()));
    assert!(ids.contains(&b.as_str()));
}

#[tokio::test]
async fn test_non_empty_folder_cannot_be_deleted() {
    let env = TestEnv::new().await;

    let (status, folder) = env
        .request("POST", "/api/folders", Some(json!({"path": "/x", "name": "x"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(folder["path"], "/x");

    let mut body = image_body("in-x.jpg", "hx");
    body["folder_path"] = json!("/x");
    let id = env.upload(body).await;

    let (status, err) = env.request("DELETE", "/api/folders/%2Fx", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["file_count"], 1);
    assert!(err["error"].is_string());

    let (status, _) = env.request("DELETE", &format!("/api/files/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = env.request("DELETE", "/api/folders/%2Fx", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = env.request("GET", "/api/folders/%2Fx", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_text_search_without_match() {
    let env = TestEnv::new().await;
    env.upload(image_body("plain.png", "h5")).await;

    let (status, resp) = env.request("GET", "/api/search?q=sunset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["files"], json!([]));
    assert_eq!(resp["total_results"], 0);
    assert!(resp["search_time_seconds"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn test_organize_by_type_moves_image() {
    let env = TestEnv::new().await;
    let id = env.upload(image_body("cat.jpg", "h6")).await;
    env.drain().await;

    let (status, resp) = env
        .request("POST", "/api/organize", Some(json!({"strategy": "by_type"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["queued"], 1);
    env.drain().await;

    let (_, file) = env.request("GET", &format!("/api/files/{}", id), None).await;
    assert_eq!(file["folder_path"], "/Images");

    // A second pass leaves it where it is.
    env.request(
        "POST",
        "/api/organize",
        Some(json!({"file_ids": [id.clone()], "strategy": "by_type"})),
    )
    .await;
    env.drain().await;
    let (_, file) = env.request("GET", &format!("/api/files/{}", id), None).await;
    assert_eq!(file["folder_path"], "/Images");

    let (status, folder) = env.request("GET", "/api/folders/%2FImages", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(folder["name"], "Images");
}

#[tokio::test]
async fn test_organize_unknown_id_is_404() {
    let env = TestEnv::new().await;
    let (status, _) = env
        .request(
            "POST",
            "/api/organize",
            Some(json!({"file_ids": ["missing"], "strategy": "by_date"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_boundaries() {
    let env = TestEnv::new().await;

    let (status, resp) = env.request("GET", "/api/files", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["files"], json!([]));
    assert_eq!(resp["total"], 0);
    assert_eq!(resp["limit"], 50);
    assert_eq!(resp["offset"], 0);

    for uri in [
        "/api/files?limit=0",
        "/api/files?limit=501",
        "/api/files?offset=-1",
        "/api/files?limit=abc",
        "/api/files?type=spreadsheet",
        "/api/files?status=done",
    ] {
        let (status, body) = env.request("GET", uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert!(body["error"].is_string(), "{}", uri);
    }
}

#[tokio::test]
async fn test_list_filters_and_paging() {
    let env = TestEnv::new().await;
    env.upload(image_body("a.jpg", "p1")).await;
    env.upload(image_body("b.jpg", "p2")).await;
    env.upload(json!({
        "filename": "report.pdf",
        "mime_type": "application/pdf",
        "size_bytes": 10,
        "content_hash": "p3",
        "storage_path": "/s/report.pdf",
        "folder_path": "/docs"
    }))
    .await;

    let (_, resp) = env.request("GET", "/api/files?type=image", None).await;
    assert_eq!(resp["total"], 2);

    let (_, resp) = env.request("GET", "/api/files?folder=/docs", None).await;
    assert_eq!(resp["total"], 1);
    assert_eq!(resp["files"][0]["filename"], "report.pdf");

    let (_, resp) = env.request("GET", "/api/files?limit=1&offset=1", None).await;
    assert_eq!(resp["total"], 3);
    assert_eq!(resp["files"].as_array().unwrap().len(), 1);

    let (_, resp) = env.request("GET", "/api/files?status=pending", None).await;
    assert_eq!(resp["total"], 3);
}

#[tokio::test]
async fn test_zero_byte_file_is_accepted() {
    let env = TestEnv::new().await;
    let mut body = image_body("empty.txt", "e0");
    body["mime_type"] = json!("text/plain");
    body["size_bytes"] = json!(0);
    let id = env.upload(body).await;

    let (_, file) = env.request("GET", &format!("/api/files/{}", id), None).await;
    assert_eq!(file["size_bytes"], 0);
    assert_eq!(file["category"], "document");
}

#[tokio::test]
async fn test_content_categories_require_storage_path() {
    let env = TestEnv::new().await;
    for (name, mime) in [
        ("a.jpg", "image/jpeg"),
        ("b.pdf", "application/pdf"),
        ("c.mp3", "audio/mpeg"),
    ] {
        let mut body = image_body(name, name);
        body["mime_type"] = json!(mime);
        body.as_object_mut().unwrap().remove("storage_path");
        let (status, resp) = env.request("POST", "/api/files", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", name);
        assert!(resp["error"].as_str().unwrap().contains("storage_path"));

        let mut body = image_body(name, &format!("{}-blank", name));
        body["mime_type"] = json!(mime);
        body["storage_path"] = json!("  ");
        let (status, _) = env.request("POST", "/api/files", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", name);
    }

    // Nothing downstream reads the bytes of an archive.
    let mut body = image_body("bundle.zip", "z1");
    body["mime_type"] = json!("application/zip");
    body.as_object_mut().unwrap().remove("storage_path");
    let (status, resp) = env.request("POST", "/api/files", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, file) = env
        .request("GET", &format!("/api/files/{}", resp["id"].as_str().unwrap()), None)
        .await;
    assert_eq!(file["category"], "generic");
    assert_eq!(file["folder_path"], "/");
}

#[tokio::test]
async fn test_invalid_bodies_are_400() {
    let env = TestEnv::new().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/files")
        .header("Content-Type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = env.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    // Missing content_hash
    let (status, _) = env
        .request(
            "POST",
            "/api/files",
            Some(json!({"filename": "a.jpg", "mime_type": "image/jpeg", "size_bytes": 1})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Wrong type
    let mut body = image_body("a.jpg", "h");
    body["size_bytes"] = json!("big");
    let (status, _) = env.request("POST", "/api/files", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut body = image_body("a.jpg", "h");
    body["size_bytes"] = json!(-5);
    let (status, _) = env.request("POST", "/api/files", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut body = image_body("a.jpg", "h");
    body["folder_path"] = json!("/a/../b");
    let (status, _) = env.request("POST", "/api/files", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = env
        .request("POST", "/api/search", Some(json!({"type": "text"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = env.request("GET", "/api/search", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = env
        .request("POST", "/api/organize", Some(json!({"strategy": "by_mood"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_ids_are_404() {
    let env = TestEnv::new().await;
    for (method, uri) in [
        ("GET", "/api/files/nope"),
        ("DELETE", "/api/files/nope"),
        ("POST", "/api/files/nope/process"),
        ("GET", "/api/processing-status/nope"),
        ("POST", "/api/suggestions/nope/apply"),
    ] {
        let (status, _) = env.request(method, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{} {}", method, uri);
    }
}

#[tokio::test]
async fn test_reprocess_and_processing_status() {
    let env = TestEnv::new().await;
    let id = env.upload(image_body("r.jpg", "hr")).await;
    env.drain().await;

    let (status, resp) = env
        .request("GET", &format!("/api/processing-status/{}", id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["status"], "completed");
    assert!(resp["processed_at"].is_string());

    let (status, resp) = env
        .request("POST", &format!("/api/files/{}/process", id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["status"], "pending");
    assert_eq!(resp["queued"], true);

    let (_, resp) = env
        .request("GET", &format!("/api/processing-status/{}", id), None)
        .await;
    assert_eq!(resp["status"], "pending");
    assert!(resp["processed_at"].is_null());

    env.drain().await;
    let (_, resp) = env
        .request("GET", &format!("/api/processing-status/{}", id), None)
        .await;
    assert_eq!(resp["status"], "completed");
}

#[tokio::test]
async fn test_semantic_search_ranks_by_embedding() {
    let env = TestEnv::new().await;
    let id = env.upload(image_body("beach.jpg", "s1")).await;
    env.drain().await;

    let (status, resp) = env
        .request(
            "POST",
            "/api/search",
            Some(json!({"query": "sunset at the beach", "type": "semantic"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["search_type"], "semantic");
    assert_eq!(resp["files"][0]["id"], id.as_str());

    let (_, resp) = env
        .request(
            "POST",
            "/api/search",
            Some(json!({"query": "dog", "type": "visual", "filters": {"category": "document"}})),
        )
        .await;
    // Visual search is restricted to images regardless of the filter.
    assert_eq!(resp["files"][0]["id"], id.as_str());

    let (_, resp) = env
        .request("POST", "/api/search", Some(json!({"query": "beach"})))
        .await;
    assert_eq!(resp["search_type"], "text");
    assert_eq!(resp["total_results"], 1);
}

#[tokio::test]
async fn test_semantic_search_falls_back_to_text_without_embedder() {
    let env = TestEnv::with_options(EnvOptions {
        embedder: false,
        ..EnvOptions::default()
    })
    .await;
    env.upload(image_body("sunset-beach.jpg", "t1")).await;

    let (status, resp) = env
        .request(
            "POST",
            "/api/search",
            Some(json!({"query": "sunset", "type": "semantic"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["search_type"], "text");
    assert_eq!(resp["total_results"], 1);
}

#[tokio::test]
async fn test_folder_crud() {
    let env = TestEnv::new().await;

    let (status, _) = env
        .request(
            "POST",
            "/api/folders",
            Some(json!({"path": "/projects/alpha", "metadata": {"color": "blue"}})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = env
        .request("POST", "/api/folders", Some(json!({"path": "/projects/alpha"})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = env
        .request("POST", "/api/folders", Some(json!({"path": "/"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, folders) = env.request("GET", "/api/folders", None).await;
    let paths: Vec<&str> = folders
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["path"].as_str().unwrap())
        .collect();
    assert_eq!(paths, vec!["/projects", "/projects/alpha"]);

    let (_, children) = env.request("GET", "/api/folders?parent=/projects", None).await;
    assert_eq!(children.as_array().unwrap().len(), 1);

    let (status, folder) = env
        .request(
            "PUT",
            "/api/folders/%2Fprojects%2Falpha",
            Some(json!({"name": "Alpha"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(folder["name"], "Alpha");
    assert_eq!(folder["metadata"]["color"], "blue");

    let (status, folder) = env.request("GET", "/api/folders/projects/alpha", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(folder["parent_path"], "/projects");

    let (status, _) = env
        .request("PUT", "/api/folders/%2Fnowhere", Some(json!({"name": "n"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_suggestion_lifecycle() {
    let env = TestEnv::new().await;
    let mut body = image_body("x1.jpg", "same");
    let a = env.upload(body.clone()).await;
    body["filename"] = json!("x2.jpg");
    body["force"] = json!(true);
    let b = env.upload(body).await;
    env.drain().await;

    let (status, list) = env
        .request(
            "GET",
            &format!("/api/suggestions?file_id={}&kind=duplicate", b),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["sibling_ids"], json!([a]));
    assert_eq!(list[0]["confidence"], 1.0);
    assert_eq!(list[0]["status"], "pending");
    let suggestion_id = list[0]["id"].as_str().unwrap().to_string();

    let (status, updated) = env
        .request(
            "PUT",
            &format!("/api/suggestions/{}", suggestion_id),
            Some(json!({"status": "accepted"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "accepted");

    let (status, applied) = env
        .request("POST", &format!("/api/suggestions/{}/apply", suggestion_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(applied["status"], "applied");

    // Applied is terminal.
    let (status, _) = env
        .request(
            "PUT",
            &format!("/api/suggestions/{}", suggestion_id),
            Some(json!({"status": "rejected"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = env
        .request("GET", "/api/suggestions?status=maybe", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_apply_organization_suggestion_moves_file() {
    let env = TestEnv::new().await;
    let id = env.upload(image_body("pet.jpg", "o1")).await;
    let suggestion = env
        .store
        .create_suggestion(
            NewSuggestion::new(&id, SuggestionKind::Organization, "/Photos/Pets")
                .with_confidence(0.7),
        )
        .await
        .unwrap();

    let (status, applied) = env
        .request("POST", &format!("/api/suggestions/{}/apply", suggestion.id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(applied["status"], "applied");

    let (_, file) = env.request("GET", &format!("/api/files/{}", id), None).await;
    assert_eq!(file["folder_path"], "/Photos/Pets");
    let (status, _) = env.request("GET", "/api/folders/%2FPhotos", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_delete_file_removes_embedding() {
    let env = TestEnv::new().await;
    let id = env.upload(image_body("gone.jpg", "g1")).await;
    env.drain().await;
    assert_eq!(env.vector_index.len(), 1);

    let (status, _) = env.request("DELETE", &format!("/api/files/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(env.vector_index.is_empty());

    let (status, _) = env.request("GET", &format!("/api/files/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_and_docs() {
    let env = TestEnv::new().await;

    let (status, health) = env.request("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["service"], "smart-file-manager");
    assert!(health["timestamp"].is_string());

    let (status, doc) = env.request("GET", "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/api/files"].is_object());
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let env = TestEnv::new().await;
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(env.app.clone(), request)
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn test_bearer_auth_when_secret_configured() {
    let secret = "test-secret";
    let env = TestEnv::with_options(EnvOptions {
        jwt_secret: Some(secret.to_string()),
        ..EnvOptions::default()
    })
    .await;

    let (status, _) = env.request("GET", "/api/files", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = env
        .request_with("GET", "/api/files", None, Some("garbage"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = issue_token("user-1", secret, chrono::Duration::hours(1)).unwrap();
    let (status, resp) = env
        .request_with(
            "POST",
            "/api/files",
            Some(image_body("mine.jpg", "auth1")),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, file) = env
        .request_with(
            "GET",
            &format!("/api/files/{}", resp["id"].as_str().unwrap()),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(file["uploader_id"], "user-1");
    assert_eq!(file["owner_id"], "user-1");

    let (status, _) = env.request("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}
