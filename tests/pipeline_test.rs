mod common;

use chrono::Utc;
use common::{Behaviour, EnvOptions, TestEnv, image_body};
use serde_json::json;
use smart_file_manager::models::{
    FileStatus, Job, OrganizeStrategy, Stage, SuggestionFilter, SuggestionKind,
    SuggestionStatus,
};
use smart_file_manager::services::overflow::OverflowQueue;
use std::collections::HashMap;
use std::sync::atomic::Ordering;

fn doc_env_options() -> EnvOptions {
    let mut extracted = HashMap::new();
    extracted.insert(
        "/s/report.pdf".to_string(),
        "Quarterly report. Revenue grew in every region.".to_string(),
    );
    EnvOptions {
        extracted,
        ..EnvOptions::default()
    }
}

fn doc_body(name: &str, mime: &str, hash: &str) -> serde_json::Value {
    json!({
        "filename": name,
        "mime_type": mime,
        "size_bytes": 2048,
        "content_hash": hash,
        "storage_path": format!("/s/{}", name),
        "folder_path": "/"
    })
}

#[tokio::test]
async fn test_image_pipeline_writes_all_results() {
    let env = TestEnv::new().await;
    let id = env.upload(image_body("dog.jpg", "i1")).await;

    env.drain().await;

    let file = env.store.get_file(&id).await.unwrap().unwrap();
    assert_eq!(file.status, FileStatus::Completed);
    assert_eq!(
        file.description.as_deref(),
        Some("A dog running on the beach at sunset")
    );
    assert_eq!(file.detected_objects, vec!["dog", "beach", "sunset"]);
    assert_eq!(file.thumbnail_path, Some(format!("thumbnails/{}.jpg", id)));
    assert!(file.processed_at.is_some());
    assert_eq!(env.vector_index.len(), 1);
    assert_eq!(env.vision.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_document_pipeline_extracts_and_summarises() {
    let env = TestEnv::with_options(doc_env_options()).await;
    let id = env
        .upload(doc_body("report.pdf", "application/pdf", "d1"))
        .await;

    env.drain().await;

    let file = env.store.get_file(&id).await.unwrap().unwrap();
    assert_eq!(file.status, FileStatus::Completed);
    assert_eq!(
        file.ocr_text.as_deref(),
        Some("Quarterly report. Revenue grew in every region.")
    );
    assert_eq!(file.description.as_deref(), Some("Summary: Quarterly report."));
    assert!(file.thumbnail_path.is_none());
    assert_eq!(env.vector_index.len(), 1);
}

#[tokio::test]
async fn test_document_without_text_still_completes() {
    let env = TestEnv::new().await;
    let id = env
        .upload(doc_body("blank.pdf", "application/pdf", "d2"))
        .await;

    env.drain().await;

    let file = env.store.get_file(&id).await.unwrap().unwrap();
    assert_eq!(file.status, FileStatus::Completed);
    assert_eq!(file.ocr_text.as_deref(), Some(""));
    assert!(file.description.is_none());
    assert!(env.vector_index.is_empty());
}

#[tokio::test]
async fn test_audio_without_transcriber_fails() {
    let env = TestEnv::with_options(EnvOptions {
        transcriber: false,
        ..EnvOptions::default()
    })
    .await;
    let id = env.upload(doc_body("memo.mp3", "audio/mpeg", "a1")).await;

    env.drain().await;

    let file = env.store.get_file(&id).await.unwrap().unwrap();
    assert_eq!(file.status, FileStatus::Failed);
    assert!(file.processed_at.is_none());
}

#[tokio::test]
async fn test_generic_and_video_complete_without_models() {
    let env = TestEnv::with_options(EnvOptions {
        vision: false,
        text: false,
        embedder: false,
        ..EnvOptions::default()
    })
    .await;
    let zip = env
        .upload(doc_body("backup.zip", "application/zip", "g1"))
        .await;
    let clip = env.upload(doc_body("clip.mp4", "video/mp4", "v1")).await;

    env.drain().await;

    let zip = env.store.get_file(&zip).await.unwrap().unwrap();
    assert_eq!(zip.status, FileStatus::Completed);
    assert_eq!(zip.category.as_str(), "generic");

    let clip = env.store.get_file(&clip).await.unwrap().unwrap();
    assert_eq!(clip.status, FileStatus::Completed);
    assert_eq!(clip.thumbnail_path, Some(format!("thumbnails/{}.jpg", clip.id)));
    assert!(env.vector_index.is_empty());
}

#[tokio::test]
async fn test_octet_stream_is_routed_by_extension() {
    let env = TestEnv::new().await;
    let id = env
        .upload(doc_body("holiday.JPG", "application/octet-stream", "x1"))
        .await;

    env.drain().await;

    let file = env.store.get_file(&id).await.unwrap().unwrap();
    assert_eq!(file.category.as_str(), "image");
    assert!(file.description.is_some());
}

#[tokio::test]
async fn test_missing_vision_model_fails_image() {
    let env = TestEnv::with_options(EnvOptions {
        vision: false,
        ..EnvOptions::default()
    })
    .await;
    let id = env.upload(image_body("nope.jpg", "nv")).await;

    env.drain().await;

    let file = env.store.get_file(&id).await.unwrap().unwrap();
    assert_eq!(file.status, FileStatus::Failed);
    assert_eq!(file.stage.as_deref(), Some("analyze_image"));
}

#[tokio::test]
async fn test_transport_error_is_retried_with_backoff() {
    let env = TestEnv::new().await;
    let id = env.upload(image_body("flaky.jpg", "f1")).await;
    env.vision.set(Behaviour::Transport);

    let ingest = env.take_queued().await;
    assert_eq!(ingest.len(), 1);
    env.dispatcher.dispatch(ingest[0].clone()).await;

    let stages = env.take_queued().await;
    let analyze = stages
        .into_iter()
        .find(|j| j.stage == Stage::AnalyzeImage)
        .unwrap();
    let before = Utc::now();
    env.dispatcher.dispatch(analyze).await;

    let parked = env.overflow.snapshot().await;
    assert_eq!(parked.len(), 1);
    let retry = Job::from_wire(&parked[0]).unwrap();
    assert_eq!(retry.stage, Stage::AnalyzeImage);
    assert_eq!(retry.retry_count, 1);
    assert!(retry.not_before.unwrap() > before);

    let file = env.store.get_file(&id).await.unwrap().unwrap();
    assert_eq!(file.status, FileStatus::Processing);

    // Keeps failing until retries run out.
    env.drain().await;
    let file = env.store.get_file(&id).await.unwrap().unwrap();
    assert_eq!(file.status, FileStatus::Failed);
    assert_eq!(file.stage.as_deref(), Some("analyze_image"));
    assert_eq!(env.vision.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_transient_failure_recovers() {
    let env = TestEnv::new().await;
    let id = env.upload(image_body("recover.jpg", "f2")).await;
    env.vision.set(Behaviour::Transport);

    let ingest = env.take_queued().await;
    env.dispatcher.dispatch(ingest[0].clone()).await;
    let analyze = env
        .take_queued()
        .await
        .into_iter()
        .find(|j| j.stage == Stage::AnalyzeImage)
        .unwrap();
    env.dispatcher.dispatch(analyze).await;

    env.vision
        .set(Behaviour::Reply("A cat on a sofa".to_string()));
    env.drain().await;

    let file = env.store.get_file(&id).await.unwrap().unwrap();
    assert_eq!(file.status, FileStatus::Completed);
    assert_eq!(file.detected_objects, vec!["cat"]);
}

#[tokio::test]
async fn test_protocol_error_is_fatal() {
    let env = TestEnv::new().await;
    env.vision.set(Behaviour::Protocol);
    let id = env.upload(image_body("bad.jpg", "p1")).await;

    env.drain().await;

    let file = env.store.get_file(&id).await.unwrap().unwrap();
    assert_eq!(file.status, FileStatus::Failed);
    assert_eq!(env.vision.calls.load(Ordering::SeqCst), 1);
    assert!(env.overflow.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_empty_description_is_fatal() {
    let env = TestEnv::new().await;
    env.vision.set(Behaviour::Reply("   ".to_string()));
    let id = env.upload(image_body("blank.jpg", "b1")).await;

    env.drain().await;

    let file = env.store.get_file(&id).await.unwrap().unwrap();
    assert_eq!(file.status, FileStatus::Failed);
    assert!(file.description.is_none());
}

#[tokio::test]
async fn test_summarize_before_extract_waits_without_using_retries() {
    let env = TestEnv::with_options(doc_env_options()).await;
    let id = env
        .upload(doc_body("report.pdf", "application/pdf", "r1"))
        .await;
    env.take_queued().await;

    env.dispatcher
        .dispatch(Job::new(&id, Stage::SummarizeDoc, 3))
        .await;

    let parked = env.overflow.snapshot().await;
    assert_eq!(parked.len(), 1);
    let waiting = Job::from_wire(&parked[0]).unwrap();
    assert_eq!(waiting.stage, Stage::SummarizeDoc);
    assert_eq!(waiting.retry_count, 0);
    assert_eq!(waiting.deferrals, 1);
    assert!(waiting.not_before.is_some());
}

#[tokio::test]
async fn test_slow_extraction_still_completes_audio() {
    let mut options = doc_env_options();
    options.extracted.insert(
        "/s/talk.mp3".to_string(),
        "A long talk about budgets. Questions followed.".to_string(),
    );
    let env = TestEnv::with_options(options).await;
    let id = env.upload(doc_body("talk.mp3", "audio/mpeg", "t1")).await;

    let ingest = env.take_queued().await;
    env.dispatcher.dispatch(ingest[0].clone()).await;
    let stages = env.take_queued().await;
    let extract = stages
        .iter()
        .find(|j| j.stage == Stage::ExtractText)
        .cloned()
        .unwrap();
    let summarize = stages
        .iter()
        .find(|j| j.stage == Stage::SummarizeDoc)
        .cloned()
        .unwrap();

    // Summarize keeps coming back, well past the retry budget, while the
    // transcription is still running.
    env.dispatcher.dispatch(summarize).await;
    for _ in 0..5 {
        let raw = env.overflow.pop().await.unwrap().unwrap();
        let mut job = Job::from_wire(&raw).unwrap();
        assert_eq!(job.retry_count, 0);
        job.not_before = None;
        env.dispatcher.dispatch(job).await;
    }
    let file = env.store.get_file(&id).await.unwrap().unwrap();
    assert_eq!(file.status, FileStatus::Processing);

    env.dispatcher.dispatch(extract).await;
    env.drain().await;

    let file = env.store.get_file(&id).await.unwrap().unwrap();
    assert_eq!(file.status, FileStatus::Completed);
    assert_eq!(
        file.ocr_text.as_deref(),
        Some("A long talk about budgets. Questions followed.")
    );
    assert_eq!(file.description.as_deref(), Some("Summary: A long talk about budgets."));
}

#[tokio::test]
async fn test_summarize_gives_up_quietly_after_failed_extraction() {
    let env = TestEnv::with_options(EnvOptions {
        transcriber: false,
        ..EnvOptions::default()
    })
    .await;
    let id = env.upload(doc_body("memo2.mp3", "audio/mpeg", "a2")).await;

    env.drain().await;

    let file = env.store.get_file(&id).await.unwrap().unwrap();
    assert_eq!(file.status, FileStatus::Failed);
    assert_eq!(file.stage.as_deref(), Some("extract_text"));
    assert!(env.overflow.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_jobs_for_deleted_files_are_dropped() {
    let env = TestEnv::new().await;
    let id = env.upload(image_body("ghost.jpg", "gh")).await;
    assert!(env.store.delete_file(&id).await.unwrap());

    assert_eq!(env.drain().await, 1);
    assert!(env.overflow.snapshot().await.is_empty());
    assert_eq!(env.vision.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_visually_similar_images_get_a_suggestion() {
    let env = TestEnv::new().await;
    let first = env.upload(image_body("first.jpg", "s1")).await;
    env.drain().await;
    let second = env.upload(image_body("second.jpg", "s2")).await;
    env.drain().await;

    let suggestions = env
        .store
        .list_suggestions(&SuggestionFilter {
            file_id: Some(second.clone()),
            kind: Some(SuggestionKind::Similar),
            status: None,
        })
        .await
        .unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].sibling_ids, vec![first]);
    assert!(suggestions[0].scores[0] >= 0.85);
    assert_eq!(suggestions[0].confidence, 0.85);

    // Different hashes: no exact duplicate.
    let duplicates = env
        .store
        .list_suggestions(&SuggestionFilter {
            kind: Some(SuggestionKind::Duplicate),
            ..SuggestionFilter::default()
        })
        .await
        .unwrap();
    assert!(duplicates.is_empty());
}

#[tokio::test]
async fn test_similarity_found_when_embed_runs_before_analysis() {
    let env = TestEnv::new().await;
    let first = env.upload(image_body("early.jpg", "e1")).await;
    env.drain().await;

    let second = env.upload(image_body("late.jpg", "e2")).await;
    let ingest = env.take_queued().await;
    env.dispatcher.dispatch(ingest[0].clone()).await;

    // Workers pick up embed and dedup before the vision call returns.
    let stages = env.take_queued().await;
    for stage in [Stage::Embed, Stage::Dedup, Stage::Thumbnail, Stage::AnalyzeImage] {
        let job = stages.iter().find(|j| j.stage == stage).cloned().unwrap();
        env.dispatcher.dispatch(job).await;
    }
    env.drain().await;

    let similar = env
        .store
        .list_suggestions(&SuggestionFilter {
            file_id: Some(second),
            kind: Some(SuggestionKind::Similar),
            status: None,
        })
        .await
        .unwrap();
    assert_eq!(similar.len(), 1);
    assert_eq!(similar[0].sibling_ids, vec![first]);
}

#[tokio::test]
async fn test_dedup_does_not_repeat_open_suggestions() {
    let env = TestEnv::new().await;
    let mut body = image_body("c1.jpg", "cc");
    let a = env.upload(body.clone()).await;
    body["force"] = json!(true);
    env.upload(body).await;
    env.drain().await;

    env.queue.submit(&a, Stage::Dedup).await;
    env.queue.submit(&a, Stage::Dedup).await;
    env.drain().await;

    let duplicates = env
        .store
        .list_suggestions(&SuggestionFilter {
            file_id: Some(a),
            kind: Some(SuggestionKind::Duplicate),
            status: None,
        })
        .await
        .unwrap();
    assert_eq!(duplicates.len(), 1);
}

async fn organize(env: &TestEnv, id: &str, strategy: OrganizeStrategy) -> String {
    env.queue.submit(id, Stage::Organize { strategy }).await;
    env.drain().await;
    env.store.get_file(id).await.unwrap().unwrap().folder_path
}

#[tokio::test]
async fn test_organize_strategies() {
    let env = TestEnv::new().await;
    let id = env.upload(image_body("walk.jpg", "o1")).await;
    env.drain().await;

    let uploaded_at = env.store.get_file(&id).await.unwrap().unwrap().uploaded_at;
    assert_eq!(
        organize(&env, &id, OrganizeStrategy::ByDate).await,
        uploaded_at.format("/%Y/%m").to_string()
    );
    assert!(
        env.store
            .get_folder(&uploaded_at.format("/%Y").to_string())
            .await
            .unwrap()
            .is_some()
    );

    assert_eq!(organize(&env, &id, OrganizeStrategy::ByContent).await, "/Animals");
    assert_eq!(organize(&env, &id, OrganizeStrategy::ByType).await, "/Images");
    assert_eq!(organize(&env, &id, OrganizeStrategy::Smart).await, "/Photos/Pets");

    let applied = env
        .store
        .list_suggestions(&SuggestionFilter {
            file_id: Some(id.clone()),
            kind: Some(SuggestionKind::Organization),
            status: None,
        })
        .await
        .unwrap();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].status, SuggestionStatus::Applied);
    assert_eq!(applied[0].suggested_value, "/Photos/Pets");
}

#[tokio::test]
async fn test_smart_organize_falls_back_to_content() {
    let env = TestEnv::new().await;
    let id = env.upload(image_body("fallback.jpg", "o2")).await;
    env.drain().await;

    if let Ok(mut folder) = env.text.folder.lock() {
        *folder = Behaviour::Reply("  \"\"  ".to_string());
    }
    assert_eq!(organize(&env, &id, OrganizeStrategy::Smart).await, "/Animals");

    let no_llm = TestEnv::with_options(EnvOptions {
        text: false,
        ..EnvOptions::default()
    })
    .await;
    let id = no_llm.upload(image_body("plain.jpg", "o3")).await;
    no_llm.drain().await;
    assert_eq!(organize(&no_llm, &id, OrganizeStrategy::Smart).await, "/Animals");
}
