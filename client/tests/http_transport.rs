#![cfg(feature = "http")]

use actix_multipart::Multipart;
use actix_web::dev::ServerHandle;
use actix_web::{App, Error, HttpResponse, HttpServer, web};
use deepguard::{
    ApiVariant, ClientConfig, DetectionController, DetectionTransport, FailureKind,
    HttpTransport, Status, TokioDelay,
};
use futures::{StreamExt, TryStreamExt};
use pretty_assertions::assert_eq;
use shared::{AnalysisRequest, TaskHandle, TaskId};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const RESULT_BODY: &str = r#"{
    "task_id": "abc123",
    "filename": "face.jpg",
    "file_size": 4096,
    "timestamp": "2025-11-02T10:00:00Z",
    "detection_result": {
        "is_fake": true,
        "confidence": 0.93,
        "fake_probability": 0.93,
        "real_probability": 0.07,
        "verdict": "FAKE"
    },
    "analysis": {
        "ensemble_method": "soft_voting",
        "models_used": 3,
        "fake_votes": 2,
        "model_results": {
            "xception": { "fake_probability": 0.97, "confidence": 0.97 },
            "efficientnet": { "fake_probability": 0.88, "confidence": 0.88 },
            "mesonet": { "fake_probability": 0.41, "confidence": 0.59 }
        }
    }
}"#;

#[derive(Debug, Clone, PartialEq)]
struct Upload {
    field: Option<String>,
    file_name: Option<String>,
    content_type: Option<String>,
    size: usize,
}

#[derive(Default)]
struct Recorded {
    uploads: Mutex<Vec<Upload>>,
    result_calls: AtomicUsize,
    task_ids: Mutex<Vec<String>>,
}

async fn record_upload(state: &Recorded, mut payload: Multipart) -> Result<(), Error> {
    while let Some(mut field) = payload.try_next().await? {
        let mut size = 0;
        while let Some(chunk) = field.next().await {
            size += chunk?.len();
        }
        state.uploads.lock().unwrap().push(Upload {
            field: field.name().map(str::to_string),
            file_name: field
                .content_disposition()
                .and_then(|disposition| disposition.get_filename())
                .map(str::to_string),
            content_type: field.content_type().map(|mime| mime.to_string()),
            size,
        });
    }
    Ok(())
}

async fn queue_upload(
    state: web::Data<Recorded>,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    record_upload(&state, payload).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "task_id": "abc123",
        "status": "queued",
        "message": "File uploaded"
    })))
}

async fn inline_upload(
    state: web::Data<Recorded>,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    record_upload(&state, payload).await?;
    Ok(HttpResponse::Ok()
        .content_type("application/json")
        .body(RESULT_BODY))
}

async fn reject_upload(
    state: web::Data<Recorded>,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    record_upload(&state, payload).await?;
    Ok(HttpResponse::BadRequest().json(serde_json::json!({ "detail": "Invalid file type" })))
}

async fn crash_upload() -> HttpResponse {
    HttpResponse::InternalServerError().body("Internal Server Error")
}

async fn slow_upload() -> HttpResponse {
    actix_web::rt::time::sleep(Duration::from_secs(5)).await;
    HttpResponse::Ok().finish()
}

/// Answers 202 on the first call and the finished report afterwards.
async fn eventual_result(
    state: web::Data<Recorded>,
    task_id: web::Path<String>,
) -> HttpResponse {
    state.task_ids.lock().unwrap().push(task_id.into_inner());
    if state.result_calls.fetch_add(1, Ordering::SeqCst) == 0 {
        HttpResponse::Accepted().body("Logging to the DB...")
    } else {
        HttpResponse::Ok()
            .content_type("application/json")
            .body(RESULT_BODY)
    }
}

async fn spawn_server(
    state: web::Data<Recorded>,
    routes: fn(&mut web::ServiceConfig),
) -> (String, ServerHandle) {
    let server = HttpServer::new(move || App::new().app_data(state.clone()).configure(routes))
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
    let addr = server.addrs()[0];
    let server = server.run();
    let handle = server.handle();
    actix_web::rt::spawn(server);
    (format!("http://{}", addr), handle)
}

fn config(base_url: &str) -> ClientConfig {
    let mut config = ClientConfig {
        base_url: base_url.to_string(),
        terms_accepted: true,
        ..ClientConfig::default()
    };
    config.poll.initial_backoff_ms = 10;
    config
}

fn jpeg() -> AnalysisRequest {
    AnalysisRequest::new("face.jpg", "image/jpeg", vec![0xFF; 4096]).unwrap()
}

#[actix_web::test]
async fn task_based_upload_polls_until_result_is_ready() {
    let state = web::Data::new(Recorded::default());
    let (base_url, server) = spawn_server(state.clone(), |cfg| {
        cfg.route("/api/inference/upload", web::post().to(queue_upload))
            .route("/api/inference/result/{task_id}", web::get().to(eventual_result));
    })
    .await;

    let config = config(&base_url);
    let transport = HttpTransport::new(&config).unwrap();
    let controller = DetectionController::new(transport, TokioDelay, &config);

    let snapshot = controller.start(jpeg()).await.unwrap();

    assert_eq!(snapshot.status(), Status::Succeeded);
    let report = snapshot.result().unwrap();
    assert_eq!(report.detection_result.verdict, "FAKE");
    assert_eq!(report.analysis.as_ref().map(|a| a.fake_votes), Some(2));

    assert_eq!(
        *state.uploads.lock().unwrap(),
        vec![Upload {
            field: Some("file".into()),
            file_name: Some("face.jpg".into()),
            content_type: Some("image/jpeg".into()),
            size: 4096,
        }]
    );
    assert_eq!(state.result_calls.load(Ordering::SeqCst), 2);
    assert_eq!(*state.task_ids.lock().unwrap(), vec!["abc123", "abc123"]);

    server.stop(false).await;
}

#[actix_web::test]
async fn single_call_endpoint_answers_inline() {
    let state = web::Data::new(Recorded::default());
    let (base_url, server) = spawn_server(state.clone(), |cfg| {
        cfg.route("/api/inference/upload-file", web::post().to(inline_upload));
    })
    .await;

    let mut config = config(&base_url);
    config.api = ApiVariant::SingleCall;
    let transport = HttpTransport::new(&config).unwrap();
    let controller = DetectionController::new(transport, TokioDelay, &config);

    let snapshot = controller.start(jpeg()).await.unwrap();

    assert_eq!(snapshot.status(), Status::Succeeded);
    assert_eq!(state.uploads.lock().unwrap().len(), 1);
    assert_eq!(state.result_calls.load(Ordering::SeqCst), 0);

    server.stop(false).await;
}

#[actix_web::test]
async fn service_detail_is_shown_verbatim() {
    let state = web::Data::new(Recorded::default());
    let (base_url, server) = spawn_server(state.clone(), |cfg| {
        cfg.route("/api/inference/upload", web::post().to(reject_upload));
    })
    .await;

    let config = config(&base_url);
    let controller =
        DetectionController::new(HttpTransport::new(&config).unwrap(), TokioDelay, &config);

    let snapshot = controller.start(jpeg()).await.unwrap();

    let failure = snapshot.error().unwrap();
    assert_eq!(failure.kind, FailureKind::Service);
    assert_eq!(failure.status, Some(400));
    assert_eq!(failure.message, "Invalid file type");

    server.stop(false).await;
}

#[actix_web::test]
async fn unstructured_server_error_uses_fallback_message() {
    let state = web::Data::new(Recorded::default());
    let (base_url, server) = spawn_server(state, |cfg| {
        cfg.route("/api/inference/upload", web::post().to(crash_upload));
    })
    .await;

    let config = config(&base_url);
    let controller =
        DetectionController::new(HttpTransport::new(&config).unwrap(), TokioDelay, &config);

    let snapshot = controller.start(jpeg()).await.unwrap();

    let failure = snapshot.error().unwrap();
    assert_eq!(failure.status, Some(500));
    assert_eq!(failure.message, "An error occurred during deepfake detection.");

    server.stop(false).await;
}

#[actix_web::test]
async fn slow_service_times_out_as_network_failure() {
    let state = web::Data::new(Recorded::default());
    let (base_url, server) = spawn_server(state, |cfg| {
        cfg.route("/api/inference/upload", web::post().to(slow_upload));
    })
    .await;

    let mut config = config(&base_url);
    config.timeout_secs = 1;
    let controller =
        DetectionController::new(HttpTransport::new(&config).unwrap(), TokioDelay, &config);

    let snapshot = controller.start(jpeg()).await.unwrap();

    let failure = snapshot.error().unwrap();
    assert_eq!(failure.kind, FailureKind::Network);
    assert!(failure.timed_out);

    server.stop(false).await;
}

#[actix_web::test]
async fn unreachable_service_is_a_network_failure() {
    let config = config("http://127.0.0.1:9");
    let controller =
        DetectionController::new(HttpTransport::new(&config).unwrap(), TokioDelay, &config);

    let snapshot = controller.start(jpeg()).await.unwrap();

    let failure = snapshot.error().unwrap();
    assert_eq!(failure.kind, FailureKind::Network);
    assert_eq!(failure.message, "An error occurred during deepfake detection.");
}

#[actix_web::test]
async fn task_id_is_percent_encoded_in_result_path() {
    let state = web::Data::new(Recorded::default());
    let (base_url, server) = spawn_server(state.clone(), |cfg| {
        cfg.route("/api/inference/result/{task_id}", web::get().to(eventual_result));
    })
    .await;

    let transport = HttpTransport::new(&config(&base_url)).unwrap();
    let handle = TaskHandle {
        task_id: TaskId::from("batch 7"),
        status: "queued".into(),
        message: None,
    };

    let err = transport.fetch_result(&handle).await.unwrap_err();
    assert!(matches!(err, deepguard::TransportError::NotReady { .. }));
    let report = transport.fetch_result(&handle).await.unwrap();
    assert_eq!(report.task_id, Some(TaskId::from("abc123")));
    assert_eq!(*state.task_ids.lock().unwrap(), vec!["batch 7", "batch 7"]);

    server.stop(false).await;
}
