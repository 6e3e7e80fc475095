use std::{sync::Arc, time::Duration};

use campfire::{
    AppState, ChangeNotifier, ClientState, InviteCode, Notifier, SessionClient, SessionError,
    SessionSnapshot, SessionUpdated, Task,
    notifier::WsChangeNotifier,
    store::{HttpSessionStore, SqliteSessionStore},
};
use reqwest::StatusCode;
use serde_json::{Value, json};
use sqlx::sqlite::SqlitePoolOptions;
use tokio::net::TcpListener;

async fn serve() -> String {
    serve_with_hub().await.0
}

async fn serve_with_hub() -> (String, Notifier) {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let notifier = Notifier::new(16);
    let store = SqliteSessionStore::new(db_pool, notifier.clone());
    store.migrate().await.unwrap();

    let app = campfire::app(AppState {
        store: Arc::new(store),
        notifier: notifier.clone(),
    });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    (format!("http://{addr}"), notifier)
}

fn remote_client(base_url: &str) -> SessionClient {
    SessionClient::new(
        Arc::new(HttpSessionStore::new(base_url)),
        Arc::new(WsChangeNotifier::new(base_url)),
    )
}

async fn eventually(client: &SessionClient, what: &str, check: impl Fn(&SessionSnapshot) -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !check(&client.snapshot()) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}: {:?}", client.snapshot());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_clients_share_a_campfire() {
    let base_url = serve().await;
    let host = remote_client(&base_url);
    let guest = remote_client(&base_url);

    let code = host.create_session("Ash", "ash@example.com").await.unwrap();
    guest
        .join_session(&code.as_str().to_lowercase(), "Birch", "birch@example.com")
        .await
        .unwrap();
    eventually(&host, "guest to appear", |s| s.guest().is_some()).await;
    assert_eq!(host.snapshot().guest().unwrap().name, "Birch");

    guest.add_task("gather wood").unwrap();
    guest.flush().await;
    eventually(&host, "the guest's task", |s| s.tasks == vec![Task::new("gather wood")]).await;

    assert!(host.toggle_task(0));
    host.flush().await;
    eventually(&guest, "the task to be done", SessionSnapshot::is_blazing).await;

    host.end_session().await;
    assert_eq!(host.state(), ClientState::Ended);
    assert!(matches!(guest.refresh().await, Err(SessionError::NotFound(_))));
    assert_eq!(guest.state(), ClientState::Ended);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rejoining_over_http_keeps_one_entry() {
    let base_url = serve().await;
    let host = remote_client(&base_url);
    let code = host.create_session("Ash", "ash@example.com").await.unwrap();

    for name in ["Birch", "Birch again"] {
        let guest = remote_client(&base_url);
        guest.join_session(code.as_str(), name, "birch@example.com").await.unwrap();
    }

    let body: Value = reqwest::get(format!("{base_url}/sessions/{code}"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        body["users"],
        json!([
            { "name": "Ash", "email": "ash@example.com" },
            { "name": "Birch", "email": "birch@example.com" },
        ])
    );

    let stranger = remote_client(&base_url);
    assert!(matches!(
        stranger.join_session("QQQQQQ", "Cedar", "cedar@example.com").await,
        Err(SessionError::NotFound(_))
    ));
}

#[tokio::test]
async fn api_maps_errors_to_statuses() {
    let base_url = serve().await;
    let http = reqwest::Client::new();
    let sessions = format!("{base_url}/sessions");

    let record = json!({ "code": "emb3r", "users": "[]", "tasks": [] });
    let created = http.post(&sessions).json(&record).send().await.unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let created: Value = created.json().await.unwrap();
    assert_eq!(created["code"], "EMB3R");

    let again = http.post(&sessions).json(&record).send().await.unwrap();
    assert_eq!(again.status(), StatusCode::CONFLICT);

    let malformed = json!({ "code": "ASH", "users": "[", "tasks": [] });
    let response = http.post(&sessions).json(&malformed).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = http.get(format!("{sessions}/NOPE")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = http
        .patch(format!("{sessions}/NOPE"))
        .json(&json!({ "tasks": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = http
        .patch(format!("{sessions}/EMB3R"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = http
        .patch(format!("{sessions}/EMB3R"))
        .json(&json!({ "tasks": "[{\"text\":\"wood\",\"completed\":false}]" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let fetched: Value = http
        .get(format!("{sessions}/emb3r"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["tasks"], json!([{ "text": "wood", "completed": false }]));
    assert_eq!(fetched["users"], json!([]));

    let response = http.delete(format!("{sessions}/EMB3R")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = http.get(format!("{sessions}/EMB3R")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let moods: Value = http
        .get(format!("{base_url}/moods"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(moods.as_array().map(Vec::len), Some(5));
    assert_eq!(moods[4]["key"], "lit");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn watchers_only_attach_to_live_campfires() {
    let (base_url, hub) = serve_with_hub().await;
    let watcher = WsChangeNotifier::new(&base_url);

    for n in 0..5 {
        let ghost = InviteCode::parse(&format!("GHOST{n}")).unwrap();
        let watched = watcher.subscribe(&ghost, Box::new(|_: SessionUpdated| {})).await;
        assert!(matches!(watched, Err(SessionError::Unavailable(_))));
    }
    assert_eq!(hub.channel_count(), 0);

    let host = remote_client(&base_url);
    let code = host.create_session("Ash", "ash@example.com").await.unwrap();
    assert_eq!(hub.subscriber_count(&code), 1);

    host.end_session().await;
    let drained = tokio::time::timeout(Duration::from_secs(5), async {
        while hub.channel_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(drained.is_ok(), "channels left behind: {}", hub.channel_count());
}
