//! End-to-end tests over real sockets.

use std::time::Duration;

use welcome_counter::database::{ConnectionState, FakeConnector};

mod common;

#[tokio::test]
async fn test_visits_are_counted() {
    let app = common::start_app("counted", FakeConnector::new(), Duration::from_secs(1)).await;
    app.manager.try_connect(false).await.unwrap();

    let client = reqwest::Client::new();
    for expected in 1..=3 {
        let res = client.get(app.url("/")).send().await.expect("server unreachable");
        assert_eq!(res.status(), 200);
        assert_eq!(
            res.headers().get("content-type").unwrap().to_str().unwrap(),
            "text/html"
        );
        assert_eq!(res.text().await.unwrap(), format!("<h1>Visits: {}</h1>", expected));
    }
    assert_eq!(app.fake.stored_count(), Some(3));
}

#[tokio::test]
async fn test_page_survives_database_loss() {
    let app = common::start_app("loss", FakeConnector::new(), Duration::from_secs(1)).await;
    app.manager.try_connect(false).await.unwrap();

    let client = reqwest::Client::new();
    let body = client.get(app.url("/")).send().await.unwrap().text().await.unwrap();
    assert_eq!(body, "<h1>Visits: 1</h1>");

    app.fake.fail_next(usize::MAX);
    app.fake.drop_connection(Some("server shut down"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let res = client.get(app.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "<h1>Visits: 1</h1>");

    let health: serde_json::Value = client
        .get(app.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_ne!(health["database"], "connected");
}

#[tokio::test]
async fn test_reconnects_in_background() {
    let app = common::start_app(
        "background",
        FakeConnector::failing(usize::MAX),
        Duration::from_millis(100),
    )
    .await;
    assert!(app.manager.try_connect(true).await.is_err());
    assert_eq!(app.manager.state(), ConnectionState::Reconnecting);

    let client = reqwest::Client::new();
    let body = client.get(app.url("/")).send().await.unwrap().text().await.unwrap();
    assert_eq!(body, "<h1>Visits: 0</h1>");

    // Database comes back; the retry loop picks it up on a later tick.
    app.fake.fail_next(0);

    let mut connected = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if app.manager.is_connected() {
            connected = true;
            break;
        }
    }
    assert!(connected, "manager did not reconnect");

    let body = client.get(app.url("/")).send().await.unwrap().text().await.unwrap();
    assert_eq!(body, "<h1>Visits: 1</h1>");
}
