use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::config::{BridgeConfig, StatusPolicy};
use crate::engine::{RefreshEngine, RefreshError};
use crate::session::SessionError;
use crate::test_support::{
    call_log, test_config, test_credentials, FakeSession, Step, LOGGED_IN_PAGE, LOGIN_OK, LOGIN_PAGE,
    LOGIN_REJECTED,
};

fn engine(session: FakeSession, policy: StatusPolicy) -> RefreshEngine<FakeSession> {
    RefreshEngine::new(session, test_credentials(), test_config(policy))
}

#[tokio::test]
async fn logged_in_page_becomes_online_snapshot() {
    // Arrange
    let session = FakeSession::new().fetch(Step::Page(200, LOGGED_IN_PAGE));
    let calls = session.calls();
    let mut engine = engine(session, StatusPolicy::SoftOffline);

    // Act
    let snapshot = engine.refresh().await.expect("refresh");

    // Assert
    assert!(snapshot.online);
    assert_eq!(snapshot.raw_body, LOGGED_IN_PAGE);
    assert_eq!(snapshot.error, None);
    assert_eq!(call_log(&calls), vec!["fetch"]);
    assert!(engine.state().available());
    assert_eq!(engine.stats().cycles_ok, 1);
}

#[tokio::test]
async fn expired_session_logs_in_once_then_refetches() {
    // Arrange
    let session = FakeSession::new()
        .fetch(Step::Page(200, LOGIN_PAGE))
        .fetch(Step::Page(200, LOGGED_IN_PAGE))
        .login(Step::Page(200, LOGIN_OK));
    let calls = session.calls();
    let mut engine = engine(session, StatusPolicy::SoftOffline);

    // Act
    let snapshot = engine.refresh().await.expect("refresh");

    // Assert
    assert!(snapshot.online);
    assert_eq!(
        call_log(&calls),
        vec!["fetch", "reset", "login:1234", "fetch"],
        "exactly one login between the two fetches"
    );
    assert_eq!(engine.stats().logins, 1);
}

#[tokio::test]
async fn rejected_pin_fails_cycle_and_keeps_snapshot() {
    // Arrange
    let session = FakeSession::new()
        .fetch(Step::Page(200, LOGGED_IN_PAGE))
        .fetch(Step::Page(200, LOGIN_PAGE))
        .login(Step::Page(200, LOGIN_REJECTED));
    let mut engine = engine(session, StatusPolicy::SoftOffline);
    let first = engine.refresh().await.expect("first refresh");

    // Act
    let result = engine.refresh().await;

    // Assert
    assert!(matches!(result, Err(RefreshError::LoginFailed(_))), "got {result:?}");
    assert_eq!(engine.snapshot(), first);
    let state = engine.state();
    assert!(!state.last_update_success);
    assert!(!state.available());
    assert!(state.last_error.expect("error recorded").contains("login failed"));
}

#[tokio::test]
async fn login_with_error_status_is_login_failure() {
    // Arrange
    let session = FakeSession::new()
        .fetch(Step::Page(200, LOGIN_PAGE))
        .login(Step::Page(500, "oops"));
    let mut engine = engine(session, StatusPolicy::SoftOffline);

    // Act
    let result = engine.refresh().await;

    // Assert
    assert_eq!(result, Err(RefreshError::LoginFailed("HTTP 500".to_string())));
}

#[tokio::test(start_paused = true)]
async fn refetch_waits_for_login_settle() {
    // Arrange
    let session = FakeSession::new()
        .fetch(Step::Page(200, LOGIN_PAGE))
        .fetch(Step::Page(200, LOGGED_IN_PAGE))
        .login(Step::Page(200, LOGIN_OK));
    let calls = session.calls();
    let config = BridgeConfig {
        login_settle: Duration::from_secs(5),
        ..test_config(StatusPolicy::SoftOffline)
    };
    let mut engine = RefreshEngine::new(session, test_credentials(), config);
    let start = Instant::now();

    // Act
    let (result, during_settle) = tokio::join!(engine.refresh(), async {
        sleep(Duration::from_secs(4)).await;
        call_log(&calls)
    });

    // Assert
    assert!(result.expect("refresh").online);
    assert_eq!(during_settle, vec!["fetch", "reset", "login:1234"], "no refetch before the pause ends");
    assert_eq!(call_log(&calls), vec!["fetch", "reset", "login:1234", "fetch"]);
    assert!(start.elapsed() >= Duration::from_secs(5), "elapsed {:?}", start.elapsed());
}

#[tokio::test]
async fn login_transport_error_is_network_failure() {
    // Arrange
    let session = FakeSession::new()
        .fetch(Step::Page(200, LOGGED_IN_PAGE))
        .fetch(Step::Page(200, LOGIN_PAGE))
        .login(Step::Fail(SessionError::Connect("refused".to_string())));
    let mut engine = engine(session, StatusPolicy::SoftOffline);
    let first = engine.refresh().await.expect("first refresh");

    // Act
    let result = engine.refresh().await;

    // Assert
    assert!(matches!(result, Err(RefreshError::Network(_))), "got {result:?}");
    assert_eq!(engine.snapshot(), first);
    assert!(!engine.state().last_update_success);
}

#[tokio::test(start_paused = true)]
async fn hanging_login_times_out() {
    // Arrange
    let session = FakeSession::new()
        .fetch(Step::Page(200, LOGGED_IN_PAGE))
        .fetch(Step::Page(200, LOGIN_PAGE))
        .login(Step::Hang);
    let mut engine = engine(session, StatusPolicy::SoftOffline);
    let first = engine.refresh().await.expect("first refresh");

    // Act
    let result = engine.refresh().await;

    // Assert
    assert_eq!(result, Err(RefreshError::Timeout(Duration::from_secs(10))));
    assert_eq!(engine.snapshot(), first);
}

#[tokio::test]
async fn relogin_attempts_are_capped() {
    // Arrange
    let mut session = FakeSession::new();
    for _ in 0..10 {
        session = session
            .fetch(Step::Page(200, LOGIN_PAGE))
            .login(Step::Page(200, LOGIN_OK));
    }
    let calls = session.calls();
    let mut engine = engine(session, StatusPolicy::SoftOffline);

    // Act
    let result = engine.refresh().await;

    // Assert
    assert_eq!(result, Err(RefreshError::RetriesExhausted { attempts: 5 }));
    let log = call_log(&calls);
    assert_eq!(log.iter().filter(|c| *c == "fetch").count(), 5);
    assert_eq!(log.iter().filter(|c| c.starts_with("login")).count(), 4);
    assert!(!engine.state().last_update_success);
}

#[tokio::test]
async fn connection_error_keeps_last_snapshot() {
    // Arrange
    let session = FakeSession::new()
        .fetch(Step::Page(200, LOGGED_IN_PAGE))
        .fetch(Step::Fail(SessionError::Connect("connection refused".to_string())));
    let mut engine = engine(session, StatusPolicy::SoftOffline);
    let first = engine.refresh().await.expect("first refresh");

    // Act
    let result = engine.refresh().await;

    // Assert
    assert!(matches!(result, Err(RefreshError::Network(_))), "got {result:?}");
    assert!(result.unwrap_err().is_update_failure());
    assert_eq!(engine.snapshot(), first, "last-known values persist");
    assert!(engine.snapshot().online);
    assert!(!engine.state().available());
    assert_eq!(engine.stats().cycles_err, 1);
}

#[tokio::test(start_paused = true)]
async fn hanging_fetch_times_out() {
    // Arrange
    let session = FakeSession::new().fetch(Step::Hang);
    let mut engine = engine(session, StatusPolicy::SoftOffline);

    // Act
    let result = engine.refresh().await;

    // Assert
    assert_eq!(result, Err(RefreshError::Timeout(Duration::from_secs(10))));
    assert!(!engine.snapshot().online);
}

#[tokio::test]
async fn session_timeout_maps_to_timeout_error() {
    // Arrange
    let session = FakeSession::new().fetch(Step::Fail(SessionError::Timeout));
    let mut engine = engine(session, StatusPolicy::SoftOffline);

    // Act
    let result = engine.refresh().await;

    // Assert
    assert!(matches!(result, Err(RefreshError::Timeout(_))), "got {result:?}");
}

#[tokio::test]
async fn soft_offline_policy_records_offline_snapshot() {
    // Arrange
    let session = FakeSession::new()
        .fetch(Step::Page(200, LOGGED_IN_PAGE))
        .fetch(Step::Page(503, "busy"));
    let mut engine = engine(session, StatusPolicy::SoftOffline);
    engine.refresh().await.expect("first refresh");

    // Act
    let snapshot = engine.refresh().await.expect("soft offline is not an error");

    // Assert
    assert!(!snapshot.online);
    assert!(snapshot.raw_body.is_empty());
    assert_eq!(snapshot.error.as_deref(), Some("HTTP 503"));
    let state = engine.state();
    assert!(state.last_update_success);
    assert!(!state.available());
}

#[tokio::test]
async fn fail_policy_raises_bad_status_and_keeps_snapshot() {
    // Arrange
    let session = FakeSession::new()
        .fetch(Step::Page(200, LOGGED_IN_PAGE))
        .fetch(Step::Page(503, "busy"));
    let mut engine = engine(session, StatusPolicy::Fail);
    let first = engine.refresh().await.expect("first refresh");

    // Act
    let result = engine.refresh().await;

    // Assert
    assert_eq!(result, Err(RefreshError::BadStatus(503)));
    assert_eq!(engine.snapshot(), first);
}

#[tokio::test]
async fn subscribers_see_each_published_state() {
    // Arrange
    let session = FakeSession::new().fetch(Step::Page(200, LOGGED_IN_PAGE));
    let mut engine = engine(session, StatusPolicy::SoftOffline);
    let mut rx = engine.subscribe();
    assert!(!rx.borrow().last_update_success);

    // Act
    engine.refresh().await.expect("refresh");

    // Assert
    assert!(rx.has_changed().expect("sender alive"));
    let state = rx.borrow_and_update().clone();
    assert!(state.available());
    assert_eq!(state.stats.cycles_ok, 1);
}
