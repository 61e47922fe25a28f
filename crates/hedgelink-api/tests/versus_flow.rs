//! The Versus state machine end to end: creation guards, Congelar with
//! rollback, Transferir leg math, and the scheduler.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use common::{reference_quote, spawn_backend, wire_account, BackendOptions, MockAgent, TestBackend};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use hedgelink_core::{Side, VersusId, VersusStatus};
use hedgelink_versus::{Scheduler, VersusSpec};

/// Two agents, one account each, quote scripted on agent A.
async fn versus_fixture() -> (TestBackend, MockAgent, MockAgent) {
    let agent_a = MockAgent::spawn().await;
    let agent_b = MockAgent::spawn().await;
    agent_a.set_accounts(json!([wire_account(100, 10_000.0, "connected")]));
    agent_b.set_accounts(json!([wire_account(200, 20_000.0, "connected")]));
    agent_a.set_quote(reference_quote());

    let backend = spawn_backend(
        &[("agent-a", &agent_a.url), ("agent-b", &agent_b.url)],
        BackendOptions::default(),
    )
    .await;
    (backend, agent_a, agent_b)
}

fn create_body() -> serde_json::Value {
    json!({
        "account_a": 100,
        "account_b": 200,
        "symbol": "EURUSD",
        "lots": 1.0,
        "side": "BUY",
        "tp_usd_a": 50.0,
        "sl_usd_a": 25.0,
        "tp_usd_b": 50.0,
        "sl_usd_b": 25.0
    })
}

async fn create_versus(backend: &TestBackend) -> String {
    let resp = backend
        .post("/api/versus")
        .json(&create_body())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    body["versus"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn create_rejects_bad_input_without_touching_agents() {
    let (backend, agent_a, _agent_b) = versus_fixture().await;

    let mut same_pair = create_body();
    same_pair["account_b"] = json!(100);
    let mut zero_lots = create_body();
    zero_lots["lots"] = json!(0.0);
    let mut bad_side = create_body();
    bad_side["side"] = json!("HOLD");

    for (body, needle) in [
        (same_pair, "different"),
        (zero_lots, "greater than 0"),
        (bad_side, "BUY or SELL"),
    ] {
        let resp = backend.post("/api/versus").json(&body).send().await.unwrap();
        assert_eq!(resp.status(), 400);
        let reply: serde_json::Value = resp.json().await.unwrap();
        assert!(reply["detail"].as_str().unwrap().contains(needle));
    }

    assert!(backend.state.versus_store.is_empty());
    assert!(agent_a.open_requests().is_empty());
}

#[tokio::test]
async fn congelar_opens_the_straddle_with_shared_pip_stops() {
    let (backend, agent_a, _agent_b) = versus_fixture().await;
    agent_a.push_open_result(Ok(1001));
    agent_a.push_open_result(Ok(1002));

    let id = create_versus(&backend).await;
    // Warm the cache so we can observe the selective invalidation.
    backend.get("/api/accounts").send().await.unwrap();

    let resp = backend
        .post(&format!("/api/versus/{id}/congelar"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["versus"]["status"], "congelado");
    assert_eq!(body["tickets"], json!([1001, 1002]));

    let opens = agent_a.open_requests();
    assert_eq!(opens.len(), 2);
    // usd_per_pip = 10, so 50 USD → 5 pips and 25 USD → 2.5 pips, shared
    // by both legs; only the direction differs.
    for (open, side) in opens.iter().zip(["BUY", "SELL"]) {
        assert_eq!(open["order_type"], side);
        assert_eq!(open["lot"], 1.0);
        assert_eq!(open["tp_pips"], 5.0);
        assert_eq!(open["sl_pips"], 2.5);
        assert_eq!(
            open["comment"],
            json!(format!("Versus-{id}-{side}"))
        );
    }

    // A's snapshot was invalidated; B's untouched.
    assert!(backend.state.cache.get_account(100).is_none());
    assert!(backend.state.cache.get_account(200).is_some());
}

#[tokio::test]
async fn congelar_rolls_back_the_buy_when_the_sell_is_refused() {
    let (backend, agent_a, _agent_b) = versus_fixture().await;
    agent_a.push_open_result(Ok(1001));
    agent_a.push_open_result(Err("not enough margin"));

    let id = create_versus(&backend).await;
    let resp = backend
        .post(&format!("/api/versus/{id}/congelar"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);

    // The lone BUY was compensated away.
    assert_eq!(agent_a.closed_tickets(), vec![1001]);

    let record = backend
        .state
        .versus_store
        .get(&VersusId::from(id.as_str()))
        .unwrap();
    assert_eq!(record.status, VersusStatus::Error);
    assert!(record.tickets_a.is_empty());
    assert!(record
        .error_message
        .as_deref()
        .unwrap()
        .contains("not enough margin"));
}

#[tokio::test]
async fn congelar_twice_yields_one_success_and_one_precondition_failure() {
    let (backend, _agent_a, _agent_b) = versus_fixture().await;
    let id = create_versus(&backend).await;

    let first = backend
        .post(&format!("/api/versus/{id}/congelar"))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 200);

    let second = backend
        .post(&format!("/api/versus/{id}/congelar"))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 400);
    let body: serde_json::Value = second.json().await.unwrap();
    assert!(body["detail"].as_str().unwrap().contains("congelado"));
}

#[tokio::test]
async fn transferir_collapses_a_and_mirrors_on_b() {
    let (backend, agent_a, agent_b) = versus_fixture().await;
    agent_a.push_open_result(Ok(1001));
    agent_a.push_open_result(Ok(1002));
    agent_b.push_open_result(Ok(2001));
    agent_b.push_open_result(Ok(2002));

    let id = create_versus(&backend).await;
    backend
        .post(&format!("/api/versus/{id}/congelar"))
        .send()
        .await
        .unwrap();
    // Warm the cache again to watch both invalidations.
    backend.get("/api/accounts?force_refresh=true").send().await.unwrap();

    let resp = backend
        .post(&format!("/api/versus/{id}/transferir"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["versus"]["status"], "transferido");
    assert_eq!(body["account_a_ticket"], 1001);
    assert_eq!(body["account_b_tickets"], json!([2001, 2002]));

    // Side BUY: the SELL leg (second ticket) is the one closed on A.
    assert_eq!(agent_a.closed_tickets(), vec![1002]);

    // A's surviving leg gets price-level stops:
    //   tp = 1.10000 + 1.5 pips = 1.10015 ; sl = 1.10000 − 4 pips = 1.09960
    let modifies = agent_a.modify_requests();
    assert_eq!(modifies.len(), 1);
    assert_eq!(modifies[0]["ticket"], 1001);
    assert_eq!(modifies[0]["tp"], 1.10015);
    assert_eq!(modifies[0]["sl"], 1.0996);

    // B mirrors with two half-lot SELL legs and pip-denominated stops
    // (tp 5−1=4 pips, sl 2.5−1=1.5 pips).
    let opens = agent_b.open_requests();
    assert_eq!(opens.len(), 2);
    for (leg, open) in opens.iter().enumerate() {
        assert_eq!(open["order_type"], "SELL");
        assert_eq!(open["lot"], 0.5);
        assert_eq!(open["tp_pips"], 4.0);
        assert_eq!(open["sl_pips"], 1.5);
        assert_eq!(
            open["comment"],
            json!(format!("Versus-{id}-B{}", leg + 1))
        );
    }

    let record = backend
        .state
        .versus_store
        .get(&VersusId::from(id.as_str()))
        .unwrap();
    assert_eq!(record.tickets_a, vec![1001]);
    assert_eq!(record.tickets_b, vec![2001, 2002]);

    // Both affected snapshots dropped from the cache.
    assert!(backend.state.cache.get_account(100).is_none());
    assert!(backend.state.cache.get_account(200).is_none());
}

#[tokio::test]
async fn transferir_requires_congelado() {
    let (backend, _agent_a, _agent_b) = versus_fixture().await;
    let id = create_versus(&backend).await;

    let resp = backend
        .post(&format!("/api/versus/{id}/transferir"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn failed_b_leg_parks_the_record_in_error_with_real_tickets() {
    let (backend, agent_a, agent_b) = versus_fixture().await;
    agent_a.push_open_result(Ok(1001));
    agent_a.push_open_result(Ok(1002));
    agent_b.push_open_result(Ok(2001));
    agent_b.push_open_result(Err("margin exceeded"));

    let id = create_versus(&backend).await;
    backend
        .post(&format!("/api/versus/{id}/congelar"))
        .send()
        .await
        .unwrap();

    let resp = backend
        .post(&format!("/api/versus/{id}/transferir"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);

    let record = backend
        .state
        .versus_store
        .get(&VersusId::from(id.as_str()))
        .unwrap();
    assert_eq!(record.status, VersusStatus::Error);
    // A's counter-leg is gone and one B leg is live; the record says so.
    assert_eq!(record.tickets_a, vec![1001]);
    assert_eq!(record.tickets_b, vec![2001]);
    assert_eq!(agent_a.closed_tickets(), vec![1002]);
}

#[tokio::test]
async fn delete_works_in_any_state_and_404s_after() {
    let (backend, _agent_a, _agent_b) = versus_fixture().await;
    let id = create_versus(&backend).await;

    let body: serde_json::Value = backend
        .get("/api/versus")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 1);

    let resp = backend
        .delete(&format!("/api/versus/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = backend
        .delete(&format!("/api/versus/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

// ── Scheduler ────────────────────────────────────────────────────────────────

fn spec(scheduled_congelar: Option<chrono::DateTime<Utc>>) -> VersusSpec {
    VersusSpec {
        account_a: 100,
        account_b: 200,
        symbol: "EURUSD".into(),
        lots: 1.0,
        side: Side::Buy,
        tp_usd_a: 50.0,
        sl_usd_a: 25.0,
        tp_usd_b: 50.0,
        sl_usd_b: 25.0,
        scheduled_congelar,
        scheduled_transferir: None,
    }
}

#[tokio::test]
async fn scheduler_fires_due_congelars() {
    let (backend, agent_a, _agent_b) = versus_fixture().await;
    agent_a.push_open_result(Ok(1001));
    agent_a.push_open_result(Ok(1002));

    let due = backend
        .state
        .engine
        .create(spec(Some(Utc::now() - ChronoDuration::minutes(5))))
        .unwrap();
    let not_due = backend
        .state
        .engine
        .create(spec(Some(Utc::now() + ChronoDuration::hours(1))))
        .unwrap();

    let scheduler = Scheduler::new(
        Arc::clone(&backend.state.engine),
        Arc::clone(&backend.state.versus_store),
        Duration::from_secs(30),
    );
    scheduler.tick().await;

    assert_eq!(
        backend.state.versus_store.get(&due.id).unwrap().status,
        VersusStatus::Congelado
    );
    assert_eq!(
        backend.state.versus_store.get(&not_due.id).unwrap().status,
        VersusStatus::Pending
    );
}

#[tokio::test]
async fn scheduler_with_nothing_due_stays_quiet() {
    let (backend, agent_a, agent_b) = versus_fixture().await;
    backend.state.engine.create(spec(None)).unwrap();

    let scheduler = Scheduler::new(
        Arc::clone(&backend.state.engine),
        Arc::clone(&backend.state.versus_store),
        Duration::from_secs(30),
    );
    scheduler.tick().await;

    assert!(agent_a.open_requests().is_empty());
    assert!(agent_b.open_requests().is_empty());
    assert_eq!(agent_a.refresh_hits(), 0);
}

#[tokio::test]
async fn scheduler_marks_failures_as_error() {
    let (backend, agent_a, _agent_b) = versus_fixture().await;
    // No quote scripted: Congelar fails at the quote step.
    agent_a.script.lock().unwrap().quote_body = None;

    let due = backend
        .state
        .engine
        .create(spec(Some(Utc::now() - ChronoDuration::minutes(1))))
        .unwrap();

    let scheduler = Scheduler::new(
        Arc::clone(&backend.state.engine),
        Arc::clone(&backend.state.versus_store),
        Duration::from_secs(30),
    );
    scheduler.tick().await;

    let record = backend.state.versus_store.get(&due.id).unwrap();
    assert_eq!(record.status, VersusStatus::Error);
    assert!(record.error_message.is_some());
}

#[tokio::test]
async fn scheduler_stops_promptly_on_shutdown() {
    let (backend, _agent_a, _agent_b) = versus_fixture().await;
    let scheduler = Scheduler::new(
        Arc::clone(&backend.state.engine),
        Arc::clone(&backend.state.versus_store),
        Duration::from_secs(3600),
    );

    let token = CancellationToken::new();
    let handle = tokio::spawn(scheduler.run(token.child_token()));
    token.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("scheduler must observe shutdown inside its sleep")
        .unwrap();
}
