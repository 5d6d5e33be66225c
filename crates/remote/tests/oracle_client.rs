use async_trait::async_trait;
use fieldmatch_protocol::{FieldSignals, MatchCandidate, MatchSource};
use fieldmatch_remote::{
    Endpoint, JsonTransport, MatchOracleClient, OracleConfig, RemoteError, TransportResponse,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Answers requests from a queue and records what was sent. An exhausted
/// queue behaves like an unreachable host.
#[derive(Default)]
struct ScriptedTransport {
    replies: Mutex<VecDeque<(u16, String)>>,
    sent: Mutex<Vec<(Endpoint, Value)>>,
}

impl ScriptedTransport {
    fn reply(self, status: u16, body: Value) -> Self {
        self.replies.lock().unwrap().push_back((status, body.to_string()));
        self
    }

    fn reply_raw(self, status: u16, body: &str) -> Self {
        self.replies.lock().unwrap().push_back((status, body.to_string()));
        self
    }

    fn sent(&self) -> Vec<(Endpoint, Value)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl JsonTransport for ScriptedTransport {
    async fn post_json(
        &self,
        endpoint: &Endpoint,
        body: &Value,
    ) -> fieldmatch_remote::Result<TransportResponse> {
        self.sent.lock().unwrap().push((endpoint.clone(), body.clone()));
        match self.replies.lock().unwrap().pop_front() {
            Some((status, body)) => Ok(TransportResponse { status, body }),
            None => Err(RemoteError::Network("connection refused".into())),
        }
    }
}

fn config() -> OracleConfig {
    OracleConfig {
        endpoint: Some("http://oracle.test/".into()),
        ..OracleConfig::default()
    }
}

fn keys(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|key| key.to_string()).collect()
}

fn fields(count: usize) -> Vec<FieldSignals> {
    (0..count)
        .map(|idx| FieldSignals::labelled(format!("Field {idx}")))
        .collect()
}

#[tokio::test]
async fn single_match_is_validated_and_authenticated() {
    let transport = Arc::new(ScriptedTransport::default().reply(
        200,
        json!({
            "matchedKey": "e_mail",
            "confidence": 100,
            "possibleMatches": [
                {"key": "phone", "confidence": 12.4},
                {"key": "ssn", "confidence": 80},
                {"key": "EMAIL", "confidence": 60, "reasoning": "label says email"}
            ]
        }),
    ));
    let client = MatchOracleClient::new(transport.clone(), &config());

    let result = client
        .match_one(
            &FieldSignals::labelled("E-mail"),
            &keys(&["email", "phone"]),
            Some("secret"),
        )
        .await
        .unwrap();

    assert_eq!(result.matched_key.as_deref(), Some("email"));
    assert_eq!(result.confidence, 98);
    assert_eq!(result.source, MatchSource::Oracle { batched: false });
    assert_eq!(
        result.possible_matches,
        vec![
            MatchCandidate {
                key: "email".into(),
                confidence: 60,
                reasoning: Some("label says email".into()),
            },
            MatchCandidate::new("phone", 12),
        ]
    );

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.url, "http://oracle.test/match");
    assert_eq!(sent[0].0.credential.as_deref(), Some("secret"));
    assert_eq!(sent[0].1["label"], "E-mail");
    assert_eq!(sent[0].1["availableKeys"], json!(["email", "phone"]));
}

#[tokio::test]
async fn unknown_key_reports_the_field_unmatched() {
    let transport = Arc::new(
        ScriptedTransport::default().reply(200, json!({"matchedKey": "ssn", "confidence": 95})),
    );
    let client = MatchOracleClient::new(transport, &config());

    let result = client
        .match_one(&FieldSignals::labelled("SSN"), &keys(&["email"]), None)
        .await
        .unwrap();
    assert_eq!(result.matched_key, None);
    assert_eq!(result.confidence, 0);
}

#[tokio::test]
async fn unconfigured_client_never_sends() {
    let transport = Arc::new(ScriptedTransport::default());
    let client = MatchOracleClient::new(transport.clone(), &OracleConfig::default());
    assert!(!client.is_configured());

    let err = client
        .match_one(&FieldSignals::labelled("Email"), &keys(&["email"]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::NotConfigured(_)));
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn malformed_body_is_an_error_without_backoff() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .reply_raw(200, "<html>oops</html>")
            .reply(200, json!({"matchedKey": "email", "confidence": 90})),
    );
    let client = MatchOracleClient::new(transport.clone(), &config());
    let signals = FieldSignals::labelled("Email");

    let err = client
        .match_one(&signals, &keys(&["email"]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Malformed(_)));

    let ok = client.match_one(&signals, &keys(&["email"]), None).await.unwrap();
    assert_eq!(ok.matched_key.as_deref(), Some("email"));
}

#[tokio::test(start_paused = true)]
async fn server_error_opens_the_unavailable_window() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .reply(503, json!({"error": "overloaded"}))
            .reply(200, json!({"matchedKey": "email", "confidence": 90})),
    );
    let client = MatchOracleClient::new(transport.clone(), &config());
    let signals = FieldSignals::labelled("Email");

    let err = client
        .match_one(&signals, &keys(&["email"]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Status { status: 503, .. }));

    let err = client
        .match_one(&signals, &keys(&["email"]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Unavailable { .. }));
    assert_eq!(transport.sent().len(), 1, "fast failure must not hit the network");

    tokio::time::advance(Duration::from_secs(61)).await;
    let ok = client.match_one(&signals, &keys(&["email"]), None).await.unwrap();
    assert_eq!(ok.matched_key.as_deref(), Some("email"));
}

#[tokio::test(start_paused = true)]
async fn batch_goes_out_in_groups_with_a_pause_between() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .reply(200, json!({"mappings": [{"fieldIndex": 0, "matchedKey": "email", "confidence": 90}]}))
            .reply(200, json!({"mappings": [{"fieldIndex": 7, "matchedKey": "Phone", "confidence": 85.5}]}))
            .reply(200, json!({"mappings": []})),
    );
    let client = MatchOracleClient::new(transport.clone(), &config());

    let started = tokio::time::Instant::now();
    let outcome = client
        .match_batch(&fields(12), &keys(&["email", "phone"]), None)
        .await;

    assert!(outcome.is_complete());
    assert_eq!(outcome.results.len(), 12);
    assert_eq!(outcome.results[&0].matched_key.as_deref(), Some("email"));
    assert_eq!(outcome.results[&7].matched_key.as_deref(), Some("phone"));
    assert_eq!(outcome.results[&7].confidence, 86);
    assert_eq!(outcome.results[&11].matched_key, None);
    assert!(started.elapsed() >= Duration::from_millis(600));

    let sent = transport.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].0.url, "http://oracle.test/match/batch");
    let indices: Vec<Vec<u64>> = sent
        .iter()
        .map(|(_, body)| {
            body["fields"]
                .as_array()
                .unwrap()
                .iter()
                .map(|field| field["index"].as_u64().unwrap())
                .collect()
        })
        .collect();
    assert_eq!(
        indices,
        vec![vec![0, 1, 2, 3, 4], vec![5, 6, 7, 8, 9], vec![10, 11]]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_group_is_reported_and_later_groups_fail_fast() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .reply(200, json!({"mappings": [{"fieldIndex": 1, "matchedKey": "email", "confidence": 90}]}))
            .reply(500, json!({})),
    );
    let client = MatchOracleClient::new(transport.clone(), &config());

    let outcome = client.match_batch(&fields(12), &keys(&["email"]), None).await;

    assert!(!outcome.is_complete());
    assert_eq!(outcome.failed_indices, (5..12).collect::<Vec<_>>());
    assert_eq!(outcome.results.len(), 5);
    assert_eq!(outcome.results[&1].matched_key.as_deref(), Some("email"));
    assert_eq!(transport.sent().len(), 2);
}

#[tokio::test]
async fn batch_mappings_outside_the_group_are_ignored() {
    let transport = Arc::new(ScriptedTransport::default().reply(
        200,
        json!({"mappings": [
            {"fieldIndex": 9, "matchedKey": "email", "confidence": 90},
            {"fieldIndex": 0, "matchedKey": "email", "confidence": 40},
            {"fieldIndex": 0, "matchedKey": "email", "confidence": 70}
        ]}),
    ));
    let client = MatchOracleClient::new(transport, &config());

    let outcome = client.match_batch(&fields(2), &keys(&["email"]), None).await;
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.results[&0].confidence, 70);
    assert!(!outcome.results.contains_key(&9));
}

#[tokio::test]
async fn batch_without_keys_makes_no_call() {
    let transport = Arc::new(ScriptedTransport::default());
    let client = MatchOracleClient::new(transport.clone(), &config());

    let outcome = client.match_batch(&fields(3), &[], None).await;
    assert_eq!(outcome.results.len(), 3);
    assert!(outcome.results.values().all(|result| result.confidence == 0));
    assert!(transport.sent().is_empty());
}
