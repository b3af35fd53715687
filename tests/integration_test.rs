//! Integration tests for the record/sanitize/replay cycle

use cassette_guard::api::{json_or_empty, ChangeDetectionApi, SearchQuery};
use cassette_guard::matching::{MatchKey, RecordMode, ReplayDecision};
use cassette_guard::redact::FILTERED;
use cassette_guard::{
    Headers, HostField, Interaction, RequestSnapshot, ResponseSnapshot, SessionConfig, Settings,
};
use proptest::prelude::*;

const BASE_URL: &str = "https://changedetection.io";

fn session() -> SessionConfig {
    SessionConfig::resolve(Some(BASE_URL), Settings::default())
}

/// `scheme://<12 hex>.redacted.local` prefix check; returns the remainder
fn strip_anonymized_prefix<'a>(url: &'a str, scheme: &str) -> Option<&'a str> {
    let rest = url.strip_prefix(scheme)?.strip_prefix("://")?;
    if rest.len() < 12 || !rest.is_char_boundary(12) {
        return None;
    }
    let (token, rest) = rest.split_at(12);
    if !token.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')) {
        return None;
    }
    rest.strip_prefix(".redacted.local")
}

/// Cassette stand-in: the engine owns storage, tests only need a list
struct Cassette {
    interactions: Vec<Interaction>,
    /// Whether the cassette held interactions when the test started
    existed: bool,
}

impl Cassette {
    fn empty() -> Self {
        Self::load(Vec::new())
    }

    fn load(interactions: Vec<Interaction>) -> Self {
        Self {
            existed: !interactions.is_empty(),
            interactions,
        }
    }

    /// Replay-or-record the way the engine does in record-once mode
    fn handle<F>(&mut self, session: &SessionConfig, live: RequestSnapshot, call: F) -> Option<ResponseSnapshot>
    where
        F: FnOnce(&RequestSnapshot) -> ResponseSnapshot,
    {
        let config = session.engine_config();
        match config.record_mode.decide(self.existed) {
            ReplayDecision::Replay => {
                let index = config.match_policy().find_match(&live, &self.interactions)?;
                self.interactions[index].response.clone()
            }
            ReplayDecision::RecordLive => {
                let response = call(&live);
                let recorded = config.sanitize(Interaction {
                    request: live,
                    response: Some(response.clone()),
                });
                self.interactions.push(recorded);
                Some(response)
            }
        }
    }
}

#[test]
fn test_scenario_a_response_redaction() {
    let config = session().engine_config();
    let headers: Headers = [
        ("x-api-key", "secret123"),
        ("Content-Type", "application/json"),
    ]
    .into_iter()
    .collect();

    let redacted = (config.before_record_response)(Some(ResponseSnapshot::new(200, headers)))
        .unwrap()
        .headers
        .unwrap();

    let expected: Headers = [("x-api-key", "FILTERED"), ("Content-Type", "application/json")]
        .into_iter()
        .collect();
    assert_eq!(redacted, expected);
}

#[test]
fn test_scenario_b_configured_host_anonymized() {
    let config = session().engine_config();
    let request = RequestSnapshot::new("GET", "https://changedetection.io/api/v1/search?q=snacks");

    let output = (config.before_record_request)(request);
    assert_eq!(
        strip_anonymized_prefix(&output.url, "https"),
        Some("/api/v1/search?q=snacks"),
        "unexpected url {}",
        output.url
    );
    assert!(!output.url.contains("changedetection.io"));
}

#[test]
fn test_scenario_c_other_host_unchanged() {
    let config = session().engine_config();
    let mut request = RequestSnapshot::new("GET", "https://other.example.com/x")
        .with_headers(
            [("Host", "other.example.com"), ("x-api-key", "secret"), ("Server", "nginx")]
                .into_iter()
                .collect(),
        )
        .with_host_field(HostField::Settable("other.example.com".to_string()));
    request.body = b"{}".to_vec();

    let output = (config.before_record_request)(request.clone());
    assert_eq!(output, request);
}

#[test]
fn test_scenario_d_no_reference_netloc() {
    let session = SessionConfig::resolve(None, Settings::default());
    let config = session.engine_config();

    for url in [
        "https://changedetection.io/api/v1/search?q=snacks",
        "http://localhost:5000/api/v1/watch/1",
        "/relative",
    ] {
        let request = RequestSnapshot::new("GET", url)
            .with_host_field(HostField::Settable("changedetection.io".to_string()));
        assert_eq!((config.before_record_request)(request.clone()), request);
    }
}

#[test]
fn test_from_env_reads_named_variable() {
    let settings = Settings {
        base_url_env: "CASSETTE_GUARD_IT_BASE_URL".to_string(),
        ..Settings::default()
    };

    std::env::set_var("CASSETTE_GUARD_IT_BASE_URL", "http://localhost:5000");
    let session = SessionConfig::from_env(settings.clone());
    assert_eq!(session.reference_netloc(), Some("localhost:5000"));

    std::env::remove_var("CASSETTE_GUARD_IT_BASE_URL");
    let session = SessionConfig::from_env(settings);
    assert_eq!(session.reference_netloc(), None);
}

#[test]
fn test_record_once_then_replay_across_hosts() {
    let session = session();
    let api = ChangeDetectionApi::new(BASE_URL, "test-api-key").unwrap();
    let mut cassette = Cassette::empty();
    let mut live_calls = 0;

    let response = ResponseSnapshot::new(
        200,
        [("Content-Type", "application/json"), ("CF-RAY", "8f1a2b3c4d5e-AMS")]
            .into_iter()
            .collect(),
    )
    .with_body(r#"{"02370013-3bac-499e-acd5-958f57c51aeb":{"title":"Frikandel Broodje"}}"#);

    // First run records every request, even once the cassette is non-empty
    let first = cassette
        .handle(&session, api.search(&SearchQuery::new("snacks").partial(true)), |_| {
            live_calls += 1;
            response.clone()
        })
        .unwrap();
    assert_eq!(first.status, 200);
    cassette
        .handle(&session, api.watch("02370013-3bac-499e-acd5-958f57c51aeb"), |_| {
            live_calls += 1;
            ResponseSnapshot::new(200, Headers::new()).with_body("{}")
        })
        .unwrap();
    assert_eq!(live_calls, 2);
    assert_eq!(cassette.interactions.len(), 2);

    let recorded = &cassette.interactions[0];
    assert!(!recorded.request.url.contains("changedetection.io"));
    assert_eq!(recorded.request.headers.first("x-api-key"), Some(FILTERED));
    assert_eq!(
        recorded.response.as_ref().unwrap().headers.as_ref().unwrap().first("cf-ray"),
        Some(FILTERED)
    );

    // Second run loads the cassette and replays against a different live host
    let mut cassette = Cassette::load(cassette.interactions);
    let other_api = ChangeDetectionApi::new("https://cd.internal.example", "other-key").unwrap();
    let replayed = cassette
        .handle(&session, other_api.search(&SearchQuery::new("snacks").partial(true)), |_| {
            live_calls += 1;
            response.clone()
        })
        .unwrap();

    assert_eq!(live_calls, 2);
    assert_eq!(cassette.interactions.len(), 2);
    let body = json_or_empty(&replayed).unwrap();
    assert_eq!(
        body["02370013-3bac-499e-acd5-958f57c51aeb"]["title"],
        "Frikandel Broodje"
    );
}

#[test]
fn test_replay_miss_on_different_query() {
    let session = session();
    let api = ChangeDetectionApi::new(BASE_URL, "test-api-key").unwrap();
    let mut cassette = Cassette::empty();

    cassette.handle(&session, api.search(&SearchQuery::new("snacks")), |_| {
        ResponseSnapshot::new(200, Headers::new()).with_body("{}")
    });

    let mut cassette = Cassette::load(cassette.interactions);
    let miss = cassette.handle(&session, api.search(&SearchQuery::new("chips")), |_| {
        panic!("record-once must not call out when a cassette exists")
    });
    assert!(miss.is_none());
}

#[test]
fn test_record_mode_in_engine_config() {
    assert_eq!(session().engine_config().record_mode, RecordMode::Once);
}

fn path_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-zA-Z0-9_.~%-]{1,8}", 0..4)
        .prop_map(|segments| segments.iter().map(|s| format!("/{s}")).collect())
}

fn query_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-zA-Z0-9=&%+_.-]{0,20}")
}

fn url(scheme: &str, netloc: &str, path: &str, query: Option<&str>) -> String {
    match query {
        Some(query) => format!("{scheme}://{netloc}{path}?{query}"),
        None => format!("{scheme}://{netloc}{path}"),
    }
}

proptest! {
    #[test]
    fn prop_sensitive_headers_always_filtered(
        name in prop::sample::select(vec!["x-api-key", "CF-RAY", "Nel", "Report-To", "Server", "cf-cache-status"]),
        upper in any::<bool>(),
        secret in "[ -~]{0,32}",
        other in "[a-z]{1,12}",
        other_value in "[ -~]{0,32}",
    ) {
        prop_assume!(!["x-api-key", "cf-ray", "nel", "report-to", "server", "cf-cache-status"].contains(&other.as_str()));
        let name = if upper { name.to_uppercase() } else { name.to_lowercase() };
        let headers: Headers = [(other.clone(), other_value.clone()), (name.clone(), secret)]
            .into_iter()
            .collect();

        let redacted = session().redactor().redact_headers(&headers);
        let entries: Vec<(String, Vec<String>)> =
            redacted.iter().map(|(n, v)| (n.to_string(), v.to_vec())).collect();
        prop_assert_eq!(
            entries,
            vec![(other, vec![other_value]), (name, vec![FILTERED.to_string()])]
        );
    }

    #[test]
    fn prop_other_hosts_pass_through(
        scheme in prop::sample::select(vec!["http", "https"]),
        host in "[a-z]{1,10}\\.example\\.(com|org)",
        path in path_strategy(),
        query in query_strategy(),
        host_header in any::<bool>(),
    ) {
        let mut request = RequestSnapshot::new("GET", url(scheme, &host, &path, query.as_deref()))
            .with_host_field(HostField::Settable(host.clone()));
        if host_header {
            request = request.with_headers([("Host", host.as_str())].into_iter().collect());
        }

        let output = session().anonymizer().anonymize(request.clone());
        prop_assert_eq!(output, request);
    }

    #[test]
    fn prop_reference_host_anonymized(
        scheme in prop::sample::select(vec!["http", "https"]),
        path in path_strategy(),
        query in query_strategy(),
    ) {
        let request = RequestSnapshot::new("GET", url(scheme, "changedetection.io", &path, query.as_deref()));
        let anonymizer = session().anonymizer().clone();

        let first = anonymizer.anonymize(request.clone());
        let second = anonymizer.anonymize(request);

        let expected_tail = match &query {
            Some(query) => format!("{path}?{query}"),
            None => path.clone(),
        };
        prop_assert_eq!(strip_anonymized_prefix(&first.url, scheme), Some(expected_tail.as_str()));
        prop_assert_eq!(strip_anonymized_prefix(&second.url, scheme), Some(expected_tail.as_str()));
        prop_assert_ne!(first.url, second.url);
        prop_assert_eq!(first.method, "GET");
    }

    #[test]
    fn prop_match_key_ignores_netloc(
        method in prop::sample::select(vec!["GET", "POST", "DELETE"]),
        scheme in prop::sample::select(vec!["http", "https"]),
        a in "[a-z0-9]{1,12}(:[0-9]{2,5})?",
        b in "[a-z0-9]{1,12}\\.redacted\\.local",
        path in path_strategy(),
        query in query_strategy(),
    ) {
        let live = RequestSnapshot::new(method, url(scheme, &a, &path, query.as_deref()));
        let recorded = RequestSnapshot::new(method, url(scheme, &b, &path, query.as_deref()));

        let policy = session().engine_config().match_policy();
        let live_key = MatchKey::from_request(&live);
        let recorded_key = MatchKey::from_request(&recorded);
        for field in policy.fields() {
            prop_assert_eq!(live_key.field(*field), recorded_key.field(*field));
        }
        prop_assert!(policy.matches(&live, &recorded));
    }
}
