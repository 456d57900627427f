use chrono::NaiveDate;
use commitpulse::collect::{collect, CollectorConfig, GitLabClient, RepoLocator};
use commitpulse::model::{DateRange, Granularity};
use commitpulse::PulseError;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COMMITS_PATH: &str = "/projects/42/repository/commits";

fn client(server: &MockServer) -> GitLabClient {
    GitLabClient::new(
        CollectorConfig::new(server.uri(), "secret")
            .with_page_size(2)
            .with_page_delay(Duration::ZERO),
    )
    .unwrap()
}

fn locator(server: &MockServer) -> RepoLocator {
    RepoLocator {
        api_base: server.uri(),
        project_path: "acme/widgets".to_string(),
        repo_name: "widgets".to_string(),
    }
}

fn january() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
    )
    .unwrap()
}

fn commit(author: &str, date: &str, additions: u64, deletions: u64) -> Value {
    json!({
        "id": format!("{author}-{date}"),
        "author_name": author,
        "committed_date": date,
        "stats": {"additions": additions, "deletions": deletions, "total": additions + deletions}
    })
}

async fn mount_project(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/projects/acme(%2F|/)widgets$"))
        .and(header("PRIVATE-TOKEN", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42, "name": "widgets"})))
        .mount(server)
        .await;
}

async fn mount_count(server: &MockServer, total: Option<u64>) {
    let mut response = ResponseTemplate::new(200).set_body_json(json!([]));
    if let Some(total) = total {
        response = response.insert_header("X-Total", total.to_string().as_str());
    }
    Mock::given(method("GET"))
        .and(path(COMMITS_PATH))
        .and(query_param("per_page", "1"))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, page: u32, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(COMMITS_PATH))
        .and(query_param("per_page", "2"))
        .and(query_param("page", page.to_string()))
        .and(query_param("with_stats", "true"))
        .and(query_param("since", "2024-01-01T00:00:00Z"))
        .and(query_param("until", "2024-01-31T23:59:59Z"))
        .and(header("PRIVATE-TOKEN", "secret"))
        .respond_with(response)
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn pages_until_an_empty_page() {
    let server = MockServer::start().await;
    mount_project(&server).await;
    mount_count(&server, Some(3)).await;
    mount_page(
        &server,
        1,
        ResponseTemplate::new(200).set_body_json(json!([
            commit("Alice", "2024-01-30T12:00:00.000+00:00", 10, 2),
            commit("Bob", "2024-01-16T09:00:00.000+00:00", 3, 3),
        ])),
    )
    .await;
    mount_page(
        &server,
        2,
        ResponseTemplate::new(200).set_body_json(json!([commit(
            "Alice",
            "2024-01-02T08:00:00.000+00:00",
            1,
            0
        )])),
    )
    .await;
    mount_page(&server, 3, ResponseTemplate::new(200).set_body_json(json!([]))).await;

    let doc = collect(&client(&server), &locator(&server), &january(), Granularity::Week)
        .await
        .unwrap();

    assert_eq!(
        doc.intervals(),
        vec!["2024-W01", "2024-W02", "2024-W03", "2024-W04", "2024-W05"]
    );
    assert_eq!(doc.authors, vec!["Alice", "Bob"]);
    assert!(doc.is_dense());
    assert_eq!(doc.data[0].commits("Alice"), 1);
    assert_eq!(doc.data[2].edits("Bob"), 6);
    assert_eq!(doc.data[4].edits("Alice"), 12);
}

#[tokio::test]
async fn missing_total_header_is_tolerated() {
    let server = MockServer::start().await;
    mount_project(&server).await;
    mount_count(&server, None).await;
    mount_page(&server, 1, ResponseTemplate::new(200).set_body_json(json!([]))).await;

    let doc = collect(&client(&server), &locator(&server), &january(), Granularity::Month)
        .await
        .unwrap();
    assert_eq!(doc.intervals(), vec!["2024-01"]);
    assert!(doc.authors.is_empty());
}

#[tokio::test]
async fn rejected_token_is_an_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/projects/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "401 Unauthorized"})))
        .mount(&server)
        .await;

    let err = collect(&client(&server), &locator(&server), &january(), Granularity::Day)
        .await
        .unwrap_err();
    assert!(matches!(err, PulseError::Authentication(_)), "{err:?}");
}

#[tokio::test]
async fn unknown_project_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/projects/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client(&server)
        .resolve_project_id("acme/ghost")
        .await
        .unwrap_err();
    assert!(matches!(err, PulseError::NotFound(ref what) if what == "acme/ghost"), "{err:?}");
}

#[tokio::test]
async fn failing_page_aborts_the_fetch() {
    let server = MockServer::start().await;
    mount_project(&server).await;
    mount_count(&server, Some(5)).await;
    mount_page(
        &server,
        1,
        ResponseTemplate::new(200).set_body_json(json!([
            commit("Alice", "2024-01-03T12:00:00.000+00:00", 1, 1),
            commit("Alice", "2024-01-04T12:00:00.000+00:00", 1, 1),
        ])),
    )
    .await;
    mount_page(&server, 2, ResponseTemplate::new(502).set_body_string("bad gateway")).await;

    let err = client(&server).fetch_commits(42, &january()).await.unwrap_err();
    match err {
        PulseError::Upstream(msg) => {
            assert!(msg.contains("page 2"), "{msg}");
            assert!(msg.contains("bad gateway"), "{msg}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_page_is_an_upstream_error() {
    let server = MockServer::start().await;
    mount_count(&server, Some(1)).await;
    mount_page(&server, 1, ResponseTemplate::new(200).set_body_string("<html>")).await;

    let err = client(&server).fetch_commits(42, &january()).await.unwrap_err();
    assert!(matches!(err, PulseError::Upstream(_)), "{err:?}");
}
