//! Upstream client behavior against a mock API: pagination, error typing,
//! runaway-token protection.

use serde_json::json;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use devboard::config::{CacheConfig, Config, DevOpsConfig, ServerConfig, UpstreamConfig};
use devboard::devops::client::DevOpsClient;
use devboard::error::AppError;

fn test_config(upstream_uri: &str) -> Config {
  std::env::set_var("DEVBOARD_PAT", "test-pat");
  Config {
    devops: DevOpsConfig {
      org_url: format!("{}/TestOrg", upstream_uri),
    },
    server: ServerConfig::default(),
    upstream: UpstreamConfig::default(),
    cache: CacheConfig {
      path: None,
      disabled: true,
    },
  }
}

fn project_page(range: std::ops::Range<usize>) -> serde_json::Value {
  json!({
    "value": range
      .map(|i| json!({"id": format!("id-{}", i), "name": format!("p{}", i)}))
      .collect::<Vec<_>>()
  })
}

#[tokio::test]
async fn fetch_all_drains_three_pages_in_order() {
  let server = MockServer::start().await;

  // Pages of 10, 10 and 5 records; continuation tokens on the first two.
  Mock::given(method("GET"))
    .and(path("/TestOrg/_apis/projects"))
    .and(query_param_is_missing("continuationToken"))
    .respond_with(
      ResponseTemplate::new(200)
        .insert_header("x-ms-continuationtoken", "t1")
        .set_body_json(project_page(0..10)),
    )
    .expect(1)
    .mount(&server)
    .await;

  Mock::given(method("GET"))
    .and(path("/TestOrg/_apis/projects"))
    .and(query_param("continuationToken", "t1"))
    .respond_with(
      ResponseTemplate::new(200)
        .insert_header("x-ms-continuationtoken", "t2")
        .set_body_json(project_page(10..20)),
    )
    .expect(1)
    .mount(&server)
    .await;

  Mock::given(method("GET"))
    .and(path("/TestOrg/_apis/projects"))
    .and(query_param("continuationToken", "t2"))
    .respond_with(ResponseTemplate::new(200).set_body_json(project_page(20..25)))
    .expect(1)
    .mount(&server)
    .await;

  let client = DevOpsClient::new(&test_config(&server.uri())).unwrap();
  let projects = client.projects().await.unwrap();

  assert_eq!(projects.len(), 25);
  let names: Vec<&str> = projects.iter().map(|p| p.name.as_str()).collect();
  let expected: Vec<String> = (0..25).map(|i| format!("p{}", i)).collect();
  assert_eq!(names, expected.iter().map(String::as_str).collect::<Vec<_>>());
}

#[tokio::test]
async fn non_success_status_becomes_typed_error_with_body() {
  let server = MockServer::start().await;

  Mock::given(method("GET"))
    .and(path("/TestOrg/_apis/projects"))
    .respond_with(ResponseTemplate::new(403).set_body_string("access denied"))
    .mount(&server)
    .await;

  let client = DevOpsClient::new(&test_config(&server.uri())).unwrap();
  let err = client.projects().await.unwrap_err();

  match err {
    AppError::UpstreamHttp { status, body } => {
      assert_eq!(status, 403);
      assert_eq!(body, "access denied");
    }
    other => panic!("expected UpstreamHttp, got {:?}", other),
  }
}

#[tokio::test]
async fn failure_mid_pagination_fails_the_whole_fetch() {
  let server = MockServer::start().await;

  Mock::given(method("GET"))
    .and(path("/TestOrg/_apis/projects"))
    .and(query_param_is_missing("continuationToken"))
    .respond_with(
      ResponseTemplate::new(200)
        .insert_header("x-ms-continuationtoken", "t1")
        .set_body_json(project_page(0..10)),
    )
    .mount(&server)
    .await;

  Mock::given(method("GET"))
    .and(path("/TestOrg/_apis/projects"))
    .and(query_param("continuationToken", "t1"))
    .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
    .mount(&server)
    .await;

  let client = DevOpsClient::new(&test_config(&server.uri())).unwrap();
  // The partial first page is discarded, not returned.
  assert!(client.projects().await.is_err());
}

#[tokio::test]
async fn repeated_continuation_token_terminates_the_drain() {
  let server = MockServer::start().await;

  // A buggy upstream that hands out the same token forever.
  Mock::given(method("GET"))
    .and(path("/TestOrg/_apis/projects"))
    .respond_with(
      ResponseTemplate::new(200)
        .insert_header("x-ms-continuationtoken", "loop")
        .set_body_json(project_page(0..3)),
    )
    .mount(&server)
    .await;

  let client = DevOpsClient::new(&test_config(&server.uri())).unwrap();
  let projects = client.projects().await.unwrap();

  // First page plus the one repeat that revealed the loop.
  assert_eq!(projects.len(), 6);
}
