//! Org-wide aggregation must tolerate partial upstream failure: one broken
//! project contributes zero instead of failing the whole response.

use actix_web::{test, web, App};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use devboard::config::{CacheConfig, Config, DevOpsConfig, ServerConfig, UpstreamConfig};
use devboard::server::{app_config, build_state};

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

fn value_list(items: Vec<Value>) -> Value {
  json!({ "value": items })
}

/// Three projects; everything about Beta is broken upstream.
async fn mock_org(server: &MockServer) {
  Mock::given(method("GET"))
    .and(path("/TestOrg/_apis/projects"))
    .respond_with(ResponseTemplate::new(200).set_body_json(value_list(vec![
      json!({"id": "1", "name": "Alpha"}),
      json!({"id": "2", "name": "Beta"}),
      json!({"id": "3", "name": "Gamma"}),
    ])))
    .mount(server)
    .await;

  // Builds: Alpha 2, Beta broken, Gamma 1.
  Mock::given(method("GET"))
    .and(path("/TestOrg/Alpha/_apis/build/builds"))
    .respond_with(ResponseTemplate::new(200).set_body_json(value_list(vec![
      json!({"result": "succeeded"}),
      json!({"result": "failed"}),
    ])))
    .mount(server)
    .await;
  Mock::given(method("GET"))
    .and(path("/TestOrg/Beta/_apis/build/builds"))
    .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
    .mount(server)
    .await;
  Mock::given(method("GET"))
    .and(path("/TestOrg/Gamma/_apis/build/builds"))
    .respond_with(
      ResponseTemplate::new(200).set_body_json(value_list(vec![json!({"result": "succeeded"})])),
    )
    .mount(server)
    .await;

  // Deployments: Alpha 1 production, Beta broken, Gamma 2 staging-ish.
  Mock::given(method("GET"))
    .and(path("/TestOrg/Alpha/_apis/release/deployments"))
    .respond_with(ResponseTemplate::new(200).set_body_json(value_list(vec![
      json!({"deploymentStatus": "succeeded", "releaseEnvironment": {"name": "Production"}}),
    ])))
    .mount(server)
    .await;
  Mock::given(method("GET"))
    .and(path("/TestOrg/Beta/_apis/release/deployments"))
    .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
    .mount(server)
    .await;
  Mock::given(method("GET"))
    .and(path("/TestOrg/Gamma/_apis/release/deployments"))
    .respond_with(ResponseTemplate::new(200).set_body_json(value_list(vec![
      json!({"deploymentStatus": "succeeded", "releaseEnvironment": {"name": "staging-prod-mirror"}}),
      json!({"deploymentStatus": "failed", "releaseEnvironment": {"name": "Staging-East"}}),
    ])))
    .mount(server)
    .await;

  // Repositories: Alpha has one repo with three commits, Beta is broken
  // (so its commit count degrades to zero), Gamma has none.
  Mock::given(method("GET"))
    .and(path("/TestOrg/Alpha/_apis/git/repositories"))
    .respond_with(
      ResponseTemplate::new(200)
        .set_body_json(value_list(vec![json!({"id": "r1", "name": "api"})])),
    )
    .mount(server)
    .await;
  Mock::given(method("GET"))
    .and(path("/TestOrg/Beta/_apis/git/repositories"))
    .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
    .mount(server)
    .await;
  Mock::given(method("GET"))
    .and(path("/TestOrg/Gamma/_apis/git/repositories"))
    .respond_with(ResponseTemplate::new(200).set_body_json(value_list(vec![])))
    .mount(server)
    .await;

  Mock::given(method("GET"))
    .and(path("/TestOrg/Alpha/_apis/git/repositories/r1/commits"))
    .respond_with(ResponseTemplate::new(200).set_body_json(value_list(vec![
      json!({"commitId": "c1", "author": {"name": "alice", "date": "2025-06-01T10:00:00Z"}}),
      json!({"commitId": "c2", "author": {"name": "bob", "date": "2025-06-01T11:00:00Z"}}),
      json!({"commitId": "c3", "author": {"name": "alice", "date": "2025-06-01T12:00:00Z"}}),
    ])))
    .mount(server)
    .await;
}

#[tokio::test]
async fn activity_summary_counts_broken_project_as_zero() {
  let server = MockServer::start().await;
  mock_org(&server).await;

  let state = web::Data::new(build_state(test_config(&server.uri())).unwrap());
  let app = test::init_service(App::new().app_data(state).configure(app_config)).await;

  let req = test::TestRequest::get()
    .uri("/api/activity_summary")
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), 200);

  let body: Value = test::read_body_json(resp).await;
  // Alpha contributes 2 builds / 1 deployment / 3 commits, Gamma 1 / 2 / 0,
  // Beta zero across the board. The mock ignores window bounds, so every
  // period sees the same records.
  for period in ["daily", "weekly", "monthly"] {
    assert_eq!(body[period]["pipeline_runs"], 3, "period {}", period);
    assert_eq!(body[period]["releases"], 3, "period {}", period);
    assert_eq!(body[period]["commits"], 3, "period {}", period);
  }
}

#[tokio::test]
async fn org_environment_breakdown_keeps_project_order_with_zero_rows() {
  let server = MockServer::start().await;
  mock_org(&server).await;

  let state = web::Data::new(build_state(test_config(&server.uri())).unwrap());
  let app = test::init_service(App::new().app_data(state).configure(app_config)).await;

  let req = test::TestRequest::get()
    .uri("/api/deployments-by-environment")
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), 200);

  let body: Value = test::read_body_json(resp).await;
  let rows = body.as_array().expect("array of per-project rows");
  assert_eq!(rows.len(), 3);

  assert_eq!(rows[0]["project"], "Alpha");
  assert_eq!(rows[0]["Production"], 1);

  // Beta failed upstream: present, all zeros.
  assert_eq!(rows[1]["project"], "Beta");
  assert_eq!(rows[1]["Test"], 0);
  assert_eq!(rows[1]["Staging"], 0);
  assert_eq!(rows[1]["Production"], 0);

  // Both Gamma names classify as Staging ("stag" is checked before "prod").
  assert_eq!(rows[2]["project"], "Gamma");
  assert_eq!(rows[2]["Staging"], 2);
  assert_eq!(rows[2]["Production"], 0);
}

#[tokio::test]
async fn project_listing_failure_is_fatal() {
  let server = MockServer::start().await;

  Mock::given(method("GET"))
    .and(path("/TestOrg/_apis/projects"))
    .respond_with(ResponseTemplate::new(500).set_body_string("no projects for you"))
    .mount(&server)
    .await;

  let state = web::Data::new(build_state(test_config(&server.uri())).unwrap());
  let app = test::init_service(App::new().app_data(state).configure(app_config)).await;

  let req = test::TestRequest::get()
    .uri("/api/activity_summary")
    .to_request();
  let resp = test::call_service(&app, req).await;

  // The upstream status is echoed through.
  assert_eq!(resp.status(), 500);
}
