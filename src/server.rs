//! HTTP server assembly: shared state, routing, startup.

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use tracing::info;

use crate::cache::{CacheStorage, NoopStorage, SqliteStorage, TieredCache};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::handlers;
use crate::summary::Summarizer;

/// Everything a request handler needs, owned explicitly and injected via
/// `web::Data` - no globals.
pub struct AppState {
  pub config: Config,
  pub summarizer: Summarizer,
  pub cache: TieredCache<Box<dyn CacheStorage>>,
}

/// Build the shared state from configuration.
pub fn build_state(config: Config) -> Result<AppState> {
  let summarizer = Summarizer::new(&config)?;

  let cache = if config.cache.disabled {
    info!("caching disabled by configuration, every request recomputes");
    TieredCache::disabled(Box::new(NoopStorage) as Box<dyn CacheStorage>)
  } else {
    let storage: Box<dyn CacheStorage> =
      Box::new(SqliteStorage::open(config.cache.path.as_deref())?);
    TieredCache::new(storage)
  };

  Ok(AppState {
    summarizer,
    cache,
    config,
  })
}

/// Register every route. Shared between the real server and handler tests.
pub fn app_config(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api")
      .route("/health", web::get().to(handlers::health))
      .route("/env-check", web::get().to(handlers::env_check))
      .route("/projects", web::get().to(handlers::list_projects))
      .route(
        "/projects/{name}/pipeline-counts",
        web::get().to(handlers::pipeline_counts),
      )
      .route(
        "/projects/{name}/metrics",
        web::get().to(handlers::project_metrics),
      )
      .route(
        "/projects/{name}/recent-commits",
        web::get().to(handlers::recent_commits),
      )
      .route("/devops-info", web::get().to(handlers::devops_info))
      .route("/projects/{name}/repos", web::get().to(handlers::project_repos))
      .route(
        "/projects/{name}/pipelines",
        web::get().to(handlers::project_pipelines),
      )
      .route(
        "/projects/{name}/releases",
        web::get().to(handlers::project_releases),
      )
      .route("/projects/{name}/teams", web::get().to(handlers::project_teams))
      .route(
        "/projects/{name}/teams/{team_id}/members",
        web::get().to(handlers::team_members),
      )
      .route(
        "/deployments-by-environment",
        web::get().to(handlers::deployments_by_environment),
      )
      .route(
        "/projects/{name}/deployments-by-environment",
        web::get().to(handlers::project_deployments_by_environment),
      )
      .route(
        "/activity_summary",
        web::get().to(handlers::activity_summary),
      ),
  );
}

/// Run the server until it is shut down.
pub async fn run(config: Config) -> Result<()> {
  let bind = (config.server.bind.clone(), config.server.port);
  let state = web::Data::new(build_state(config)?);

  let server = HttpServer::new(move || {
    App::new()
      .app_data(state.clone())
      .wrap(Cors::permissive())
      .configure(app_config)
  })
  .bind(&bind)
  .map_err(|e| AppError::Unexpected(format!("failed to bind {}:{}: {}", bind.0, bind.1, e)))?
  .run();

  info!("listening on http://{}:{}", bind.0, bind.1);

  server
    .await
    .map_err(|e| AppError::Unexpected(format!("server error: {}", e)))
}
