pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod store;

pub use api::routes;
pub use config::AppConfig;
pub use error::{OmasError, OmasResult};
pub use logic::OmasServices;
pub use model::*;
pub use store::{InMemoryRepository, MetadataRepository, PostgresRepository};

use axum::http::Method;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::api::ServerInstance;
use crate::config::RepositoryBackend;

/// Wire the services for one repository into a ready-to-serve router.
pub fn build_app<R: MetadataRepository + 'static>(repository: Arc<R>, config: &AppConfig) -> Router {
    let services = OmasServices::new(
        repository,
        config.service.local_metadata_collection.as_deref(),
    );
    let instance = Arc::new(ServerInstance::new(&config.service, services));
    let app = routes::create_router::<R>().with_state(instance);

    if config.server.enable_cors {
        app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::DELETE])
                .allow_headers(Any),
        )
    } else {
        app
    }
}

/// Build the router on the configured repository backend.
pub async fn build_configured_app(config: &AppConfig) -> anyhow::Result<Router> {
    match config.repository.backend {
        RepositoryBackend::Memory => {
            log::info!("Using the in-memory metadata repository");
            let repository = InMemoryRepository::new(
                model::TypeRegistry::open_metadata(),
                config.repository.purge_supported,
            );
            Ok(build_app(Arc::new(repository), config))
        }
        RepositoryBackend::Postgres => {
            let database_url = config.database_url()?;
            let repository = PostgresRepository::new(
                &database_url,
                config.repository.max_connections.unwrap_or(20),
                config.repository.purge_supported,
            )
            .await?;
            repository.migrate().await?;
            log::info!("PostgreSQL metadata repository ready");
            Ok(build_app(Arc::new(repository), config))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_and_unknown_server_name() {
        let config = AppConfig::default();
        let app = build_app(Arc::new(InMemoryRepository::default()), &config);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/servers/elsewhere/open-metadata/access-services/data-engine/users/u/find")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"qualifiedName":"x"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
