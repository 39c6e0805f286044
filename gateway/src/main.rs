//! # GravyValet Gateway
//!
//! The **gateway** binary is the addon execution substrate's HTTP
//! surface: it resolves an `OperationDeclaration` request into a call
//! against a provider implementation, running the invocation state
//! machine described in the invocation engine around it.
//!
//! ## Architecture Overview
//!
//! Follows the same layering `auth-service` does, generalized from one
//! domain (user auth) to another (addon invocation):
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        HTTP Layer (api/)                        │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐ │
//! │  │   routes    │  │  handlers   │  │    DTOs (Request/Res)   │ │
//! │  └──────┬──────┘  └──────┬──────┘  └────────────┬────────────┘ │
//! └─────────┼────────────────┼─────────────────────┼───────────────┘
//!           │                │                      │
//!           ▼                ▼                      ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │               Invocation Engine (gravy-engine)                  │
//! │  state machine, dibs lease, argument binding, dispatch          │
//! └─────────────────────────┬───────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │         Provider Implementations (gravy-providers)               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## API Endpoints
//!
//! | Method | Endpoint                      | Description                    |
//! |--------|--------------------------------|--------------------------------|
//! | GET    | `/health`                      | Service health status          |
//! | GET    | `/oauth2/callback`             | OAuth2 authorization-code callback |
//! | GET    | `/oauth1/callback`             | OAuth1a handshake callback      |
//! | POST   | `/api/v1/invocations`          | Submit an operation invocation |
//! | GET    | `/api/v1/invocations/{id}`     | Read back an invocation's state|
//! | POST   | `/api/v1/waterbutler/invocations` | Waterbutler-compat invocation |

use actix_web::{dev::Service, middleware, web, App, HttpServer};
use gravy_crypto::Cipher;
use gravy_domain::repository::{
    AuthorizedAccountRepository, ConfiguredAddonRepository, ExternalCredentialsRepository, ExternalServiceRepository,
    OAuth1ClientConfigRepository, OAuth2ClientConfigRepository, UserReferenceRepository,
};
use gravy_engine::factory::{IMPLEMENTATION_BOX_DOT_COM, IMPLEMENTATION_ZENODO, IMPLEMENTATION_ZOTERO};
use gravy_engine::{InProcessDeferredQueue, InvocationEngine, InvocationRepository};
use gravy_oauth::SingleFlightRefresher;
use gravy_operations::Registry;
use shared::redis_client::RedisClient;
use shared::{caller::CallerContext, config::AppConfig, database, tracing_config};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod api;
mod state;
mod waterbutler;

use api::routes;
use state::AppState;

/// Builds the process-wide operation/provider registry (§4.4): declares
/// every standard operation once, then registers the three bundled
/// provider implementations against the interfaces they satisfy.
fn build_registry() -> Registry {
    let mut registry = Registry::new();
    registry.declare_operations(gravy_operations::standard_operations());

    registry
        .register_provider(
            IMPLEMENTATION_BOX_DOT_COM,
            "box",
            ["get_root_items".to_string(), "list_child_items".to_string(), "delete_item".to_string()],
        )
        .expect("box provider registration must not collide at startup");

    registry
        .register_provider(
            IMPLEMENTATION_ZOTERO,
            "zotero",
            [
                "get_external_account_id".to_string(),
                "list_root_collections".to_string(),
                "list_collection_items".to_string(),
            ],
        )
        .expect("zotero provider registration must not collide at startup");

    registry
        .register_provider(
            IMPLEMENTATION_ZENODO,
            "zenodo",
            [
                "build_url_for_id".to_string(),
                "get_external_account_id".to_string(),
                "list_root_items".to_string(),
                "list_child_items".to_string(),
            ],
        )
        .expect("zenodo provider registration must not collide at startup");

    registry
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // ─────────────────────────────────────────────────────────────────────
    // Step 1: Load configuration from environment
    // ─────────────────────────────────────────────────────────────────────
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // ─────────────────────────────────────────────────────────────────────
    // Step 2: Initialize structured logging
    // ─────────────────────────────────────────────────────────────────────
    tracing_config::init_tracing(&config.service_name, config.is_production());

    info!(
        service = %config.service_name,
        host = %config.server.host,
        port = %config.server.port,
        "Starting gravyvalet gateway"
    );

    // ─────────────────────────────────────────────────────────────────────
    // Step 3: Create PostgreSQL connection pool
    // ─────────────────────────────────────────────────────────────────────
    let db_pool = database::create_pool(&config.database).await.expect("Failed to create database pool");

    // ─────────────────────────────────────────────────────────────────────
    // Step 3b: Connect to Redis, used to hold OAuth1a handshake state
    // between the redirect to the provider and its callback (§4.3).
    // ─────────────────────────────────────────────────────────────────────
    let redis = RedisClient::new(&config.redis).await.expect("Failed to connect to Redis");

    // ─────────────────────────────────────────────────────────────────────
    // Step 4: Build the credential-at-rest cipher and OAuth2 refresh
    // coordination, then the repositories that sit directly on the pool
    // ─────────────────────────────────────────────────────────────────────
    let cipher = Arc::new(Cipher::new(&config.encryption));
    let refresher = Arc::new(SingleFlightRefresher::new());
    let http_client = reqwest::Client::new();

    let services = ExternalServiceRepository::new(db_pool.clone());
    let accounts = AuthorizedAccountRepository::new(db_pool.clone());
    let addons = ConfiguredAddonRepository::new(db_pool.clone());
    let credentials = ExternalCredentialsRepository::new(db_pool.clone());
    let oauth2_clients = OAuth2ClientConfigRepository::new(db_pool.clone());
    let oauth1_clients = OAuth1ClientConfigRepository::new(db_pool.clone());
    let user_references = UserReferenceRepository::new(db_pool.clone());
    let invocations = InvocationRepository::new(db_pool.clone());

    // ─────────────────────────────────────────────────────────────────────
    // Step 5: Instantiate the operation registry, deferred-execution
    // worker, and the invocation engine that ties everything together
    // ─────────────────────────────────────────────────────────────────────
    let registry = Arc::new(build_registry());

    let (deferred_queue, deferred_receiver) = InProcessDeferredQueue::new(256);
    let deferred_queue: Arc<dyn gravy_engine::DeferredQueue> = Arc::new(deferred_queue);

    let engine = Arc::new(InvocationEngine::new(
        services.clone(),
        accounts.clone(),
        addons,
        credentials.clone(),
        oauth2_clients.clone(),
        oauth1_clients.clone(),
        invocations,
        registry,
        cipher.clone(),
        refresher,
        http_client.clone(),
        Duration::from_secs(config.invocation.http_timeout_seconds),
        Duration::from_secs(config.invocation.invocation_timeout_seconds),
        deferred_queue,
    ));

    let worker_engine = Arc::clone(&engine);
    tokio::spawn(gravy_engine::run_worker(deferred_receiver, Arc::new(move |invocation_id| {
        let engine = Arc::clone(&worker_engine);
        async move {
            let worker_id = uuid::Uuid::new_v4();
            engine.run_deferred(invocation_id, worker_id).await
        }
    })));

    let app_state = web::Data::new(AppState {
        engine,
        accounts,
        user_references,
        db_pool: db_pool.clone(),
        services,
        credentials,
        oauth2_clients,
        oauth1_clients,
        cipher,
        http_client,
        redis,
    });
    let app_config = web::Data::new(config.clone());

    // ─────────────────────────────────────────────────────────────────────
    // Step 6: Configure and start HTTP server
    // ─────────────────────────────────────────────────────────────────────
    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    info!("Server listening on {}:{}", server_host, server_port);

    HttpServer::new(move || {
        let cors = actix_cors::Cors::default().allow_any_origin().allow_any_method().allow_any_header().max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .wrap_fn(|req, srv| {
                // Attaches the forwarded-identity header into request
                // extensions before any extractor runs (§ caller.rs).
                if let Err(e) = CallerContext::attach(&req) {
                    return Box::pin(async move { Err(e.into()) })
                        as std::pin::Pin<Box<dyn std::future::Future<Output = Result<_, actix_web::Error>>>>;
                }
                Box::pin(srv.call(req))
            })
            .app_data(app_state.clone())
            .app_data(app_config.clone())
            .configure(routes::configure)
    })
    .bind((server_host, server_port))?
    .run()
    .await
}
