//! Route configuration (§6), mirroring `auth-service`'s
//! `configure(cfg: &mut web::ServiceConfig)` shape.

use actix_web::web;

use super::handlers;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health_check))
        .route("/oauth2/callback", web::get().to(handlers::oauth2_callback))
        .route("/oauth1/callback", web::get().to(handlers::oauth1_callback))
        .service(
            web::scope("/api/v1")
                .route("/invocations", web::post().to(handlers::invoke))
                .route("/invocations/{id}", web::get().to(handlers::get_invocation))
                .route("/waterbutler/invocations", web::post().to(handlers::waterbutler_invoke)),
        );
}
