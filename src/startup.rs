use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;

use crate::auth::RefreshTokenManager;
use crate::middleware::BearerAuth;
use crate::routes::{
    current_claims, health_check, json_error_handler, path_error_handler, refresh, revoke,
};

pub fn run(listener: TcpListener, manager: RefreshTokenManager) -> Result<Server, std::io::Error> {
    let context = manager.shared_context();
    let manager = web::Data::new(manager);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(manager.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::PathConfig::default().error_handler(path_error_handler))
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/refresh", web::post().to(refresh))
            // Protected routes
            .service(
                web::scope("/api")
                    .wrap(BearerAuth::new(context.clone()))
                    .route("/me", web::get().to(current_claims))
                    .route("/refresh-tokens/{id}", web::delete().to(revoke)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
