//! Main entry point for the rental marketplace booking server.
//! This crate wires the booking engine to its REST API endpoints.

use std::sync::Arc;

use actix_web::{App, HttpResponse, HttpServer, middleware::Logger, web};
use auth_services::middleware::AuthMiddleware;
use booking_engine::{BookingEngine, EmailService, NotificationServiceImpl, SmsService};
use listings::PgListingDirectory;
use notification_services::{
    AwsSesEmailService, AwsSnsSmsService, MockEmailService, MockSmsService,
};
use postgres::database::*;
use web_handlers::*;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    log::info!("Starting rental marketplace booking server...");

    // Create database connection pool
    let pool = match create_connection_pool().await {
        Ok(pool) => {
            log::info!("Database pool created successfully");

            if let Err(e) = test_connection(&pool).await {
                log::error!("Database connection test failed: {}", e);
            }
            pool
        }
        Err(e) => {
            log::error!("Failed to create database pool: {}", e);
            std::process::exit(1);
        }
    };

    // Notification senders: AWS when configured, mocks otherwise
    let (email_service, sms_service): (Arc<dyn EmailService>, Arc<dyn SmsService>) =
        match AwsSesEmailService::new().await {
            Ok(ses) => {
                log::info!("AWS notification senders initialized");
                (Arc::new(ses), Arc::new(AwsSnsSmsService::new().await))
            }
            Err(e) => {
                log::warn!("AWS senders unavailable ({}), using mock senders", e);
                (Arc::new(MockEmailService), Arc::new(MockSmsService))
            }
        };

    let notifier = Arc::new(NotificationServiceImpl::new(
        pool.clone(),
        Some(email_service),
        Some(sms_service),
        None,
    ));
    let listing_directory = Arc::new(PgListingDirectory::new(pool.clone()));
    let engine = BookingEngine::new(pool.clone(), listing_directory, notifier, None);

    log::info!("Server will be available at: http://0.0.0.0:8080");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(engine.clone()))
            .wrap(Logger::default())
            .service(
                web::scope("/api")
                    // Public routes
                    .route(
                        "/listings/{listing_id}/booked-dates",
                        web::get().to(get_booked_dates),
                    )
                    // Rental request routes (require authentication)
                    .service(
                        web::scope("/requests")
                            .wrap(AuthMiddleware)
                            .route("", web::post().to(create_request))
                            .route("/sent", web::get().to(get_sent_requests))
                            .route("/received", web::get().to(get_received_requests))
                            .route("/{request_id}", web::get().to(get_request))
                            .route("/{request_id}/approve", web::post().to(approve_request))
                            .route("/{request_id}/reject", web::post().to(reject_request))
                            .route("/{request_id}/cancel", web::post().to(cancel_request)),
                    ),
            )
            .route(
                "/health",
                web::get().to(|| async { HttpResponse::Ok().body("OK") }),
            )
    })
    .bind("0.0.0.0:8080")?
    .run()
    .await
}
