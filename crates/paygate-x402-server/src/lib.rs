//! x402 resource server: gates HTTP endpoints behind 402 payments.
//!
//! Routes are priced once at startup into a [`PaymentConfig`]. Wrapping an
//! actix `App` in [`PaymentGate`] answers unpaid requests to those routes
//! with a 402 challenge (or a paywall page for browsers), and only runs the
//! handler after the facilitator has verified and settled the payment.
//!
//! # Modules
//!
//! - [`resolver`]: route keys, prices and requirement building ([`RoutesConfigBuilder`])
//! - [`config`]: environment settings of the binary and the resolved [`PaymentConfig`]
//! - [`middleware`]: the per-request state machine ([`require_payment`](middleware::require_payment))
//! - [`gate`]: actix `Transform` around it
//! - [`paywall`]: browser paywall page
//! - [`metrics`]: Prometheus metrics for request and payment tracking
//!
//! # Example
//!
//! ```no_run
//! use actix_web::{web, App, HttpResponse, HttpServer};
//! use x402::FacilitatorClient;
//! use x402_server::{PaymentConfig, PaymentGate};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PaymentConfig::builder("0x209693Bc6afc0C5328bA36FaF03C514EF312287C")
//!     .route("GET /weather", "$0.001")
//!     .build()?;
//! let gate = PaymentGate::new(config, FacilitatorClient::default());
//!
//! HttpServer::new(move || {
//!     App::new()
//!         .wrap(gate.clone())
//!         .route("/weather", web::get().to(|| async { HttpResponse::Ok().body("sunny") }))
//! })
//! .bind(("0.0.0.0", 4021))?
//! .run()
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod middleware;
pub mod paywall;
pub mod resolver;

pub use config::{GateConfig, PaymentConfig, PROTECTED_ROUTE};
pub use error::{ConfigError, GateError, Rejection};
pub use gate::PaymentGate;
pub use middleware::{
    check_payment_gate, decode_payment_header, payment_required_body, require_payment,
};
pub use paywall::PaywallConfig;
pub use resolver::{Price, RouteConfig, RouteOptions, RoutesConfigBuilder};
