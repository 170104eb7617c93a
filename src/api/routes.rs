//! Route table.

use actix_web::web;

use super::{handlers, middleware};

/// Registers every route on the application.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(middleware::json_config())
        .service(handlers::home)
        .service(handlers::patient_prediction)
        .service(handlers::drugs_inventory_prediction)
        .service(handlers::opd_priority)
        .service(handlers::bed_priority);
}
