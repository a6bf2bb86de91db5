pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;
pub mod types;
pub mod utils;
pub mod validation;

use axum::{
    http::{HeaderValue, Method},
    middleware as axum_middleware,
    response::Redirect,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    middleware::{self as app_middleware, rate_limit::create_login_rate_limiter},
    state::AppState,
};

/// Builds the full application router: REST API, tracking pixel, HTML views
/// and the Swagger UI.
pub fn app(state: AppState) -> anyhow::Result<Router> {
    let login_limiter = create_login_rate_limiter(&state.config)?;

    let login_routes = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .route(
            "/login",
            get(handlers::views::login_page).post(handlers::views::login_submit),
        )
        .layer(login_limiter);

    // Public routes (no auth)
    let public_routes = Router::new()
        .route(
            "/api/auth/forgot-password",
            post(handlers::auth::forgot_password),
        )
        .route(
            "/api/auth/reset-password/validate",
            get(handlers::auth::validate_reset_token),
        )
        .route(
            "/api/auth/reset-password",
            post(handlers::auth::reset_password),
        )
        .route("/api/track/health", get(handlers::tracking::tracking_health))
        .route("/api/track/{file}", get(handlers::tracking::tracking_pixel))
        .route("/logout", post(handlers::views::logout));

    let user_routes = Router::new()
        .route("/api/auth/me", get(handlers::auth::me))
        .route(
            "/api/auth/change-password",
            put(handlers::auth::change_password),
        )
        .route(
            "/api/v1/clients",
            get(handlers::clients::list_clients).post(handlers::clients::create_client),
        )
        .route(
            "/api/v1/clients/search",
            get(handlers::clients::search_clients),
        )
        .route(
            "/api/v1/clients/{id}",
            get(handlers::clients::get_client)
                .put(handlers::clients::update_client)
                .delete(handlers::clients::deactivate_client),
        )
        .route(
            "/api/v1/sellers",
            get(handlers::sellers::list_sellers).post(handlers::sellers::create_seller),
        )
        .route(
            "/api/v1/sellers/search",
            get(handlers::sellers::search_sellers),
        )
        .route(
            "/api/v1/sellers/{id}",
            get(handlers::sellers::get_seller)
                .put(handlers::sellers::update_seller)
                .delete(handlers::sellers::deactivate_seller),
        )
        .route(
            "/api/v1/timesheets",
            post(handlers::timesheets::create_timesheet),
        )
        .route(
            "/api/v1/timesheets/all",
            get(handlers::timesheets::list_all_timesheets),
        )
        .route(
            "/api/v1/timesheets/unbilled",
            get(handlers::timesheets::list_unbilled_timesheets),
        )
        .route(
            "/api/v1/timesheets/monthly",
            get(handlers::timesheets::list_monthly_timesheets),
        )
        .route(
            "/api/v1/timesheets/client/{client_id}",
            get(handlers::timesheets::list_client_timesheets),
        )
        .route(
            "/api/v1/timesheets/{id}",
            get(handlers::timesheets::get_timesheet)
                .put(handlers::timesheets::update_timesheet)
                .delete(handlers::timesheets::delete_timesheet),
        )
        .route(
            "/api/v1/timesheets/{id}/detach",
            post(handlers::timesheets::detach_timesheet),
        )
        .route(
            "/api/v1/timesheets/{id}/payment",
            post(handlers::timesheets::record_payment),
        )
        .route(
            "/api/v1/invoices",
            get(handlers::invoices::list_invoices).post(handlers::invoices::create_invoice),
        )
        .route(
            "/api/v1/invoices/preview",
            post(handlers::invoices::preview_invoice),
        )
        .route(
            "/api/v1/invoices/monthly",
            get(handlers::invoices::list_monthly_invoices),
        )
        .route(
            "/api/v1/invoices/yearly",
            get(handlers::invoices::list_yearly_invoices),
        )
        .route(
            "/api/v1/invoices/report",
            get(handlers::invoices::invoice_report),
        )
        .route(
            "/api/v1/invoices/number/{number}",
            get(handlers::invoices::get_invoice_by_number),
        )
        .route(
            "/api/v1/invoices/{id}",
            get(handlers::invoices::get_invoice)
                .put(handlers::invoices::update_invoice)
                .delete(handlers::invoices::delete_invoice),
        )
        .route(
            "/api/v1/invoices/{id}/pdf",
            get(handlers::invoices::download_pdf),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            app_middleware::auth,
        ));

    let admin_routes = Router::new()
        .route(
            "/api/v1/users",
            get(handlers::users::list_users).post(handlers::users::create_user),
        )
        .route(
            "/api/v1/users/{id}",
            get(handlers::users::get_user)
                .put(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .route("/api/v1/users/{id}/roles", put(handlers::users::update_roles))
        .route(
            "/api/v1/users/{id}/activate",
            put(handlers::users::activate_user),
        )
        .route(
            "/api/v1/users/{id}/deactivate",
            put(handlers::users::deactivate_user),
        )
        .route(
            "/api/v1/users/{id}/default-seller",
            put(handlers::users::set_default_seller),
        )
        .route(
            "/api/v1/admin/users/{id}/reset-password",
            post(handlers::users::admin_reset_password),
        )
        .route(
            "/api/v1/invoice-numbering-schemes",
            get(handlers::numbering::list_schemes).post(handlers::numbering::create_scheme),
        )
        .route(
            "/api/v1/invoice-numbering-schemes/active",
            get(handlers::numbering::list_active_schemes),
        )
        .route(
            "/api/v1/invoice-numbering-schemes/preview",
            post(handlers::numbering::preview_template),
        )
        .route(
            "/api/v1/invoice-numbering-schemes/{id}",
            axum::routing::delete(handlers::numbering::archive_scheme),
        )
        .route(
            "/api/v1/admin/invoice-counters",
            get(handlers::numbering::list_counters),
        )
        .route(
            "/api/v1/tracking/stats",
            get(handlers::tracking::tracking_stats),
        )
        .route(
            "/api/v1/admin/scheduler/invoicing/run",
            post(handlers::scheduler::run_invoicing),
        )
        .route(
            "/api/v1/invoices/monthly/generate",
            post(handlers::invoices::generate_monthly_invoices),
        )
        .route(
            "/api/v1/invoices/{id}/send",
            post(handlers::invoices::send_invoice),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            app_middleware::auth_admin,
        ));

    let view_routes = Router::new()
        .route("/", get(|| async { Redirect::to("/invoices") }))
        .route(
            "/change-password",
            get(handlers::views::change_password_page)
                .post(handlers::views::change_password_submit),
        )
        .route("/clients", get(handlers::views::clients_page))
        .route("/timesheets", get(handlers::views::timesheets_page))
        .route("/invoices", get(handlers::views::invoices_page))
        .route("/invoices/{id}", get(handlers::views::invoice_page))
        .route("/invoices/{id}/send", post(handlers::views::send_invoice))
        .route("/sellers", get(handlers::views::sellers_page))
        .route("/users", get(handlers::views::users_page))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            app_middleware::view_auth,
        ));

    let cors = cors_layer(&state.config.cors_allow_origins);

    Ok(Router::new()
        .merge(login_routes)
        .merge(public_routes)
        .merge(user_routes)
        .merge(admin_routes)
        .merge(view_routes)
        .merge(SwaggerUi::new("/api/docs").url("/api/docs/openapi.json", docs::ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(axum_middleware::from_fn(app_middleware::request_id))
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn(app_middleware::log_error_responses))
                .layer(cors),
        )
        .with_state(state))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter(|origin| origin.as_str() != "*")
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .max_age(std::time::Duration::from_secs(24 * 60 * 60));

    if allowed.is_empty() {
        base.allow_origin(Any).allow_headers(Any)
    } else {
        base.allow_origin(AllowOrigin::list(allowed))
            .allow_headers([
                axum::http::header::AUTHORIZATION,
                axum::http::header::CONTENT_TYPE,
            ])
            .allow_credentials(true)
    }
}
