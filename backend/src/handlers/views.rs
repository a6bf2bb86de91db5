//! Server-rendered pages behind the cookie session. Errors never surface as
//! JSON here; they come back as `?error=` flash redirects.

use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue},
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form,
};
use serde::Deserialize;

use crate::{
    error::AppError,
    models::{
        invoice::{InvoiceDetail, InvoiceListQuery},
        user::{ChangePasswordRequest, LoginRequest, User},
    },
    state::AppState,
    types::InvoiceId,
    utils::{
        cookies::{build_auth_cookie, build_clear_cookie, CookieOptions},
        email::escape_html,
        money::format_gbp,
    },
};

#[derive(Debug, Default, Deserialize)]
pub struct FlashQuery {
    pub success: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordForm {
    pub current_password: String,
    pub new_password: String,
}

/// `target?error=...` or `target?success=...`, URL-encoded.
pub fn flash_redirect(target: &str, kind: &str, message: &str) -> Redirect {
    let encoded: String = url::form_urlencoded::byte_serialize(message.as_bytes()).collect();
    Redirect::to(&format!("{}?{}={}", target, kind, encoded))
}

fn error_redirect(target: &str, err: &AppError) -> Response {
    tracing::warn!(target, error = %err, "View action failed");
    flash_redirect(target, "error", &err.public_message()).into_response()
}

fn flash_block(flash: &FlashQuery) -> String {
    let mut out = String::new();
    if let Some(message) = flash.success.as_deref() {
        out.push_str(&format!(r#"<p class="flash success">{}</p>"#, escape_html(message)));
    }
    if let Some(message) = flash.error.as_deref() {
        out.push_str(&format!(r#"<p class="flash error">{}</p>"#, escape_html(message)));
    }
    out
}

fn page(title: &str, user: Option<&User>, flash: &FlashQuery, body: &str) -> Html<String> {
    let nav = match user {
        Some(user) => {
            let admin_link = if user.is_admin() {
                r#" | <a href="/users">Users</a>"#
            } else {
                ""
            };
            format!(
                r#"<nav><a href="/invoices">Invoices</a> | <a href="/timesheets">Timesheets</a> | <a href="/clients">Clients</a> | <a href="/sellers">Sellers</a>{admin_link}
<form method="post" action="/logout" style="display:inline"><button type="submit">Log out {name}</button></form></nav>"#,
                admin_link = admin_link,
                name = escape_html(&user.username),
            )
        }
        None => String::new(),
    };
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en"><head><meta charset="utf-8"><title>{title}</title></head>
<body>{nav}<main><h1>{title}</h1>{flash}{body}</main></body></html>"#,
        title = escape_html(title),
        nav = nav,
        flash = flash_block(flash),
        body = body,
    ))
}

fn session_cookie(state: &AppState, token: &str) -> Option<HeaderValue> {
    let max_age = Duration::from_secs(state.config.jwt_expiration_hours * 3600);
    let cookie = build_auth_cookie(token, max_age, CookieOptions::from_config(&state.config));
    HeaderValue::from_str(&cookie).ok()
}

fn with_cookie(mut response: Response, cookie: Option<HeaderValue>) -> Response {
    if let Some(cookie) = cookie {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}

pub async fn login_page(Query(flash): Query<FlashQuery>) -> Html<String> {
    page(
        "Sign in",
        None,
        &flash,
        r#"<form method="post" action="/login">
<label>Username <input name="username" required></label>
<label>Password <input name="password" type="password" required></label>
<button type="submit">Sign in</button></form>"#,
    )
}

pub async fn login_submit(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let request = LoginRequest {
        username: form.username,
        password: form.password,
    };
    match state.auth().login(&request).await {
        Ok(login) => {
            let target = if login.requires_password_change {
                "/change-password"
            } else {
                "/invoices"
            };
            with_cookie(
                Redirect::to(target).into_response(),
                session_cookie(&state, &login.access_token),
            )
        }
        Err(err) => error_redirect("/login", &err),
    }
}

pub async fn logout(State(state): State<AppState>) -> Response {
    let cookie = HeaderValue::from_str(&build_clear_cookie(CookieOptions::from_config(
        &state.config,
    )))
    .ok();
    with_cookie(
        flash_redirect("/login", "success", "You have been signed out").into_response(),
        cookie,
    )
}

pub async fn change_password_page(
    Extension(user): Extension<User>,
    Query(flash): Query<FlashQuery>,
) -> Html<String> {
    let notice = if user.requires_password_change {
        "<p>You must choose a new password before continuing.</p>"
    } else {
        ""
    };
    page(
        "Change password",
        Some(&user),
        &flash,
        &format!(
            r#"{notice}<form method="post" action="/change-password">
<label>Current password <input name="current_password" type="password" required></label>
<label>New password <input name="new_password" type="password" required></label>
<button type="submit">Change password</button></form>"#,
            notice = notice
        ),
    )
}

pub async fn change_password_submit(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Form(form): Form<ChangePasswordForm>,
) -> Response {
    let request = ChangePasswordRequest {
        current_password: form.current_password,
        new_password: form.new_password,
    };
    match state.auth().change_password(&user, &request).await {
        Ok(token) => with_cookie(
            flash_redirect("/invoices", "success", "Password changed").into_response(),
            session_cookie(&state, &token),
        ),
        Err(err) => error_redirect("/change-password", &err),
    }
}

pub async fn clients_page(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    let clients = match state.clients().list(true).await {
        Ok(clients) => clients,
        Err(err) => return error_redirect("/invoices", &err),
    };
    let rows: String = clients
        .iter()
        .map(|client| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&client.name),
                escape_html(&client.email),
                escape_html(&client.address_lines().join(", ")),
                format_gbp(client.hourly_rate),
                if client.active { "Active" } else { "Inactive" },
            )
        })
        .collect();
    page(
        "Clients",
        Some(&user),
        &flash,
        &format!(
            "<table><thead><tr><th>Name</th><th>Email</th><th>Address</th><th>Rate</th><th>Status</th></tr></thead><tbody>{}</tbody></table>",
            rows
        ),
    )
    .into_response()
}

pub async fn timesheets_page(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    let timesheets = match state.timesheets().list_all().await {
        Ok(timesheets) => timesheets,
        Err(err) => return error_redirect("/invoices", &err),
    };
    let rows: String = timesheets
        .iter()
        .map(|sheet| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                sheet.service_date,
                escape_html(&sheet.client_name),
                sheet.duration,
                format_gbp(sheet.amount()),
                if sheet.invoiced { "Invoiced" } else { "Unbilled" },
            )
        })
        .collect();
    page(
        "Timesheets",
        Some(&user),
        &flash,
        &format!(
            "<table><thead><tr><th>Date</th><th>Client</th><th>Hours</th><th>Amount</th><th>Status</th></tr></thead><tbody>{}</tbody></table>",
            rows
        ),
    )
    .into_response()
}

pub async fn invoices_page(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    let page_data = match state.invoices().list(&InvoiceListQuery::default()).await {
        Ok(page_data) => page_data,
        Err(err) => {
            tracing::error!(error = %err, "Invoice list view failed");
            return page("Invoices", Some(&user), &flash, "<p>Invoices are unavailable.</p>")
                .into_response();
        }
    };
    let rows: String = page_data
        .data
        .iter()
        .map(|invoice| {
            format!(
                r#"<tr><td><a href="/invoices/{id}">{number}</a></td><td>{date}</td><td>{client}</td><td>{total}</td><td>{sent}</td><td>{opens}</td></tr>"#,
                id = invoice.id,
                number = escape_html(&invoice.invoice_number),
                date = invoice.issue_date,
                client = escape_html(&invoice.client_name),
                total = format_gbp(invoice.total_amount),
                sent = if invoice.email_sent_at.is_some() { "Sent" } else { "Not sent" },
                opens = invoice.email_open_count,
            )
        })
        .collect();
    page(
        "Invoices",
        Some(&user),
        &flash,
        &format!(
            "<p>{} invoice(s)</p><table><thead><tr><th>Number</th><th>Issued</th><th>Client</th><th>Total</th><th>Email</th><th>Opens</th></tr></thead><tbody>{}</tbody></table>",
            page_data.total, rows
        ),
    )
    .into_response()
}

fn invoice_detail_body(detail: &InvoiceDetail) -> String {
    let invoice = &detail.invoice;
    let items: String = detail
        .items
        .iter()
        .map(|item| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                item.service_date,
                escape_html(&item.description),
                item.duration,
                format_gbp(item.hourly_rate),
                format_gbp(item.amount),
            )
        })
        .collect();
    let pdf_link = if invoice.pdf_path.is_some() {
        format!(r#"<a href="/api/v1/invoices/{}/pdf">Download PDF</a>"#, invoice.id)
    } else {
        String::new()
    };
    format!(
        r#"<p>Number: {number}<br>Client: {client}<br>Issued: {date}<br>Total: {total}</p>
<table><thead><tr><th>Date</th><th>Description</th><th>Hours</th><th>Rate</th><th>Amount</th></tr></thead><tbody>{items}</tbody></table>
<p>{pdf_link}</p>
<form method="post" action="/invoices/{id}/send"><button type="submit">Generate PDF and email</button></form>"#,
        number = escape_html(&invoice.invoice_number),
        client = escape_html(&invoice.client_name),
        date = invoice.issue_date,
        total = format_gbp(invoice.total_amount),
        items = items,
        pdf_link = pdf_link,
        id = invoice.id,
    )
}

pub async fn invoice_page(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<InvoiceId>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    match state.invoices().get_detail(id).await {
        Ok(detail) => {
            let title = format!("Invoice {}", detail.invoice.invoice_number);
            page(&title, Some(&user), &flash, &invoice_detail_body(&detail)).into_response()
        }
        Err(err) => error_redirect("/invoices", &err),
    }
}

pub async fn send_invoice(
    State(state): State<AppState>,
    Path(id): Path<InvoiceId>,
) -> Response {
    let target = format!("/invoices/{}", id);
    match state.documents().save_pdf_and_send(id).await {
        Ok(invoice) => flash_redirect(
            &target,
            "success",
            &format!("Invoice {} sent", invoice.invoice_number),
        )
        .into_response(),
        Err(err) => error_redirect(&target, &err),
    }
}

pub async fn sellers_page(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    let sellers = match state.sellers().list(true).await {
        Ok(sellers) => sellers,
        Err(err) => return error_redirect("/invoices", &err),
    };
    let rows: String = sellers
        .iter()
        .map(|seller| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&seller.name),
                escape_html(&format!("{}, {} {}", seller.street, seller.postcode, seller.city)),
                escape_html(seller.line_label()),
                if seller.active { "Active" } else { "Inactive" },
            )
        })
        .collect();
    page(
        "Sellers",
        Some(&user),
        &flash,
        &format!(
            "<table><thead><tr><th>Name</th><th>Address</th><th>Service</th><th>Status</th></tr></thead><tbody>{}</tbody></table>",
            rows
        ),
    )
    .into_response()
}

pub async fn users_page(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    if !user.is_admin() {
        return flash_redirect("/invoices", "error", "Administrator role required").into_response();
    }
    let users = match state.users().list().await {
        Ok(users) => users,
        Err(err) => return error_redirect("/invoices", &err),
    };
    let rows: String = users
        .iter()
        .map(|row| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&row.username),
                escape_html(row.email.as_deref().unwrap_or("")),
                escape_html(&row.roles.join(", ")),
                if row.active { "Active" } else { "Inactive" },
            )
        })
        .collect();
    page(
        "Users",
        Some(&user),
        &flash,
        &format!(
            "<table><thead><tr><th>Username</th><th>Email</th><th>Roles</th><th>Status</th></tr></thead><tbody>{}</tbody></table>",
            rows
        ),
    )
    .into_response()
}
