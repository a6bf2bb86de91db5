#![allow(dead_code)] // OpenAPI doc stubs are only referenced by utoipa macros.

use crate::models::{
    client::{Client, ClientRequest},
    email_tracking::{TrackingHealth, TrackingStats},
    invoice::{
        CreateInvoiceRequest, GenerateMonthlyRequest, Invoice, InvoiceDetail, InvoiceItem,
        InvoiceItemDraft, InvoicePreview, InvoiceReport, UpdateInvoiceItemRequest,
        UpdateInvoiceRequest,
    },
    invoicing::{
        ClientBillingError, InvoiceProcessingResult, InvoicingSummary, MonthlyGenerationResponse,
    },
    numbering::{
        CreateSchemeRequest, InvoiceNumberCounter, NumberingScheme, PreviewTemplateRequest,
        PreviewTemplateResponse, ResetPeriod, SchemeStatus,
    },
    password_reset::{ForgotPasswordRequest, ResetPasswordRequest, ValidateTokenResponse},
    seller::{Seller, SellerRequest},
    timesheet::{CreateTimesheetRequest, PaymentRequest, Timesheet, UpdateTimesheetRequest},
    user::{
        ChangePasswordRequest, CreateUserRequest, DefaultSellerRequest, LoginRequest,
        LoginResponse, UpdateRolesRequest, UpdateUserRequest, UserResponse,
    },
    MessageResponse,
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        login_doc,
        me_doc,
        change_password_doc,
        forgot_password_doc,
        validate_reset_token_doc,
        reset_password_doc,
        list_clients_doc,
        create_client_doc,
        update_client_doc,
        deactivate_client_doc,
        list_timesheets_doc,
        create_timesheet_doc,
        update_timesheet_doc,
        detach_timesheet_doc,
        record_payment_doc,
        unbilled_timesheets_doc,
        list_invoices_doc,
        get_invoice_doc,
        create_invoice_doc,
        preview_invoice_doc,
        update_invoice_doc,
        delete_invoice_doc,
        invoice_pdf_doc,
        send_invoice_doc,
        invoice_report_doc,
        generate_monthly_doc,
        list_sellers_doc,
        create_seller_doc,
        list_users_doc,
        create_user_doc,
        update_roles_doc,
        admin_reset_password_doc,
        list_schemes_doc,
        create_scheme_doc,
        preview_template_doc,
        list_counters_doc,
        tracking_stats_doc,
        tracking_health_doc,
        run_invoicing_doc
    ),
    components(
        schemas(
            // auth
            LoginRequest,
            LoginResponse,
            ChangePasswordRequest,
            ForgotPasswordRequest,
            ResetPasswordRequest,
            ValidateTokenResponse,
            MessageResponse,
            // users
            CreateUserRequest,
            UpdateUserRequest,
            UpdateRolesRequest,
            DefaultSellerRequest,
            UserResponse,
            // billing data
            Client,
            ClientRequest,
            Seller,
            SellerRequest,
            Timesheet,
            CreateTimesheetRequest,
            UpdateTimesheetRequest,
            PaymentRequest,
            // invoices
            Invoice,
            InvoiceItem,
            InvoiceItemDraft,
            InvoiceDetail,
            InvoicePreview,
            InvoiceReport,
            CreateInvoiceRequest,
            UpdateInvoiceRequest,
            UpdateInvoiceItemRequest,
            GenerateMonthlyRequest,
            InvoicingSummary,
            InvoiceProcessingResult,
            MonthlyGenerationResponse,
            ClientBillingError,
            // numbering
            NumberingScheme,
            InvoiceNumberCounter,
            CreateSchemeRequest,
            PreviewTemplateRequest,
            PreviewTemplateResponse,
            ResetPeriod,
            SchemeStatus,
            // tracking
            TrackingStats,
            TrackingHealth
        )
    ),
    modifiers(&SecuritySchemes),
    tags(
        (name = "Auth", description = "Login, password change and password reset"),
        (name = "Billing", description = "Clients, sellers and timesheets"),
        (name = "Invoices", description = "Invoice lifecycle, PDFs and reports"),
        (name = "Tracking", description = "Email-open tracking"),
        (name = "Admin", description = "Administrator API")
    ),
    security(("BearerAuth" = []))
)]
pub struct ApiDoc;

struct SecuritySchemes;

impl Modify for SecuritySchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();

        let mut bearer = Http::new(HttpAuthScheme::Bearer);
        bearer.bearer_format = Some("JWT".to_string());

        components.add_security_scheme("BearerAuth", SecurityScheme::Http(bearer));
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Bad credentials or inactive user"),
        (status = 429, description = "Too many attempts")
    ),
    tag = "Auth",
    security(())
)]
fn login_doc() {}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses((status = 200, description = "Current user", body = UserResponse)),
    tag = "Auth"
)]
fn me_doc() {}

#[utoipa::path(
    put,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    responses((status = 200, description = "New token for the bumped token version", body = serde_json::Value)),
    tag = "Auth"
)]
fn change_password_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Same answer whether or not the email exists", body = MessageResponse),
        (status = 429, description = "Rate limited")
    ),
    tag = "Auth",
    security(())
)]
fn forgot_password_doc() {}

#[utoipa::path(
    get,
    path = "/api/auth/reset-password/validate",
    params(("token" = String, Query, description = "Reset token")),
    responses((status = 200, body = ValidateTokenResponse)),
    tag = "Auth",
    security(())
)]
fn validate_reset_token_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, body = MessageResponse),
        (status = 404, description = "Unknown or expired token"),
        (status = 409, description = "Token already used")
    ),
    tag = "Auth",
    security(())
)]
fn reset_password_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/clients",
    params(("include_inactive" = Option<bool>, Query, description = "Include deactivated clients")),
    responses((status = 200, body = [Client])),
    tag = "Billing"
)]
fn list_clients_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/clients",
    request_body = ClientRequest,
    responses((status = 201, body = Client), (status = 409, description = "Name already exists")),
    tag = "Billing"
)]
fn create_client_doc() {}

#[utoipa::path(
    put,
    path = "/api/v1/clients/{id}",
    params(("id" = String, Path, description = "Client id")),
    request_body = ClientRequest,
    responses((status = 200, body = Client)),
    tag = "Billing"
)]
fn update_client_doc() {}

#[utoipa::path(
    delete,
    path = "/api/v1/clients/{id}",
    params(("id" = String, Path, description = "Client id")),
    responses((status = 204, description = "Deactivated")),
    tag = "Billing"
)]
fn deactivate_client_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/timesheets/all",
    responses((status = 200, body = [Timesheet])),
    tag = "Billing"
)]
fn list_timesheets_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/timesheets",
    request_body = CreateTimesheetRequest,
    responses((status = 201, body = Timesheet), (status = 400, description = "Invalid duration or rate")),
    tag = "Billing"
)]
fn create_timesheet_doc() {}

#[utoipa::path(
    put,
    path = "/api/v1/timesheets/{id}",
    params(("id" = String, Path, description = "Timesheet id")),
    request_body = UpdateTimesheetRequest,
    responses((status = 200, body = Timesheet), (status = 422, description = "Timesheet already invoiced")),
    tag = "Billing"
)]
fn update_timesheet_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/timesheets/{id}/detach",
    params(("id" = String, Path, description = "Timesheet id")),
    responses((status = 200, body = Timesheet)),
    tag = "Billing"
)]
fn detach_timesheet_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/timesheets/{id}/payment",
    params(("id" = String, Path, description = "Timesheet id")),
    request_body = Option<PaymentRequest>,
    responses((status = 200, body = Timesheet)),
    tag = "Billing"
)]
fn record_payment_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/timesheets/unbilled",
    responses((status = 200, body = [Timesheet])),
    tag = "Billing"
)]
fn unbilled_timesheets_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/invoices",
    params(
        ("client_id" = Option<String>, Query, description = "Client filter"),
        ("year" = Option<i32>, Query, description = "Issue year"),
        ("month" = Option<u32>, Query, description = "Issue month"),
        ("limit" = Option<i64>, Query, description = "Page size"),
        ("offset" = Option<i64>, Query, description = "Rows to skip")
    ),
    responses((status = 200, description = "Paginated invoices", body = serde_json::Value)),
    tag = "Invoices"
)]
fn list_invoices_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/invoices/{id}",
    params(("id" = String, Path, description = "Invoice id")),
    responses((status = 200, body = InvoiceDetail), (status = 404, description = "Unknown invoice")),
    tag = "Invoices"
)]
fn get_invoice_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/invoices",
    request_body = CreateInvoiceRequest,
    responses(
        (status = 201, body = InvoiceDetail),
        (status = 409, description = "A timesheet is already invoiced")
    ),
    tag = "Invoices"
)]
fn create_invoice_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/invoices/preview",
    request_body = CreateInvoiceRequest,
    responses((status = 200, body = InvoicePreview)),
    tag = "Invoices"
)]
fn preview_invoice_doc() {}

#[utoipa::path(
    put,
    path = "/api/v1/invoices/{id}",
    params(("id" = String, Path, description = "Invoice id")),
    request_body = UpdateInvoiceRequest,
    responses((status = 200, body = InvoiceDetail)),
    tag = "Invoices"
)]
fn update_invoice_doc() {}

#[utoipa::path(
    delete,
    path = "/api/v1/invoices/{id}",
    params(
        ("id" = String, Path, description = "Invoice id"),
        ("delete_timesheets" = Option<bool>, Query, description = "Delete the billed timesheets instead of releasing them")
    ),
    responses((status = 204, description = "Deleted")),
    tag = "Invoices"
)]
fn delete_invoice_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/invoices/{id}/pdf",
    params(("id" = String, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "PDF document", content_type = "application/pdf"),
        (status = 404, description = "No PDF generated yet")
    ),
    tag = "Invoices"
)]
fn invoice_pdf_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/invoices/{id}/send",
    params(("id" = String, Path, description = "Invoice id")),
    responses((status = 200, body = Invoice), (status = 502, description = "Mail or storage failure")),
    tag = "Admin"
)]
fn send_invoice_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/invoices/report",
    params(
        ("client_id" = Option<String>, Query, description = "Client filter"),
        ("from_year" = Option<i32>, Query, description = "First month of the window"),
        ("from_month" = Option<u32>, Query, description = "First month of the window"),
        ("to_year" = Option<i32>, Query, description = "Last month of the window"),
        ("to_month" = Option<u32>, Query, description = "Last month of the window")
    ),
    responses((status = 200, body = InvoiceReport)),
    tag = "Invoices"
)]
fn invoice_report_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/invoices/monthly/generate",
    request_body = GenerateMonthlyRequest,
    responses((status = 201, body = MonthlyGenerationResponse)),
    tag = "Admin"
)]
fn generate_monthly_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/sellers",
    params(("include_inactive" = Option<bool>, Query, description = "Include deactivated sellers")),
    responses((status = 200, body = [Seller])),
    tag = "Billing"
)]
fn list_sellers_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/sellers",
    request_body = SellerRequest,
    responses((status = 201, body = Seller)),
    tag = "Billing"
)]
fn create_seller_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    responses((status = 200, body = [UserResponse])),
    tag = "Admin"
)]
fn list_users_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses((status = 201, body = UserResponse), (status = 409, description = "Username taken")),
    tag = "Admin"
)]
fn create_user_doc() {}

#[utoipa::path(
    put,
    path = "/api/v1/users/{id}/roles",
    params(("id" = String, Path, description = "User id")),
    request_body = UpdateRolesRequest,
    responses((status = 200, body = UserResponse)),
    tag = "Admin"
)]
fn update_roles_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/admin/users/{id}/reset-password",
    params(("id" = String, Path, description = "User id")),
    responses((status = 200, body = MessageResponse)),
    tag = "Admin"
)]
fn admin_reset_password_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/invoice-numbering-schemes",
    params(("seller_id" = Option<String>, Query, description = "Seller filter")),
    responses((status = 200, body = [NumberingScheme])),
    tag = "Admin"
)]
fn list_schemes_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/invoice-numbering-schemes",
    request_body = CreateSchemeRequest,
    responses((status = 201, body = NumberingScheme), (status = 400, description = "Invalid template")),
    tag = "Admin"
)]
fn create_scheme_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/invoice-numbering-schemes/preview",
    request_body = PreviewTemplateRequest,
    responses((status = 200, body = PreviewTemplateResponse)),
    tag = "Admin"
)]
fn preview_template_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/admin/invoice-counters",
    params(("seller_id" = Option<String>, Query, description = "Seller filter")),
    responses((status = 200, body = [InvoiceNumberCounter])),
    tag = "Admin"
)]
fn list_counters_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/tracking/stats",
    responses((status = 200, body = TrackingStats)),
    tag = "Tracking"
)]
fn tracking_stats_doc() {}

#[utoipa::path(
    get,
    path = "/api/track/health",
    responses((status = 200, body = TrackingHealth)),
    tag = "Tracking",
    security(())
)]
fn tracking_health_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/admin/scheduler/invoicing/run",
    request_body = Option<GenerateMonthlyRequest>,
    responses((status = 200, body = InvoicingSummary)),
    tag = "Admin"
)]
fn run_invoicing_doc() {}
