//! Invoice PDF rendering (A4, builtin Helvetica).

use anyhow::{anyhow, Result};
use printpdf::{
    BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point,
};
use rust_decimal::Decimal;

use crate::models::client::Client;
use crate::models::invoice::{Invoice, InvoiceItem};
use crate::models::seller::Seller;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN_LEFT: f32 = 15.0;
const MARGIN_RIGHT: f32 = 195.0;
const BOTTOM_LIMIT: f32 = 40.0;
const ROW_HEIGHT: f32 = 6.0;

const X_DATE: f32 = 15.0;
const X_DESC: f32 = 42.0;
const X_HOURS: f32 = 128.0;
const X_RATE: f32 = 148.0;
const X_AMOUNT: f32 = 172.0;

/// Everything printed on one invoice.
pub struct InvoiceDocument<'a> {
    pub invoice: &'a Invoice,
    pub items: &'a [InvoiceItem],
    pub client: &'a Client,
    pub seller: &'a Seller,
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

/// Builtin fonts carry no pound glyph, so amounts print with an ISO prefix.
fn pdf_money(value: Decimal) -> String {
    crate::utils::money::format_gbp(value).replacen('£', "GBP ", 1)
}

fn text(layer: &PdfLayerReference, font: &IndirectFontRef, value: &str, size: f32, x: f32, y: f32) {
    layer.use_text(value, size, Mm(x), Mm(y), font);
}

fn rule(layer: &PdfLayerReference, y: f32) {
    layer.add_line(Line {
        points: vec![
            (Point::new(Mm(MARGIN_LEFT), Mm(y)), false),
            (Point::new(Mm(MARGIN_RIGHT), Mm(y)), false),
        ],
        is_closed: false,
    });
}

fn table_header(layer: &PdfLayerReference, fonts: &Fonts, y: f32) -> f32 {
    text(layer, &fonts.bold, "Date", 10.0, X_DATE, y);
    text(layer, &fonts.bold, "Description", 10.0, X_DESC, y);
    text(layer, &fonts.bold, "Hours", 10.0, X_HOURS, y);
    text(layer, &fonts.bold, "Rate", 10.0, X_RATE, y);
    text(layer, &fonts.bold, "Amount", 10.0, X_AMOUNT, y);
    let y = y - 3.5;
    rule(layer, y);
    y - 7.0
}

fn new_page(doc: &PdfDocumentReference, index: usize) -> PdfLayerReference {
    let (page, layer) = doc.add_page(
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        format!("Layer {}", index),
    );
    doc.get_page(page).get_layer(layer)
}

pub fn render_invoice_pdf(document: &InvoiceDocument<'_>) -> Result<Vec<u8>> {
    let InvoiceDocument {
        invoice,
        items,
        client,
        seller,
    } = document;

    let (doc, page1, layer1) = PdfDocument::new(
        format!("Invoice {}", invoice.invoice_number),
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "Layer 1",
    );
    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| anyhow!("font: {}", e))?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| anyhow!("font: {}", e))?,
    };
    let mut layer = doc.get_page(page1).get_layer(layer1);

    // Seller block (left) and title (right)
    let mut y: f32 = 285.0;
    text(&layer, &fonts.bold, &seller.name, 16.0, MARGIN_LEFT, y);
    for line in [
        seller.street.as_str(),
        &format!("{} {}", seller.city, seller.postcode),
    ] {
        y -= 5.5;
        text(&layer, &fonts.regular, line, 10.0, MARGIN_LEFT, y);
    }
    for optional in [
        seller.email.as_deref().map(|v| format!("Email: {}", v)),
        seller.phone.as_deref().map(|v| format!("Phone: {}", v)),
        seller
            .company_registration_number
            .as_deref()
            .map(|v| format!("Company No: {}", v)),
        seller.vat_number.as_deref().map(|v| format!("VAT: {}", v)),
    ]
    .into_iter()
    .flatten()
    {
        y -= 5.0;
        text(&layer, &fonts.regular, &optional, 9.0, MARGIN_LEFT, y);
    }

    text(&layer, &fonts.bold, "INVOICE", 24.0, 145.0, 285.0);
    text(&layer, &fonts.bold, &invoice.invoice_number, 12.0, 145.0, 277.0);
    text(
        &layer,
        &fonts.regular,
        &format!("Issue date: {}", invoice.issue_date.format("%d/%m/%Y")),
        10.0,
        145.0,
        271.0,
    );

    y = y.min(255.0) - 4.0;
    rule(&layer, y);

    // Bill to
    y -= 9.0;
    text(&layer, &fonts.bold, "Bill to:", 12.0, MARGIN_LEFT, y);
    y -= 6.0;
    text(&layer, &fonts.regular, &client.name, 10.0, MARGIN_LEFT, y);
    for line in client.address_lines() {
        y -= 5.0;
        text(&layer, &fonts.regular, &line, 10.0, MARGIN_LEFT, y);
    }

    y -= 12.0;
    y = table_header(&layer, &fonts, y);

    let mut page_index = 1;
    for item in items.iter() {
        if y < BOTTOM_LIMIT {
            page_index += 1;
            layer = new_page(&doc, page_index);
            y = table_header(&layer, &fonts, 280.0);
        }
        text(
            &layer,
            &fonts.regular,
            &item.service_date.format("%d/%m/%Y").to_string(),
            10.0,
            X_DATE,
            y,
        );
        text(&layer, &fonts.regular, &item.description, 10.0, X_DESC, y);
        text(&layer, &fonts.regular, &format!("{:.2}", item.duration), 10.0, X_HOURS, y);
        text(&layer, &fonts.regular, &pdf_money(item.hourly_rate), 10.0, X_RATE, y);
        text(&layer, &fonts.bold, &pdf_money(item.amount), 10.0, X_AMOUNT, y);
        y -= ROW_HEIGHT;
    }

    if y < BOTTOM_LIMIT {
        page_index += 1;
        layer = new_page(&doc, page_index);
        y = 280.0;
    }
    y -= 4.0;
    rule(&layer, y);
    y -= 10.0;
    text(&layer, &fonts.bold, "TOTAL:", 13.0, 140.0, y);
    text(&layer, &fonts.bold, &pdf_money(invoice.total_amount), 13.0, 165.0, y);

    if seller.has_bank_details() {
        y -= 16.0;
        text(&layer, &fonts.bold, "Payment details", 11.0, MARGIN_LEFT, y);
        for (label, value) in [
            ("Bank", &seller.bank_name),
            ("Account number", &seller.account_number),
            ("Sort code", &seller.sort_code),
        ] {
            if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                y -= 5.5;
                text(
                    &layer,
                    &fonts.regular,
                    &format!("{}: {}", label, value),
                    10.0,
                    MARGIN_LEFT,
                    y,
                );
            }
        }
        y -= 5.5;
        text(
            &layer,
            &fonts.regular,
            &format!("Reference: {}", invoice.invoice_number),
            10.0,
            MARGIN_LEFT,
            y,
        );
    }

    text(
        &layer,
        &fonts.regular,
        "Thank you for your business.",
        9.0,
        MARGIN_LEFT,
        12.0,
    );

    let mut writer = std::io::BufWriter::new(Vec::<u8>::new());
    doc.save(&mut writer).map_err(|e| anyhow!("pdf save: {}", e))?;
    writer
        .into_inner()
        .map_err(|e| anyhow!("pdf buffer: {}", e))
}
