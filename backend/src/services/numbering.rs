//! Invoice numbering: template parsing and rendering, plus the per-seller
//! counters that hand out sequence numbers.

use chrono::{Datelike, NaiveDate};
use sqlx::{PgConnection, PgPool};
use thiserror::Error;

use crate::error::AppError;
use crate::models::numbering::{
    CreateSchemeRequest, InvoiceNumberCounter, NumberingScheme, PreviewTemplateResponse,
    ResetPeriod,
};
use crate::repositories::{
    begin_transaction, commit_transaction, InvoiceRepository, NumberingRepository,
    Repository, SellerRepository,
};
use crate::types::{NumberingSchemeId, SellerId};

pub const DEFAULT_TEMPLATE: &str = "{SEQ:3}-{MM}-{YYYY}";
pub const DEFAULT_RESET_PERIOD: ResetPeriod = ResetPeriod::Monthly;
const MAX_TEMPLATE_LEN: usize = 64;
const MAX_SEQ_WIDTH: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template must not be empty")]
    Empty,
    #[error("template must be at most 64 characters")]
    TooLong,
    #[error("unbalanced braces in template")]
    UnbalancedBraces,
    #[error("unknown token {{{0}}}")]
    UnknownToken(String),
    #[error("template must contain exactly one {{SEQ:N}} token")]
    SequenceCount,
    #[error("sequence width must be between 1 and 10, got '{0}'")]
    InvalidSequenceWidth(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Seq(usize),
    Year4,
    Year2,
    Month2,
    Month1,
    Dept,
    DeptName,
}

/// Optional department used by `{DEPT}` / `{DEPT_NAME}`.
#[derive(Debug, Clone, Copy)]
pub struct Department<'a> {
    pub code: &'a str,
    pub name: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberTemplate {
    segments: Vec<Segment>,
}

impl NumberTemplate {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        if template.trim().is_empty() {
            return Err(TemplateError::Empty);
        }
        if template.chars().count() > MAX_TEMPLATE_LEN {
            return Err(TemplateError::TooLong);
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars();
        while let Some(ch) = chars.next() {
            match ch {
                '{' => {
                    let mut token = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        match inner {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(TemplateError::UnbalancedBraces),
                            other => token.push(other),
                        }
                    }
                    if !closed {
                        return Err(TemplateError::UnbalancedBraces);
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parse_token(&token)?);
                }
                '}' => return Err(TemplateError::UnbalancedBraces),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        let seq_count = segments
            .iter()
            .filter(|s| matches!(s, Segment::Seq(_)))
            .count();
        if seq_count != 1 {
            return Err(TemplateError::SequenceCount);
        }
        Ok(Self { segments })
    }

    pub fn render(&self, seq: i32, year: i32, month: u32, dept: Option<Department<'_>>) -> String {
        // Resolve each segment first so a missing department can swallow a
        // neighbouring separator.
        let mut parts: Vec<Option<String>> = self
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => Some(text.clone()),
                Segment::Seq(width) => Some(format!("{:0width$}", seq, width = *width)),
                Segment::Year4 => Some(format!("{:04}", year)),
                Segment::Year2 => Some((year % 100).to_string()),
                Segment::Month2 => Some(format!("{:02}", month)),
                Segment::Month1 => Some(month.to_string()),
                Segment::Dept => dept.map(|d| d.code.to_string()),
                Segment::DeptName => dept.map(|d| d.name.to_string()),
            })
            .collect();

        for idx in 0..parts.len() {
            if parts[idx].is_some() {
                continue;
            }
            let next_dash = parts
                .get_mut(idx + 1)
                .and_then(|p| p.as_mut())
                .filter(|text| text.starts_with('-'));
            if let Some(text) = next_dash {
                text.remove(0);
                continue;
            }
            if idx > 0 {
                if let Some(text) = parts[idx - 1].as_mut().filter(|t| t.ends_with('-')) {
                    text.pop();
                }
            }
        }

        parts.into_iter().flatten().collect()
    }
}

fn parse_token(token: &str) -> Result<Segment, TemplateError> {
    match token {
        "YYYY" => Ok(Segment::Year4),
        "YY" => Ok(Segment::Year2),
        "MM" => Ok(Segment::Month2),
        "M" => Ok(Segment::Month1),
        "DEPT" => Ok(Segment::Dept),
        "DEPT_NAME" => Ok(Segment::DeptName),
        other => match other.strip_prefix("SEQ:") {
            Some(width) => width
                .parse::<usize>()
                .ok()
                .filter(|w| (1..=MAX_SEQ_WIDTH).contains(w))
                .map(Segment::Seq)
                .ok_or_else(|| TemplateError::InvalidSequenceWidth(width.to_string())),
            None => Err(TemplateError::UnknownToken(other.to_string())),
        },
    }
}

/// Renders `template` for sequence 1 in February 2026 with no department.
pub fn preview(template: &str) -> Result<String, TemplateError> {
    Ok(NumberTemplate::parse(template)?.render(1, 2026, 2, None))
}

/// Scheme in force for a seller on a date, or the built-in default.
#[derive(Debug, Clone)]
pub struct EffectiveScheme {
    pub scheme_id: Option<NumberingSchemeId>,
    pub template: NumberTemplate,
    pub reset_period: ResetPeriod,
}

impl EffectiveScheme {
    fn builtin() -> Result<Self, AppError> {
        Ok(Self {
            scheme_id: None,
            template: NumberTemplate::parse(DEFAULT_TEMPLATE)?,
            reset_period: DEFAULT_RESET_PERIOD,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedNumber {
    pub invoice_number: String,
    pub sequence_number: i32,
    pub period_year: i32,
    pub period_month: i32,
    pub scheme_id: Option<NumberingSchemeId>,
}

#[derive(Clone)]
pub struct NumberingService {
    pool: PgPool,
    schemes: NumberingRepository,
    invoices: InvoiceRepository,
    sellers: SellerRepository,
}

impl NumberingService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schemes: NumberingRepository::new(),
            invoices: InvoiceRepository::new(),
            sellers: SellerRepository::new(),
        }
    }

    pub async fn effective_scheme(
        &self,
        conn: &mut PgConnection,
        seller_id: SellerId,
        issue_date: NaiveDate,
    ) -> Result<EffectiveScheme, AppError> {
        match self.schemes.find_effective(conn, seller_id, issue_date).await? {
            Some(scheme) => Ok(EffectiveScheme {
                scheme_id: Some(scheme.id),
                template: NumberTemplate::parse(&scheme.template)?,
                reset_period: scheme.reset_period,
            }),
            None => EffectiveScheme::builtin(),
        }
    }

    /// Takes the next number for `seller_id` on `issue_date`. Must run inside
    /// the transaction that writes the invoice.
    pub async fn next_number(
        &self,
        conn: &mut PgConnection,
        seller_id: SellerId,
        issue_date: NaiveDate,
    ) -> Result<GeneratedNumber, AppError> {
        let scheme = self.effective_scheme(&mut *conn, seller_id, issue_date).await?;
        let (year, month) = (issue_date.year(), issue_date.month());
        let (period_year, period_month) = scheme.reset_period.period_components(year, month);
        let period_key = scheme.reset_period.period_key(year, month);

        // Heal drift: the counter must never trail numbers already issued.
        let issued_max = self
            .invoices
            .max_sequence(&mut *conn, seller_id, period_year, period_month)
            .await?;
        if issued_max > 0 {
            self.schemes
                .raise_to_at_least(&mut *conn, seller_id, scheme.reset_period, &period_key, issued_max)
                .await?;
        }

        let sequence = self
            .schemes
            .increment(&mut *conn, seller_id, scheme.reset_period, &period_key)
            .await?;

        Ok(GeneratedNumber {
            invoice_number: scheme.template.render(sequence, year, month, None),
            sequence_number: sequence,
            period_year,
            period_month,
            scheme_id: scheme.scheme_id,
        })
    }

    /// Number the next invoice would get, without consuming it.
    pub async fn peek_number(
        &self,
        conn: &mut PgConnection,
        seller_id: SellerId,
        issue_date: NaiveDate,
    ) -> Result<GeneratedNumber, AppError> {
        let scheme = self.effective_scheme(&mut *conn, seller_id, issue_date).await?;
        let (year, month) = (issue_date.year(), issue_date.month());
        let (period_year, period_month) = scheme.reset_period.period_components(year, month);
        let period_key = scheme.reset_period.period_key(year, month);

        let counter = self
            .schemes
            .current_value(&mut *conn, seller_id, scheme.reset_period, &period_key)
            .await?
            .unwrap_or(0);
        let issued_max = self
            .invoices
            .max_sequence(&mut *conn, seller_id, period_year, period_month)
            .await?;
        let sequence = counter.max(issued_max) + 1;

        Ok(GeneratedNumber {
            invoice_number: scheme.template.render(sequence, year, month, None),
            sequence_number: sequence,
            period_year,
            period_month,
            scheme_id: scheme.scheme_id,
        })
    }

    pub async fn list_schemes(
        &self,
        seller_id: Option<SellerId>,
        active_only: bool,
    ) -> Result<Vec<NumberingScheme>, AppError> {
        self.schemes
            .list_schemes(&self.pool, seller_id, active_only)
            .await
    }

    /// Validates the template, supersedes any ACTIVE scheme with the same
    /// `effective_from`, and stores the new one under the next version.
    pub async fn create_scheme(
        &self,
        req: &CreateSchemeRequest,
    ) -> Result<NumberingScheme, AppError> {
        NumberTemplate::parse(&req.template)?;
        self.sellers.find_by_id(&self.pool, req.seller_id).await?;

        let mut tx = begin_transaction(&self.pool).await?;
        let version = self
            .schemes
            .next_version(&mut tx, req.seller_id, req.effective_from)
            .await?;
        let archived = self
            .schemes
            .archive_active_for_date(&mut tx, req.seller_id, req.effective_from)
            .await?;
        let scheme = self
            .schemes
            .insert_scheme(
                &mut tx,
                req.seller_id,
                req.template.trim(),
                req.reset_period,
                req.effective_from,
                version,
            )
            .await?;
        commit_transaction(tx).await?;

        tracing::info!(
            seller_id = %req.seller_id,
            scheme_id = %scheme.id,
            version,
            archived,
            "Numbering scheme created"
        );
        Ok(scheme)
    }

    pub async fn archive_scheme(&self, id: NumberingSchemeId) -> Result<(), AppError> {
        self.schemes.archive_scheme(&self.pool, id).await
    }

    pub fn preview(&self, template: &str) -> Result<PreviewTemplateResponse, AppError> {
        Ok(PreviewTemplateResponse {
            template: template.to_string(),
            preview: preview(template)?,
        })
    }

    pub async fn list_counters(
        &self,
        seller_id: SellerId,
    ) -> Result<Vec<InvoiceNumberCounter>, AppError> {
        self.schemes.list_counters(&self.pool, seller_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_renders_zero_padded() {
        let template = NumberTemplate::parse(DEFAULT_TEMPLATE).unwrap();
        assert_eq!(template.render(7, 2026, 3, None), "007-03-2026");
        assert_eq!(template.render(1234, 2026, 12, None), "1234-12-2026");
    }

    #[test]
    fn all_date_tokens_render() {
        let template = NumberTemplate::parse("INV/{YY}/{M}/{SEQ:5}").unwrap();
        assert_eq!(template.render(42, 2026, 2, None), "INV/26/2/00042");
        // {YY} is year % 100 without padding.
        assert_eq!(template.render(1, 2005, 11, None), "INV/5/11/00001");
    }

    #[test]
    fn preview_uses_fixed_sample_values() {
        assert_eq!(preview("{YYYY}-{MM}-{SEQ:4}").unwrap(), "2026-02-0001");
    }

    #[test]
    fn missing_department_removes_one_adjacent_dash() {
        let template = NumberTemplate::parse("{DEPT}-{SEQ:3}-{YYYY}").unwrap();
        assert_eq!(template.render(1, 2026, 1, None), "001-2026");
        assert_eq!(
            template.render(
                1,
                2026,
                1,
                Some(Department {
                    code: "CL",
                    name: "Cleaning"
                })
            ),
            "CL-001-2026"
        );

        let trailing = NumberTemplate::parse("{SEQ:3}-{DEPT_NAME}").unwrap();
        assert_eq!(trailing.render(9, 2026, 1, None), "009");
    }

    #[test]
    fn rejects_invalid_templates() {
        assert_eq!(NumberTemplate::parse("  "), Err(TemplateError::Empty));
        assert_eq!(
            NumberTemplate::parse("{YYYY}-{MM}"),
            Err(TemplateError::SequenceCount)
        );
        assert_eq!(
            NumberTemplate::parse("{SEQ:2}-{SEQ:3}"),
            Err(TemplateError::SequenceCount)
        );
        assert_eq!(
            NumberTemplate::parse("{SEQ:0}"),
            Err(TemplateError::InvalidSequenceWidth("0".into()))
        );
        assert_eq!(
            NumberTemplate::parse("{SEQ:11}"),
            Err(TemplateError::InvalidSequenceWidth("11".into()))
        );
        assert_eq!(
            NumberTemplate::parse("{SEQ:3}-{DD}"),
            Err(TemplateError::UnknownToken("DD".into()))
        );
        assert_eq!(
            NumberTemplate::parse("{SEQ:3"),
            Err(TemplateError::UnbalancedBraces)
        );
        assert_eq!(
            NumberTemplate::parse("SEQ:3}"),
            Err(TemplateError::UnbalancedBraces)
        );
        let long = format!("{{SEQ:3}}{}", "x".repeat(60));
        assert_eq!(NumberTemplate::parse(&long), Err(TemplateError::TooLong));
    }
}
