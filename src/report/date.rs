use crate::report::error::ReportError;
use crate::report::grammar::{ReportGrammar, UNKNOWN_DAY};
use chrono::{DateTime, Datelike, FixedOffset, Month, NaiveDate};
use tracing::warn;

const TRANSPORT_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDay {
    pub date: NaiveDate,
    pub day: String,
}

/// Resolves the report date from the subject line and the `Date` header.
///
/// Reports sent after local midnight carry the previous day in their subject;
/// when the two days of month disagree the header date is moved back one day.
pub fn resolve_date(
    grammar: &ReportGrammar,
    subject: &str,
    transport_date: &str,
) -> Result<ReportDay, ReportError> {
    let sent_at = parse_transport_date(transport_date)?;
    let captures = grammar
        .subject
        .captures(subject)
        .ok_or_else(|| ReportError::DateResolution {
            reason: format!("subject does not match report template: {subject:?}"),
        })?;

    let subject_day = captures[3]
        .parse::<u32>()
        .map_err(|error| ReportError::DateResolution {
            reason: format!("invalid day of month in subject {subject:?}: {error}"),
        })?;

    let sent_date = sent_at.date_naive();
    let date = if sent_date.day() == subject_day {
        sent_date
    } else {
        sent_date
            .pred_opt()
            .ok_or_else(|| ReportError::DateResolution {
                reason: format!("no calendar day precedes {sent_date}"),
            })?
    };

    Ok(ReportDay {
        date,
        day: captures[1].to_string(),
    })
}

pub fn resolve_date_or_fallback(
    grammar: &ReportGrammar,
    subject: &str,
    transport_date: &str,
    today: NaiveDate,
) -> ReportDay {
    resolve_date(grammar, subject, transport_date).unwrap_or_else(|error| {
        warn!(error = %error, subject, "falling back to subject-only report date");

        date_from_subject(grammar, subject, today.year()).unwrap_or_else(|| ReportDay {
            date: today,
            day: UNKNOWN_DAY.to_string(),
        })
    })
}

fn date_from_subject(grammar: &ReportGrammar, subject: &str, year: i32) -> Option<ReportDay> {
    let captures = grammar.subject.captures(subject)?;
    let month = captures[2].parse::<Month>().ok()?;
    let day = captures[3].parse::<u32>().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month.number_from_month(), day)?;

    Some(ReportDay {
        date,
        day: captures[1].to_string(),
    })
}

fn parse_transport_date(raw: &str) -> Result<DateTime<FixedOffset>, ReportError> {
    // Drop trailing comments such as " (UTC)".
    let trimmed = raw.split(" (").next().unwrap_or(raw).trim();

    DateTime::parse_from_str(trimmed, TRANSPORT_DATE_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc2822(trimmed))
        .map_err(|error| ReportError::DateResolution {
            reason: format!("unrecognized date header {raw:?}: {error}"),
        })
}

#[cfg(test)]
mod tests {
    use super::{resolve_date, resolve_date_or_fallback};
    use crate::report::grammar::ReportGrammar;
    use chrono::NaiveDate;

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn matching_day_uses_header_date() {
        let grammar = ReportGrammar::new().expect("grammar");
        let resolved = resolve_date(
            &grammar,
            "Your Daily Report for Tuesday, January 9",
            "Tue, 09 Jan 2024 23:10:00 -0800",
        )
        .expect("resolved");

        assert_eq!(resolved.date, ymd(2024, 1, 9));
        assert_eq!(resolved.day, "Tuesday");
    }

    #[test]
    fn report_delivered_after_midnight_moves_back_one_day() {
        let grammar = ReportGrammar::new().expect("grammar");
        let resolved = resolve_date(
            &grammar,
            "Your Daily Report for Tuesday, January 9",
            "Wed, 10 Jan 2024 00:30:00 +0000",
        )
        .expect("resolved");

        assert_eq!(resolved.date.format("%Y-%m-%d").to_string(), "2024-01-09");
        assert_eq!(resolved.day, "Tuesday");
    }

    #[test]
    fn header_comment_and_unpadded_day_are_accepted() {
        let grammar = ReportGrammar::new().expect("grammar");
        let resolved = resolve_date(
            &grammar,
            "Your Daily Report for Monday, March 4",
            "Mon, 4 Mar 2024 21:00:00 +0000 (UTC)",
        )
        .expect("resolved");

        assert_eq!(resolved.date, ymd(2024, 3, 4));
    }

    #[test]
    fn unparseable_header_falls_back_to_subject_with_current_year() {
        let grammar = ReportGrammar::new().expect("grammar");
        let resolved = resolve_date_or_fallback(
            &grammar,
            "Your Daily Report for Friday, June 7",
            "yesterday-ish",
            ymd(2025, 8, 1),
        );

        assert_eq!(resolved.date, ymd(2025, 6, 7));
        assert_eq!(resolved.day, "Friday");
    }

    #[test]
    fn unknown_subject_falls_back_to_today() {
        let grammar = ReportGrammar::new().expect("grammar");
        let today = ymd(2025, 8, 1);
        let resolved = resolve_date_or_fallback(
            &grammar,
            "Weekly digest",
            "Fri, 01 Aug 2025 08:00:00 +0000",
            today,
        );

        assert_eq!(resolved.date, today);
        assert_eq!(resolved.day, "Unknown");
    }
}
