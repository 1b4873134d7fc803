use crate::report::error::ReportError;

/// Parses "2 hr 15 min", "45 min" or "3 hr" into fractional hours.
pub fn parse_duration(text: &str) -> Result<f64, ReportError> {
    let malformed = || ReportError::MalformedDuration {
        input: text.to_string(),
    };

    let numbers = text
        .split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u64>().map_err(|_| malformed()))
        .collect::<Result<Vec<_>, _>>()?;

    let hours_only = text.contains("hr") && !text.contains("min");

    let (hours, minutes) = match numbers.as_slice() {
        [hours, minutes] => (*hours, *minutes),
        [value] if hours_only => (*value, 0),
        [minutes] => (0, *minutes),
        _ => return Err(malformed()),
    };

    Ok(round_hours(hours as f64 + minutes as f64 / 60.0))
}

pub fn format_duration(hours: f64) -> String {
    let hours = if hours.is_finite() { hours.max(0.0) } else { 0.0 };
    let mut whole = hours.trunc() as u64;
    let mut minutes = ((hours - hours.trunc()) * 60.0).round() as u64;

    if minutes == 60 {
        whole += 1;
        minutes = 0;
    }

    match (whole, minutes) {
        (0, minutes) => format!("{minutes} min"),
        (whole, 0) => format!("{whole} hr"),
        (whole, minutes) => format!("{whole} hr {minutes} min"),
    }
}

pub fn round_hours(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
