use crate::config::Config;
use crate::report::RawReport;
use crate::report::normalize::to_crlf;
use anyhow::{Context, Result, bail};
use mail_parser::MessageParser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const MAILDIR_SUBDIRS: [&str; 2] = ["cur", "new"];

pub trait MailSource {
    fn fetch(&self, limit: usize) -> Result<Vec<RawReport>>;
}

#[derive(Debug, Clone)]
pub struct MaildirSource {
    dir: PathBuf,
    sender_filter: Option<String>,
    subject_prefix: String,
}

#[derive(Debug)]
struct ParsedMessage {
    report: RawReport,
    from: Option<String>,
    sent_at: i64,
}

impl MaildirSource {
    pub fn new(dir: PathBuf, sender_filter: Option<String>, subject_prefix: String) -> Self {
        Self {
            dir,
            sender_filter,
            subject_prefix,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.mail_dir.clone(),
            config.sender_filter.clone(),
            config.subject_prefix.clone(),
        )
    }

    fn message_paths(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            bail!("Mail directory not found: {}", self.dir.display());
        }

        // Maildir folders hold messages without an extension.
        let directories = std::iter::once((self.dir.clone(), true))
            .chain(
                MAILDIR_SUBDIRS
                    .iter()
                    .map(|name| (self.dir.join(name), false)),
            )
            .filter(|(dir, _)| dir.is_dir())
            .collect::<Vec<_>>();

        directories
            .iter()
            .map(|(dir, require_eml)| {
                fs::read_dir(dir)
                    .with_context(|| format!("Failed to read mail directory: {}", dir.display()))
                    .map(|entries| (entries, *require_eml))
            })
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flat_map(|(entries, require_eml)| {
                entries.map(move |entry| {
                    entry
                        .map(|entry| (entry.path(), require_eml))
                        .context("Failed to read mail entry")
                })
            })
            .filter(|entry| {
                entry
                    .as_ref()
                    .map_or(true, |(path, require_eml)| is_message_file(path, *require_eml))
            })
            .map(|entry| entry.map(|(path, _)| path))
            .collect()
    }

    fn accepts(&self, message: &ParsedMessage) -> bool {
        let sender_ok = self.sender_filter.as_deref().is_none_or(|filter| {
            message
                .from
                .as_deref()
                .is_some_and(|from| from.to_lowercase().contains(&filter.to_lowercase()))
        });

        sender_ok && message.report.subject.starts_with(&self.subject_prefix)
    }
}

impl MailSource for MaildirSource {
    fn fetch(&self, limit: usize) -> Result<Vec<RawReport>> {
        let mut messages = self
            .message_paths()?
            .into_iter()
            .filter_map(|path| match read_message(&path) {
                Ok(message) => Some(message),
                Err(error) => {
                    warn!(error = %error, path = %path.display(), "skipping unreadable message");
                    None
                }
            })
            .filter(|message| self.accepts(message))
            .collect::<Vec<_>>();

        messages.sort_by(|left, right| right.sent_at.cmp(&left.sent_at));
        debug!(matched = messages.len(), limit, "daily report messages found");

        Ok(messages
            .into_iter()
            .take(limit)
            .map(|message| message.report)
            .collect())
    }
}

pub fn read_report_file(path: &Path) -> Result<RawReport> {
    read_message(path).map(|message| message.report)
}

fn read_message(path: &Path) -> Result<ParsedMessage> {
    let data =
        fs::read(path).with_context(|| format!("Failed to read message: {}", path.display()))?;
    parse_message(&data).with_context(|| format!("Failed to parse message: {}", path.display()))
}

fn parse_message(data: &[u8]) -> Result<ParsedMessage> {
    let message = MessageParser::default()
        .parse(data)
        .context("not a MIME message")?;

    let subject = message.subject().unwrap_or_default().trim().to_string();
    let sender_date = message
        .header_raw("Date")
        .map(|value| value.trim().to_string())
        .unwrap_or_default();
    let body = message
        .body_text(0)
        .map(|text| to_crlf(&text))
        .context("message has no text body")?;
    let from = message
        .from()
        .and_then(|address| address.first())
        .and_then(|addr| addr.address())
        .map(ToString::to_string);
    let sent_at = message
        .date()
        .map(|date| date.to_timestamp())
        .unwrap_or_default();

    Ok(ParsedMessage {
        report: RawReport {
            subject,
            sender_date,
            body,
        },
        from,
        sent_at,
    })
}

fn is_message_file(path: &Path, require_eml: bool) -> bool {
    let has_eml_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("eml"));

    path.is_file() && (!require_eml || has_eml_extension)
}
