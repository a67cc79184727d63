//! Prefilled links to the public bug submission form.

use bugbot_core::{CanonicalReport, Environment};
use url::Url;

pub const BUG_FORM_URL: &str =
    "https://support.discord.com/hc/en-us/requests/new?ticket_form_id=360006586013";

/// Chat buttons reject longer URLs, so anything above this falls back to the bare form.
pub const MAX_PREFILLED_URL_LEN: usize = 500;

const NOT_SPECIFIED: &str = "- Not specified -";
const FALLBACK_SUBJECT: &str = "Discord bug report";

fn or_not_specified(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(NOT_SPECIFIED)
        .to_string()
}

fn client_info(env: &Environment) -> String {
    let labelled = [
        ("Platform", env.platform()),
        ("Client Type", env.get_str(Environment::CLIENT_TYPE)),
        ("OS", env.os()),
        ("App version", env.app_version()),
        ("Client Info", env.get_str(Environment::CLIENT_INFO)),
        ("Network", env.network_info()),
    ];
    let mut lines: Vec<String> = labelled
        .iter()
        .filter_map(|(label, value)| value.map(|v| format!("{}: {}", label, v)))
        .collect();
    if let Some(extra) = env.get_str(Environment::ADDITIONAL_DETAILS) {
        lines.push(extra.to_string());
    }
    if lines.is_empty() {
        NOT_SPECIFIED.to_string()
    } else {
        lines.join("\n")
    }
}

/// Body text for the form's description box.
pub fn form_description(report: &CanonicalReport) -> String {
    let steps = report
        .steps_to_reproduce
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {}", i + 1, step))
        .collect::<Vec<_>>()
        .join("\n");

    [
        "**Description**".to_string(),
        report.description.clone(),
        String::new(),
        "**Steps to Reproduce**".to_string(),
        or_not_specified(Some(&steps)),
        String::new(),
        "**Expected Result**".to_string(),
        or_not_specified(report.expected_result.as_deref()),
        String::new(),
        "**Actual Result**".to_string(),
        or_not_specified(report.actual_result.as_deref()),
        String::new(),
        "**Client Info**".to_string(),
        client_info(&report.environment),
    ]
    .join("\n")
}

/// Build a prefilled form URL, or the bare form URL when the result would be too long.
pub fn build_bug_report_url(report: &CanonicalReport) -> String {
    let Ok(mut url) = Url::parse(BUG_FORM_URL) else {
        return BUG_FORM_URL.to_string();
    };
    let subject = if report.title.trim().is_empty() {
        FALLBACK_SUBJECT
    } else {
        report.title.as_str()
    };
    url.query_pairs_mut()
        .append_pair("subject", subject)
        .append_pair("description", &form_description(report));

    let prefilled = url.to_string();
    if prefilled.len() > MAX_PREFILLED_URL_LEN {
        BUG_FORM_URL.to_string()
    } else {
        prefilled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_report_is_prefilled() {
        let report = CanonicalReport::new("Crash", "Boom").with_steps(["Open"]);
        let url = build_bug_report_url(&report);
        assert!(url.starts_with(BUG_FORM_URL));
        assert!(url.contains("subject=Crash"));
        assert!(url.len() <= MAX_PREFILLED_URL_LEN);
    }

    #[test]
    fn test_long_report_falls_back_to_base_url() {
        let report = CanonicalReport::new("Crash", "x".repeat(600)).with_steps(["Open"]);
        assert_eq!(build_bug_report_url(&report), BUG_FORM_URL);
    }

    #[test]
    fn test_description_sections_and_placeholders() {
        let mut report = CanonicalReport::new("Crash", "Boom").with_steps(["Open app", "Click"]);
        report.environment.insert(Environment::OS, "Windows 11");
        let body = form_description(&report);
        assert!(body.contains("1. Open app\n2. Click"));
        assert!(body.contains("**Expected Result**\n- Not specified -"));
        assert!(body.contains("OS: Windows 11"));
        assert!(!body.contains("Platform:"));
    }
}
