//! Canonical field identifiers a backend may ask for when it declares the
//! input insufficient.
//!
//! Backends phrase their requests loosely ("browser", "OS version", "steps"),
//! so requests are decoded into this closed vocabulary before anything else
//! looks at them. Decoding is substring based and lossy: wording that matches
//! no rule is dropped.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportField {
    DetailedDescription,
    Description,
    StepsToReproduce,
    Environment,
    Platform,
    Os,
    AppVersion,
    NetworkInfo,
    AdditionalDetails,
    Severity,
    Component,
    Attachments,
}

/// Keyword rules applied to the lowercased request, first match wins.
const KEYWORD_RULES: [(&str, ReportField); 3] = [
    ("browser", ReportField::AppVersion),
    ("os", ReportField::Os),
    ("steps", ReportField::StepsToReproduce),
];

impl ReportField {
    pub const ALL: [ReportField; 12] = [
        ReportField::DetailedDescription,
        ReportField::Description,
        ReportField::StepsToReproduce,
        ReportField::Environment,
        ReportField::Platform,
        ReportField::Os,
        ReportField::AppVersion,
        ReportField::NetworkInfo,
        ReportField::AdditionalDetails,
        ReportField::Severity,
        ReportField::Component,
        ReportField::Attachments,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            ReportField::DetailedDescription => "detailedDescription",
            ReportField::Description => "description",
            ReportField::StepsToReproduce => "stepsToReproduce",
            ReportField::Environment => "environment",
            ReportField::Platform => "platform",
            ReportField::Os => "os",
            ReportField::AppVersion => "appVersion",
            ReportField::NetworkInfo => "networkInfo",
            ReportField::AdditionalDetails => "additionalDetails",
            ReportField::Severity => "severity",
            ReportField::Component => "component",
            ReportField::Attachments => "attachments",
        }
    }

    /// Human label used when prompting the reporter for this field.
    pub fn label(&self) -> &'static str {
        match self {
            ReportField::DetailedDescription | ReportField::Description => "detailed description",
            ReportField::StepsToReproduce => "steps to reproduce",
            ReportField::Environment => "environment details",
            ReportField::Platform => "platform (Desktop / Web / iOS / Android)",
            ReportField::Os => "operating system and version",
            ReportField::AppVersion => "app or browser version",
            ReportField::NetworkInfo => "network details (VPN / proxy / etc.)",
            ReportField::AdditionalDetails => "additional details",
            ReportField::Severity => "severity",
            ReportField::Component => "affected component",
            ReportField::Attachments => "screenshot or log links",
        }
    }

    /// Exact canonical id lookup (case-insensitive). `steps` is accepted as an alias.
    pub fn from_id(raw: &str) -> Option<ReportField> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("steps") {
            return Some(ReportField::StepsToReproduce);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|field| field.id().eq_ignore_ascii_case(trimmed))
    }

    /// Decode one free-text request from a backend into a canonical field.
    pub fn decode(raw: &str) -> Option<ReportField> {
        let lower = raw.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        KEYWORD_RULES
            .iter()
            .find(|(keyword, _)| lower.contains(keyword))
            .map(|(_, field)| *field)
            .or_else(|| Self::from_id(raw))
    }

    /// Decode a list of requests, dropping unknown entries and duplicates while
    /// keeping first-seen order.
    pub fn decode_all<S: AsRef<str>>(requests: &[S]) -> Vec<ReportField> {
        let mut out = Vec::new();
        for request in requests {
            if let Some(field) = Self::decode(request.as_ref()) {
                if !out.contains(&field) {
                    out.push(field);
                }
            }
        }
        out
    }
}

impl fmt::Display for ReportField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
