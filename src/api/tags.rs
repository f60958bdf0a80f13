//! Legacy description tagging.
//!
//! The backend stores provenance and reporter details inside the free-text
//! description, e.g. `[SOS ALERT] Emergency | User: alice | Phone: 555`.
//! Incidents are converted to structured fields at the client boundary and
//! back again when created.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::incident::{Provenance, ReporterContact};

pub const VIEWER_REPORT_TAG: &str = "[VIEWER REPORT]";
pub const SOS_ALERT_TAG: &str = "[SOS ALERT]";

static FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(user|phone|email|contact|location)\s*:\s*(.*)$")
        .expect("field regex is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDescription {
    pub provenance: Provenance,
    pub body: String,
    pub reporter: Option<ReporterContact>,
}

pub fn parse_description(raw: &str) -> ParsedDescription {
    let (provenance, rest) = if raw.contains(SOS_ALERT_TAG) {
        (Provenance::SosAlert, raw.replacen(SOS_ALERT_TAG, "", 1))
    } else if raw.contains(VIEWER_REPORT_TAG) {
        (Provenance::ViewerReport, raw.replacen(VIEWER_REPORT_TAG, "", 1))
    } else {
        (Provenance::Camera, raw.to_string())
    };

    let mut reporter = ReporterContact::default();
    let mut body_parts = Vec::new();

    for segment in rest.split(['|', '\n']) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        // Untagged descriptions are never mined for reporter fields.
        let captures = match provenance {
            Provenance::Camera => None,
            _ => FIELD_RE.captures(segment),
        };
        let Some(caps) = captures else {
            body_parts.push(segment);
            continue;
        };
        let value = caps[2].trim();
        let value = (!value.is_empty()).then(|| value.to_string());
        match caps[1].to_ascii_lowercase().as_str() {
            "user" => reporter.username = value,
            "phone" => reporter.phone = value,
            "email" => reporter.email = value,
            "contact" => reporter.contact = value,
            "location" => reporter.location = value,
            _ => body_parts.push(segment),
        }
    }

    ParsedDescription {
        provenance,
        body: body_parts.join(" "),
        reporter: (!reporter.is_empty()).then_some(reporter),
    }
}

pub fn render_description(
    provenance: Provenance,
    body: &str,
    reporter: Option<&ReporterContact>,
) -> String {
    let mut out = match provenance {
        Provenance::Camera => String::new(),
        Provenance::ViewerReport => format!("{} ", VIEWER_REPORT_TAG),
        Provenance::SosAlert => format!("{} ", SOS_ALERT_TAG),
    };
    out.push_str(&sanitize(body));

    if let Some(r) = reporter {
        let fields = [
            ("User", &r.username),
            ("Phone", &r.phone),
            ("Email", &r.email),
            ("Contact", &r.contact),
            ("Location", &r.location),
        ];
        for (key, value) in fields {
            if let Some(v) = value {
                out.push_str(&format!(" | {}: {}", key, sanitize(v)));
            }
        }
    }
    out
}

fn sanitize(s: &str) -> String {
    s.replace(['|', '\n', '\r'], " ").trim().to_string()
}
