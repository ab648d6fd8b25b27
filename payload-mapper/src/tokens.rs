//! Substitutes `{{uuid()}}` / `{{now()}}` / `{{seq(series)}}` tokens in a
//! literal value template. A template with no `{{...}}` is returned
//! verbatim.

use chrono::{DateTime, Utc};
use payment_core_types::IdGenerator;

/// Render a value template against the supplied clock/id-generator.
/// Everything outside `{{...}}` is copied through unchanged.
pub fn render(template: &str, now: DateTime<Utc>, ids: &dyn IdGenerator) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        match after_open.find("}}") {
            Some(close) => {
                let token = after_open[..close].trim();
                out.push_str(&render_token(token, now, ids));
                rest = &after_open[close + 2..];
            }
            None => {
                // Unterminated token: emit the rest of the string literally.
                out.push_str(&rest[open..]);
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

fn render_token(token: &str, now: DateTime<Utc>, ids: &dyn IdGenerator) -> String {
    if token == "uuid()" {
        return ids.new_uuid().to_string();
    }
    if token == "now()" {
        return now.to_rfc3339();
    }
    if let Some(inner) = token.strip_prefix("seq(").and_then(|s| s.strip_suffix(')')) {
        let series = inner.trim().trim_matches('"').trim_matches('\'');
        return ids.next_sequence(series).to_string();
    }
    // Unknown token: leave it as-is so the caller can see what failed to render.
    format!("{{{{{}}}}}", token)
}
