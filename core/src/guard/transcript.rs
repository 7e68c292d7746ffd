//! Header and footer banners around the wrapped command's output.

use chrono::{DateTime, Local, SecondsFormat};

pub const GENERATOR_LINE: &str = "# This log is generated by runonce";

fn timestamp(at: &DateTime<Local>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn header(name: &str, start: &DateTime<Local>) -> String {
    format!(
        "{GENERATOR_LINE}\nname: {name}\nstart: {}\n---\n",
        timestamp(start)
    )
}

pub(crate) fn footer(end: &DateTime<Local>, error: Option<&str>) -> String {
    let mut out = format!("\n---\nend: {}\n", timestamp(end));
    if let Some(message) = error {
        out.push_str("error: ");
        out.push_str(message);
        out.push('\n');
    }
    out
}
