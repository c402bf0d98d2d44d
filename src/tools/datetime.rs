use chrono::{DateTime, Utc};

/// Current date and time, formatted for the model.
pub fn get_datetime() -> String {
    format_datetime(Utc::now())
}

fn format_datetime(now: DateTime<Utc>) -> String {
    now.format("%A, %Y-%m-%d %H:%M:%S UTC").to_string()
}
