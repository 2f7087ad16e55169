/// Longest cleaned text kept before truncation, in characters.
pub const MAX_CLEAN_TEXT_CHARS: usize = 1000;

/// Items listed in full by [`format_list_human`] before summarising the rest.
pub const DEFAULT_MAX_LIST_ITEMS: usize = 5;

/// Normalizes free text for embedding: collapses whitespace, drops NUL
/// characters and truncates overly long text with an ellipsis.
pub fn clean_text(text: Option<&str>) -> String {
    let Some(text) = text else {
        return String::new();
    };

    let collapsed = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\0', "");

    let truncated = if collapsed.chars().count() > MAX_CLEAN_TEXT_CHARS {
        let mut head: String = collapsed.chars().take(MAX_CLEAN_TEXT_CHARS).collect();
        head.push_str("...");
        head
    } else {
        collapsed
    };

    truncated.trim().to_string()
}

/// Joins items the way the rendered descriptions read them:
/// `a`, `a y b`, `a, b y c`, and `a, b, c, d, e y 3 más` past `max_items`.
pub fn format_list_human<S: AsRef<str>>(items: &[S], max_items: usize) -> String {
    match items.len() {
        0 => String::new(),
        1 => items[0].as_ref().to_string(),
        n if n <= max_items => {
            let head: Vec<&str> = items[..n - 1].iter().map(|s| s.as_ref()).collect();
            format!("{} y {}", head.join(", "), items[n - 1].as_ref())
        }
        n => {
            let shown: Vec<&str> = items[..max_items].iter().map(|s| s.as_ref()).collect();
            format!("{} y {} más", shown.join(", "), n - max_items)
        }
    }
}

/// Renders seconds as `1h 2m 3s`, leaving out zero components.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if secs > 0 || parts.is_empty() {
        parts.push(format!("{}s", secs));
    }
    parts.join(" ")
}
