//! Deterministic names: chat keys to index names, files to chunk ids,
//! and quoting for filter expressions.

/// Longest sanitized index key kept (before the prefix is added).
pub const MAX_INDEX_KEY_LEN: usize = 100;

/// Turns an arbitrary chat key into a lowercase `[a-z0-9-]` name that starts
/// with a letter.
///
/// Runs of replaced characters collapse into a single `-`; leading and
/// trailing dashes are trimmed; names that end up empty or start with a
/// digit get a `chat-` prefix.
pub fn sanitize_index_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.to_lowercase().chars() {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
            c
        } else {
            '-'
        };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    let trimmed = out.trim_matches('-');

    let mut name = if trimmed.starts_with(|c: char| c.is_ascii_lowercase()) {
        trimmed.to_string()
    } else {
        format!("chat-{trimmed}")
    };
    // ASCII only at this point, so byte truncation is char truncation.
    name.truncate(MAX_INDEX_KEY_LEN);
    name
}

/// Full index name for a chat key.
pub fn index_name_for(prefix: &str, key: &str) -> String {
    format!("{prefix}{}", sanitize_index_name(key))
}

/// Chunk id from a chat-scoped filename and the chunk ordinal.
///
/// Uses the file stem only (directory and extension dropped), maps every
/// character outside `[A-Za-z0-9_\-=]` to `_`, and falls back to `document`.
pub fn sanitize_document_id(scoped_filename: &str, ordinal: usize) -> String {
    let base = scoped_filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(scoped_filename);
    let stem = match base.rfind('.') {
        Some(i) if base[..i].chars().any(|c| c != '.') => &base[..i],
        _ => base,
    };

    let mut safe: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '=') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if safe.is_empty() {
        safe.push_str("document");
    }
    format!("{safe}_{ordinal}")
}

/// Quotes a value for an OData-style `field eq '...'` expression.
pub fn escape_filter_value(value: &str) -> String {
    value.replace('\'', "''")
}
