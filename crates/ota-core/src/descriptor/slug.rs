//! Local file names for downloaded packages.

/// Linux NAME_MAX.
const NAME_MAX: usize = 255;

/// Lowercase ASCII slug: non-ASCII characters are dropped and spaces become `-`.
pub fn slugify(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii())
        .map(|c| if c == ' ' { '-' } else { c.to_ascii_lowercase() })
        .collect()
}

/// Sanitizes a candidate filename for safe use on Linux.
///
/// - Replaces NUL, `/`, `\`, tabs and control characters with `_`
/// - Trims leading/trailing spaces, dots and underscores
/// - Collapses consecutive underscores
/// - Limits length to 255 bytes
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;

    for c in name.chars() {
        let replacement = if c == '\0' || c == '/' || c == '\\' || c == '\t' || c.is_control() {
            '_'
        } else {
            c
        };

        if replacement == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(replacement);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '.' || c == '_');

    if trimmed.len() > NAME_MAX {
        let mut take = NAME_MAX;
        while take > 0 && !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        trimmed[..take].to_string()
    } else {
        trimmed.to_string()
    }
}

/// `<slug>.zip` for a package, never empty.
pub fn package_file_name(name: &str, version: Option<&str>) -> String {
    let stem = format!("{}_ota_package_{}", name, version.unwrap_or(""));
    let mut base = sanitize_filename(&slugify(&stem));
    if base.is_empty() {
        base = "ota_package".to_string();
    }
    // Leave room for the extension.
    if base.len() > NAME_MAX - 4 {
        base.truncate(NAME_MAX - 4);
    }
    format!("{}.zip", base)
}
