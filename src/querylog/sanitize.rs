/// Placeholder for characters that are unsafe in file names.
const PLACEHOLDER: char = '_';

fn is_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Maps a client identifier to a token usable as part of a file name.
///
/// Every run of characters outside `[A-Za-z0-9_-]` becomes a single `_`,
/// so `cl/ient2\$%&test` turns into `cl_ient2_test`. Distinct inputs may
/// still collide; this is a best-effort mapping.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;

    for c in name.chars() {
        if is_safe(c) {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push(PLACEHOLDER);
            in_run = true;
        }
    }

    out
}
