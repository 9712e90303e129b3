/// Reduces a server-suggested name to a safe, bare file name.
///
/// Only the final path component is kept, then anything that is not
/// alphanumeric, `.`, `-` or `_` becomes `_`. Returns `None` when nothing
/// usable is left.
pub fn sanitize_filename(filename: &str) -> Option<String> {
    let base = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();

    let sanitized =
        base.replace(|c: char| !c.is_alphanumeric() && c != '.' && c != '-' && c != '_', "_");

    match sanitized.as_str() {
        "" | "." | ".." => None,
        _ => Some(sanitized),
    }
}
