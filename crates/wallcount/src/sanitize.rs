//! Turn the loosely quoted object literal into strict JSON text.

/// Rewrite a `var data = {...};` statement into JSON.
///
/// Everything up to and including the first `=` is dropped and copying stops at
/// the first `;`. Single quotes become double quotes and all Unicode whitespace
/// is removed, including the spaces inside string values. A trailing `},}`
/// comma artifact collapses to `}}`. Input without `=` yields an empty string.
pub fn sanitize_literal(raw: &str) -> String {
    let Some((_, rest)) = raw.split_once('=') else {
        return String::new();
    };

    let mut out = String::with_capacity(rest.len());
    for ch in rest.chars() {
        match ch {
            ';' => break,
            '\'' => out.push('"'),
            c if c.is_whitespace() => {}
            c => out.push(c),
        }
    }

    out.replace("},}", "}}")
}
