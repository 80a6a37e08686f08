/// Expand `${VAR}` and `${VAR:-fallback}` placeholders in raw config text.
///
/// A variable that is unset and has no fallback keeps its placeholder, so the
/// later environment-override pass (or a validation error) can still see it.
pub fn substitute_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated: keep the remainder verbatim.
            out.push_str(&rest[start..]);
            return out;
        };
        let body = &after[..end];
        out.push_str(&expand(body));
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

fn expand(body: &str) -> String {
    let (name, fallback) = match body.split_once(":-") {
        Some((name, fallback)) => (name, Some(fallback)),
        None => (body, None),
    };
    if name.is_empty() {
        return format!("${{{body}}}");
    }
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val,
        _ => match fallback {
            Some(fb) => fb.to_string(),
            None => format!("${{{body}}}"),
        },
    }
}
