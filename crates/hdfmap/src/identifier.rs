//! Short, expression-safe names derived from container paths.

/// Final segment that marks the primary value of its parent group.
const VALUE_SEGMENT: &str = "/value";

/// Replace every character that cannot appear in an identifier with `_`.
pub fn expression_safe_name(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Drop consecutive repeats of the same `_`-separated token.
fn collapse_repeats(name: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for token in name.split('_') {
        if !token.is_empty() && kept.last() == Some(&token) {
            continue;
        }
        kept.push(token);
    }
    kept.join("_")
}

/// Identifier for the dataset at `path`.
///
/// ```
/// use hdfmap::generate_identifier;
///
/// assert_eq!(generate_identifier("/entry/instrument/mono/energy"), "energy");
/// assert_eq!(generate_identifier("/entry/sample/temperature/value"), "temperature");
/// assert_eq!(generate_identifier("motor.motor"), "motor");
/// assert_eq!(generate_identifier("pil3_100k.data"), "pil3_100k_data");
/// ```
pub fn generate_identifier(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    let trimmed = match trimmed.strip_suffix(VALUE_SEGMENT) {
        Some(parent) if !parent.is_empty() => parent,
        _ => trimmed,
    };
    let last = trimmed.rsplit('/').next().unwrap_or("");
    collapse_repeats(&expression_safe_name(last))
}

/// Aliases for a dataset, in lookup-priority order, without empties or
/// repeats: the bare name, `group_name`, `class_name` and the declared
/// local name.
pub fn alias_names(name: &str, group_name: &str, class_tag: &str, local_name: Option<&str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(4);
    let mut push = |candidate: String| {
        if !candidate.is_empty() && !out.contains(&candidate) {
            out.push(candidate);
        }
    };
    push(name.to_string());
    if !group_name.is_empty() {
        push(format!("{}_{name}", expression_safe_name(group_name)));
    }
    if !class_tag.is_empty() {
        push(format!("{}_{name}", expression_safe_name(class_tag)));
    }
    if let Some(local) = local_name {
        push(generate_identifier(local));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn value_suffix_and_specials() {
        assert_eq!(generate_identifier("/entry/sample/temperature/value"), "temperature");
        assert_eq!(generate_identifier("/value"), "value");
        assert_eq!(generate_identifier("/entry/a-b c"), "a_b_c");
        assert_eq!(generate_identifier("/entry/x_x_y_y_x"), "x_y_x");
        assert_eq!(generate_identifier("/"), "");
    }

    #[test]
    fn underscores_are_preserved() {
        assert_eq!(generate_identifier("__private"), "__private");
        assert_eq!(generate_identifier("a__a"), "a__a");
    }

    #[test]
    fn aliases_drop_empties_and_repeats() {
        let names = alias_names("eta", "measurement", "NXcollection", Some("eta"));
        assert_eq!(names, vec!["eta", "measurement_eta", "NXcollection_eta"]);
        let names = alias_names("data", "pil3_100k", "NXdetector", Some("pil3_100k.data"));
        assert_eq!(names, vec!["data", "pil3_100k_data", "NXdetector_data"]);
        assert_eq!(alias_names("x", "", "", None), vec!["x"]);
    }

    proptest! {
        #[test]
        fn identifiers_are_idempotent(path in "[a-zA-Z0-9_./ :-]{0,32}") {
            let once = generate_identifier(&path);
            prop_assert_eq!(generate_identifier(&once), once.clone());
            prop_assert!(once.chars().all(|c| c.is_alphanumeric() || c == '_'));
        }
    }
}
