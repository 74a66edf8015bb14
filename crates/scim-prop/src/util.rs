//! Attribute path helpers.
//!
//! Attribute paths are dot separated (`name.givenName`) and compared without
//! regard to ASCII case, as attribute names are.

/// Compares two attribute names ignoring ASCII case.
pub fn names_equal(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Appends `name` to `parent`. An empty parent yields `name` unchanged.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        return name.to_string();
    }
    let mut out = String::with_capacity(parent.len() + name.len() + 1);
    out.push_str(parent);
    out.push('.');
    out.push_str(name);
    out
}

/// Splits a dotted path into its segments. The empty path has no segments.
pub fn split_path(path: &str) -> Vec<&str> {
    if path.is_empty() {
        return Vec::new();
    }
    path.split('.').collect()
}

/// Check if `child` lies strictly below `parent`.
pub fn is_child(parent: &str, child: &str) -> bool {
    let p = split_path(parent);
    let c = split_path(child);
    if p.len() >= c.len() {
        return false;
    }
    p.iter().zip(c.iter()).all(|(a, b)| names_equal(a, b))
}

/// Check if two dotted paths name the same attribute.
pub fn is_path_equal(p1: &str, p2: &str) -> bool {
    let a = split_path(p1);
    let b = split_path(p2);
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| names_equal(x, y))
}
