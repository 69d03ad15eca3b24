//! Project and version name validation and reference parsing.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{CoreError, CoreResult};

/// Suffix appended to a version name when it is soft-deleted.
pub const DELETED_SUFFIX: &str = "-deleted";

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9.+~_-]*$").expect("valid name regex"))
}

/// Check whether a project or version name is syntactically valid.
///
/// Names must start with an alphanumeric character and may contain
/// dots, plus, tilde, underscore and dash (the characters Debian
/// accepts in source and version strings).
pub fn is_name_valid(name: &str) -> bool {
    !name.is_empty() && name_regex().is_match(name)
}

/// Validate a version name, producing a domain error on failure.
pub fn validate_name(name: &str) -> CoreResult<()> {
    if name.is_empty() {
        return Err(CoreError::Validation(
            "No valid name for the projectversion received".into(),
        ));
    }
    if !is_name_valid(name) {
        return Err(CoreError::Validation(format!("Invalid name: {name}")));
    }
    Ok(())
}

/// Parse a `"project/version"` reference into its two parts.
///
/// Used for basemirror references in create/clone requests.
pub fn parse_version_ref(reference: &str) -> CoreResult<(&str, &str)> {
    match reference.split_once('/') {
        Some((project, version)) if !project.is_empty() && !version.is_empty() => {
            Ok((project, version))
        }
        _ => Err(CoreError::Validation(format!(
            "No valid version reference received (format: 'project/version'): {reference}"
        ))),
    }
}

/// The name a version is given when soft-deleted.
pub fn deleted_name(name: &str) -> String {
    format!("{name}{DELETED_SUFFIX}")
}

/// The pre-deletion name of a possibly soft-deleted version.
pub fn original_name(name: &str) -> &str {
    name.strip_suffix(DELETED_SUFFIX).unwrap_or(name)
}
