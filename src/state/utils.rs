use anyhow::{bail, Result};
use std::path::PathBuf;

/// Validate a node name or instance id for safe use in container names,
/// interface names and command lines
///
/// Constraints:
/// - 1-63 characters
/// - only alphanumeric chars, dashes, dots or underscores
/// - must not start with a dash or a dot
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("name cannot be empty");
    }

    if name.len() > 63 {
        bail!("name must be 63 characters or less, got {}", name.len());
    }

    if name.starts_with('-') || name.starts_with('.') {
        bail!("name cannot start with a dash or a dot");
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        bail!(
            "name must contain only alphanumeric characters, dashes, dots or underscores: {:?}",
            name
        );
    }

    Ok(())
}

/// Turn a `/`-separated node id into a relative path
///
/// Node ids are registry paths such as `instances/jlopez/cdh/5.7.0/9/nodes/slave1`.
/// Empty, `.` and `..` segments are rejected.
pub fn node_id_to_path(node_id: &str) -> Result<PathBuf> {
    let trimmed = node_id.trim_matches('/');
    if trimmed.is_empty() {
        bail!("node id cannot be empty");
    }

    let mut path = PathBuf::new();
    for segment in trimmed.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            bail!("invalid node id segment {:?} in {:?}", segment, node_id);
        }
        if segment.contains('\0') || segment.contains('\\') {
            bail!("invalid character in node id {:?}", node_id);
        }
        path.push(segment);
    }
    Ok(path)
}
