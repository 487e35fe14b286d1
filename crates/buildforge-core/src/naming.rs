//! Deterministic naming rules that external consumers depend on bit-exactly
//! (SPEC_FULL §3, §6): the temp-image ref format and its sanitization.

use crate::id::JobId;

const MAX_BRANCH_LEN: usize = 50;

/// Lowercase and replace `/`, `_`, `.` with `-`.
pub fn sanitize_component(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '/' | '_' | '.' => '-',
            other => other,
        })
        .collect()
}

/// Sanitize a branch name and truncate to at most 50 characters, per
/// SPEC_FULL §3 TempImageRef.
pub fn sanitize_branch(branch: &str) -> String {
    let sanitized = sanitize_component(branch);
    if sanitized.len() > MAX_BRANCH_LEN {
        sanitized[..MAX_BRANCH_LEN].to_string()
    } else {
        sanitized
    }
}

/// `{registry}/{temp_prefix}-{sanitized_image}:{sanitized_branch}-{job_id}`
pub fn temp_image_ref(
    registry_url: &str,
    temp_prefix: &str,
    image_name: &str,
    branch: &str,
    job_id: JobId,
) -> String {
    format!(
        "{registry}/{prefix}-{image}:{branch}-{job}",
        registry = registry_url,
        prefix = temp_prefix,
        image = sanitize_component(image_name),
        branch = sanitize_branch(branch),
        job = job_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_separators_and_case() {
        assert_eq!(sanitize_component("My/Org_Name.Image"), "my-org-name-image");
    }

    #[test]
    fn truncates_long_branches() {
        let long = "a".repeat(80);
        assert_eq!(sanitize_branch(&long).len(), MAX_BRANCH_LEN);
    }

    #[test]
    fn temp_ref_matches_external_format() {
        let id = JobId::from_uuid(uuid::Uuid::nil());
        let r = temp_image_ref(
            "registry.example.com",
            "tmp",
            "My/Image",
            "feature/Foo_Bar",
            id,
        );
        assert_eq!(
            r,
            format!(
                "registry.example.com/tmp-my-image:feature-foo-bar-{}",
                id
            )
        );
    }
}
