//! Pure translation from a [`Job`] to the [`WorkloadSpec`]s that drive it.
//!
//! Every function here is a pure mapping: no I/O, no clock reads beyond what
//! the caller already stamped onto the Job. This keeps the translation
//! trivially testable and keeps the Driver in sole control of when specs are
//! actually submitted.

use std::collections::HashMap;

use buildforge_core::config::ResourceLimits;
use buildforge_core::{Job, Phase};
use buildforge_orchestrator::{Constraint, SecretTemplateRequest, WorkloadSpec, WorkloadType};

const BUILD_CACHE_ROOT: &str = "/var/lib/containers";

/// Fixed prefix for temp-image refs. Not operator-configurable: nothing
/// downstream ever varies it.
const TEMP_IMAGE_PREFIX: &str = "buildforge";

fn base_spec(id: String, image: String, command: Vec<String>) -> WorkloadSpec {
    WorkloadSpec {
        id: id.clone(),
        name: id,
        image,
        command,
        env: HashMap::new(),
        secret_templates: Vec::new(),
        constraints: Vec::new(),
        restart_attempts: 0,
        workload_type: WorkloadType::Batch,
        cpu_mhz: None,
        memory_mb: None,
    }
}

/// Applies an optional per-phase resource limit onto an already-built spec.
fn apply_resources(spec: &mut WorkloadSpec, limits: Option<&ResourceLimits>) {
    if let Some(limits) = limits {
        spec.cpu_mhz = limits.cpu_mhz;
        spec.memory_mb = limits.memory_mb;
    }
}

fn secret_templates(job: &Job) -> Vec<SecretTemplateRequest> {
    let mut templates = Vec::new();
    if let Some(path) = &job.config.git_credential_path {
        templates.push(SecretTemplateRequest {
            secret_path: path.clone(),
            destination: "/secrets/git-credentials".to_string(),
        });
    }
    if let Some(path) = &job.config.registry_credential_path {
        templates.push(SecretTemplateRequest {
            secret_path: path.clone(),
            destination: "/secrets/registry-credentials".to_string(),
        });
    }
    templates
}

/// Build the shell script that clones, builds, and (fast path) publishes
/// the image. `final_tags` is non-empty only on the fast path, in which case
/// the build pushes directly to those destination tags instead of a temp ref.
fn build_script(job: &Job, final_tags: &[String]) -> String {
    let cache_dir = format!(
        "{BUILD_CACHE_ROOT}/{}",
        buildforge_core::naming::sanitize_component(&job.config.image_name)
    );
    let mut script = String::new();
    if job.config.clear_cache {
        script.push_str(&format!("rm -rf {cache_dir}\n"));
    }
    script.push_str(&format!("mkdir -p {cache_dir}\n"));
    script.push_str(&format!(
        "git clone {} /workspace && cd /workspace && git checkout {}\n",
        job.config.repo_url, job.config.git_ref
    ));
    if job.config.registry_credential_path.is_some() {
        script.push_str(&format!(
            "podman login {} --authfile /secrets/registry-credentials\n",
            job.config.registry_url
        ));
    }

    let refs: Vec<String> = if final_tags.is_empty() {
        vec![job.temp_image_ref(TEMP_IMAGE_PREFIX)]
    } else {
        final_tags.to_vec()
    };

    for image_ref in &refs {
        script.push_str(&format!(
            "podman build --layers --cache-dir {cache_dir} -f {} -t {image_ref} /workspace\n",
            job.config.dockerfile_path
        ));
    }
    for image_ref in &refs {
        script.push_str(&format!("podman push {image_ref}\n"));
    }
    script
}

/// Build spec for a Job. On the fast path (no tests declared) this pushes
/// directly to every destination tag; otherwise it builds and pushes a
/// single temp image.
pub fn build_spec(job: &Job) -> WorkloadSpec {
    let fast_path = !job.has_tests();
    let final_refs: Vec<String> = if fast_path {
        job.config
            .image_tags
            .iter()
            .map(|tag| format!("{}/{}:{}", job.config.registry_url, job.config.image_name, tag))
            .collect()
    } else {
        Vec::new()
    };

    let script = build_script(job, &final_refs);
    let mut spec = base_spec(
        format!("build-{}", job.id),
        "buildforge/builder:latest".to_string(),
        vec!["sh".to_string(), "-c".to_string(), script],
    );
    spec.secret_templates = secret_templates(job);
    apply_resources(&mut spec, job.config.resources.build.as_ref());
    spec
}

/// One workload per declared test (command tests first, then the entrypoint
/// test if requested). Each is constrained off the node that ran the build,
/// when that node can be resolved.
pub fn test_specs(job: &Job, build_node_id: Option<&str>) -> Vec<WorkloadSpec> {
    let Some(tests) = &job.config.tests else {
        return Vec::new();
    };
    let temp_ref = job.temp_image_ref(TEMP_IMAGE_PREFIX);
    let constraints: Vec<Constraint> = build_node_id
        .map(|node| vec![Constraint::node_not_equal(node)])
        .unwrap_or_default();

    let mut specs = Vec::new();
    for (index, command) in tests.commands.iter().enumerate() {
        let mut spec = base_spec(
            format!("test-cmd-{}-{index}", job.id),
            temp_ref.clone(),
            vec!["sh".to_string(), "-c".to_string(), command.clone()],
        );
        spec.constraints = constraints.clone();
        apply_resources(&mut spec, job.config.resources.test.as_ref());
        specs.push(spec);
    }
    if tests.entrypoint {
        let mut spec = base_spec(format!("test-entry-{}", job.id), temp_ref.clone(), Vec::new());
        spec.constraints = constraints.clone();
        apply_resources(&mut spec, job.config.resources.test.as_ref());
        specs.push(spec);
    }
    specs
}

/// Publish spec: pulls the temp image, retags to every destination, pushes
/// each. Only reachable when tests were declared (fast path bypasses this).
pub fn publish_spec(job: &Job) -> WorkloadSpec {
    let temp_ref = job.temp_image_ref(TEMP_IMAGE_PREFIX);
    let mut script = format!("podman pull {temp_ref}\n");
    if job.config.registry_credential_path.is_some() {
        script.push_str(&format!(
            "podman login {} --authfile /secrets/registry-credentials\n",
            job.config.registry_url
        ));
    }
    for tag in &job.config.image_tags {
        let dest = format!("{}/{}:{}", job.config.registry_url, job.config.image_name, tag);
        script.push_str(&format!("podman tag {temp_ref} {dest}\n"));
        script.push_str(&format!("podman push {dest}\n"));
    }

    let mut spec = base_spec(
        format!("publish-{}", job.id),
        "buildforge/builder:latest".to_string(),
        vec!["sh".to_string(), "-c".to_string(), script],
    );
    spec.secret_templates = secret_templates(job);
    apply_resources(&mut spec, job.config.resources.publish.as_ref());
    spec
}

/// Best-effort cleanup: deletes the temp image's manifest from the registry.
pub fn cleanup_spec(job: &Job) -> WorkloadSpec {
    let temp_ref = job.temp_image_ref(TEMP_IMAGE_PREFIX);
    let (repo, tag) = temp_ref
        .rsplit_once(':')
        .map(|(repo, tag)| (repo.to_string(), tag.to_string()))
        .unwrap_or((temp_ref.clone(), "latest".to_string()));
    let path_repo = repo
        .split_once('/')
        .map(|(_, rest)| rest.to_string())
        .unwrap_or(repo.clone());

    let mut script = String::new();
    script.push_str("set -e\n");
    if job.config.registry_credential_path.is_some() {
        script.push_str(
            "AUTH=\"-u $(cat /secrets/registry-credentials/username):$(cat /secrets/registry-credentials/password)\"\n",
        );
    } else {
        script.push_str("AUTH=\"\"\n");
    }
    script.push_str(&format!(
        "DIGEST=$(curl -fsSL --cacert /etc/ssl/certs/ca-certificates.crt $AUTH -H 'Accept: application/vnd.oci.image.manifest.v1+json' -D - -o /dev/null https://{}/v2/{path_repo}/manifests/{tag} | grep -i Docker-Content-Digest | awk '{{print $2}}' | tr -d '\\r')\n",
        job.config.registry_url
    ));
    script.push_str(&format!(
        "curl -fsSL --cacert /etc/ssl/certs/ca-certificates.crt $AUTH -X DELETE https://{}/v2/{path_repo}/manifests/$DIGEST\n",
        job.config.registry_url
    ));

    let mut spec = base_spec(
        format!("cleanup-{}", job.id),
        "buildforge/builder:latest".to_string(),
        vec!["sh".to_string(), "-c".to_string(), script],
    );
    spec.secret_templates = secret_templates(job);
    spec
}

/// The phase a freshly built spec belongs to, for callers that need to label
/// log output or route a spec through phase-specific submission logic.
pub fn phase_of(spec_id: &str) -> Option<Phase> {
    if spec_id.starts_with("build-") {
        Some(Phase::Build)
    } else if spec_id.starts_with("test-") {
        Some(Phase::Test)
    } else if spec_id.starts_with("publish-") {
        Some(Phase::Publish)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildforge_core::config::{BuildConfig, PhaseResources, ResourceLimits, TestConfig};
    use buildforge_core::JobId;

    fn config(tests: Option<TestConfig>) -> BuildConfig {
        BuildConfig {
            repo_url: "https://github.com/acme/widget.git".to_string(),
            git_ref: "main".to_string(),
            branch: "main".to_string(),
            dockerfile_path: "Dockerfile".to_string(),
            image_name: "acme/widget".to_string(),
            image_tags: vec!["latest".to_string(), "v1.0".to_string()],
            registry_url: "registry.example.com".to_string(),
            git_credential_path: None,
            registry_credential_path: Some("secret/registry".to_string()),
            tests,
            resources: PhaseResources::default(),
            webhook: None,
            clear_cache: false,
        }
    }

    fn job(tests: Option<TestConfig>) -> Job {
        Job::new(
            JobId::new(),
            config(tests),
            "lock-key".to_string(),
            "session-1".to_string(),
        )
    }

    #[test]
    fn fast_path_build_spec_targets_final_tags_directly() {
        let job = job(None);
        let spec = build_spec(&job);
        let script = spec.command.last().unwrap();
        assert!(script.contains("registry.example.com/acme/widget:latest"));
        assert!(script.contains("registry.example.com/acme/widget:v1.0"));
        assert!(!script.contains("buildforge-"));
    }

    #[test]
    fn build_spec_with_tests_targets_temp_image() {
        let job = job(Some(TestConfig {
            commands: vec!["echo hi".to_string()],
            entrypoint: false,
        }));
        let spec = build_spec(&job);
        let script = spec.command.last().unwrap();
        assert!(script.contains(&job.temp_image_ref(TEMP_IMAGE_PREFIX)));
        assert!(!script.contains("registry.example.com/acme/widget:latest"));
    }

    #[test]
    fn test_specs_cover_commands_and_entrypoint() {
        let job = job(Some(TestConfig {
            commands: vec!["echo one".to_string(), "echo two".to_string()],
            entrypoint: true,
        }));
        let specs = test_specs(&job, Some("node-7"));
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].id, format!("test-cmd-{}-0", job.id));
        assert_eq!(specs[1].id, format!("test-cmd-{}-1", job.id));
        assert_eq!(specs[2].id, format!("test-entry-{}", job.id));
        for spec in &specs {
            assert_eq!(spec.constraints.len(), 1);
            assert_eq!(spec.constraints[0].value, "node-7");
        }
    }

    #[test]
    fn test_specs_without_build_node_have_no_constraint() {
        let job = job(Some(TestConfig {
            commands: vec!["echo one".to_string()],
            entrypoint: false,
        }));
        let specs = test_specs(&job, None);
        assert!(specs[0].constraints.is_empty());
    }

    #[test]
    fn publish_spec_pushes_every_destination_tag() {
        let job = job(Some(TestConfig {
            commands: vec!["echo one".to_string()],
            entrypoint: false,
        }));
        let spec = publish_spec(&job);
        let script = spec.command.last().unwrap();
        assert!(script.contains("registry.example.com/acme/widget:latest"));
        assert!(script.contains("registry.example.com/acme/widget:v1.0"));
    }

    #[test]
    fn phase_resource_limits_are_applied_to_their_specs() {
        let mut cfg = config(Some(TestConfig {
            commands: vec!["echo one".to_string()],
            entrypoint: false,
        }));
        cfg.resources = PhaseResources {
            build: Some(ResourceLimits {
                cpu_mhz: Some(2000),
                memory_mb: Some(512),
            }),
            test: Some(ResourceLimits {
                cpu_mhz: Some(500),
                memory_mb: None,
            }),
            publish: None,
        };
        let job = Job::new(JobId::new(), cfg, "lock-key".to_string(), "session-1".to_string());

        let build = build_spec(&job);
        assert_eq!(build.cpu_mhz, Some(2000));
        assert_eq!(build.memory_mb, Some(512));

        let tests = test_specs(&job, None);
        assert_eq!(tests[0].cpu_mhz, Some(500));
        assert_eq!(tests[0].memory_mb, None);

        let publish = publish_spec(&job);
        assert_eq!(publish.cpu_mhz, None);
        assert_eq!(publish.memory_mb, None);
    }

    #[test]
    fn secret_templates_are_gated_on_credential_paths() {
        let job = job(None);
        let spec = build_spec(&job);
        assert_eq!(spec.secret_templates.len(), 1);
        assert_eq!(spec.secret_templates[0].secret_path, "secret/registry");
    }

    #[test]
    fn phase_of_classifies_deterministic_ids() {
        assert_eq!(phase_of("build-abc"), Some(Phase::Build));
        assert_eq!(phase_of("test-cmd-abc-0"), Some(Phase::Test));
        assert_eq!(phase_of("publish-abc"), Some(Phase::Publish));
        assert_eq!(phase_of("cleanup-abc"), None);
    }
}
