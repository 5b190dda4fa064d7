//! Pick the effective template per name for a plugin version

use forgeport_core::registry::TemplateFilter;
use forgeport_core::types::{ConfigTemplateRecord, CpuArch, PackageKey, Platform, WILDCARD_VERSION};
use forgeport_core::version::parse_lenient;
use forgeport_core::{Registry, Result};
use std::cmp::Ordering;
use tracing::debug;

/// Resolve the latest template for every distinct name in `templates`.
///
/// Names with no candidate for `(platform, arch)`, locally or in the
/// registry, are omitted. Output follows first-seen name order.
pub async fn resolve_latest(
    plugin: &str,
    platform: Platform,
    arch: CpuArch,
    templates: &[ConfigTemplateRecord],
    plugin_version: Option<&str>,
    registry: &dyn Registry,
) -> Result<Vec<ConfigTemplateRecord>> {
    let mut names: Vec<&str> = Vec::new();
    for template in templates {
        if !names.contains(&template.name.as_str()) {
            names.push(&template.name);
        }
    }

    let mut resolved = Vec::with_capacity(names.len());
    for name in names {
        let mut candidates: Vec<ConfigTemplateRecord> = templates
            .iter()
            .filter(|t| t.name == name && t.platform == platform && t.arch == arch)
            .cloned()
            .collect();

        if candidates.is_empty() {
            debug!(
                "No {} template for {}/{} in input, looking it up for {}",
                name, platform, arch, plugin
            );
            candidates = registry
                .config_templates(
                    &TemplateFilter::for_plugin(plugin)
                        .with_name(name)
                        .with_target(platform, arch),
                )
                .await?;
        }

        if let Some(picked) = pick(candidates, plugin_version) {
            resolved.push(picked);
        }
    }

    Ok(resolved)
}

/// Templates effective for a published package.
///
/// Considers templates bound to the package version and wildcard templates.
pub async fn latest_for_package(
    registry: &dyn Registry,
    package: &PackageKey,
) -> Result<Vec<ConfigTemplateRecord>> {
    let templates = registry
        .config_templates(
            &TemplateFilter::for_plugin(&package.project)
                .with_target(package.platform, package.arch)
                .with_plugin_versions(vec![
                    package.version.clone(),
                    WILDCARD_VERSION.to_string(),
                ]),
        )
        .await?;

    resolve_latest(
        &package.project,
        package.platform,
        package.arch,
        &templates,
        Some(&package.version),
        registry,
    )
    .await
}

fn pick(
    candidates: Vec<ConfigTemplateRecord>,
    plugin_version: Option<&str>,
) -> Option<ConfigTemplateRecord> {
    // A requested version naming one of the template versions selects it directly
    if let Some(wanted) = plugin_version {
        let exact: Vec<ConfigTemplateRecord> = candidates
            .iter()
            .filter(|t| t.version == wanted)
            .cloned()
            .collect();
        if !exact.is_empty() {
            return highest(exact);
        }
    }
    highest(candidates)
}

/// Highest template version; unparsable versions rank lowest, ties go to the newest row
fn highest(candidates: Vec<ConfigTemplateRecord>) -> Option<ConfigTemplateRecord> {
    candidates.into_iter().max_by(|a, b| {
        let by_version = match (parse_lenient(&a.version), parse_lenient(&b.version)) {
            (Ok(va), Ok(vb)) => va.cmp_precedence(&vb),
            (Ok(_), Err(_)) => Ordering::Greater,
            (Err(_), Ok(_)) => Ordering::Less,
            (Err(_), Err(_)) => Ordering::Equal,
        };
        by_version.then_with(|| a.updated_at.cmp(&b.updated_at))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use forgeport_core::{LocalRegistry, WriteBatch};

    fn template(name: &str, version: &str, plugin_version: &str) -> ConfigTemplateRecord {
        ConfigTemplateRecord {
            plugin_name: "proc".to_string(),
            plugin_version: plugin_version.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            platform: Platform::Linux,
            arch: CpuArch::X86_64,
            is_main: false,
            format: "yaml".to_string(),
            file_path: "etc".to_string(),
            content: format!("{}@{}", name, version),
            variables: None,
            is_release_version: true,
            updated_at: Utc::now(),
        }
    }

    async fn resolve(
        templates: &[ConfigTemplateRecord],
        plugin_version: Option<&str>,
    ) -> Vec<ConfigTemplateRecord> {
        let registry = LocalRegistry::in_memory();
        resolve_latest(
            "proc",
            Platform::Linux,
            CpuArch::X86_64,
            templates,
            plugin_version,
            &registry,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_requested_version_without_match_takes_highest() {
        let templates = vec![template("a", "1.0", "*"), template("a", "1.1", "2.0")];

        let picked = resolve(&templates, Some("2.0")).await;
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].version, "1.1");

        let picked = resolve(&templates, Some("9.9")).await;
        assert_eq!(picked[0].version, "1.1");
    }

    #[tokio::test]
    async fn test_requested_version_matches_template_version() {
        let templates = vec![template("a", "2.0", "*"), template("a", "3.0", "*")];
        let picked = resolve(&templates, Some("2.0")).await;
        assert_eq!(picked[0].version, "2.0");
    }

    #[tokio::test]
    async fn test_requested_version_match_is_exact() {
        let templates = vec![template("a", "2.0.0", "*"), template("a", "3.0", "*")];
        let picked = resolve(&templates, Some("2.0")).await;
        assert_eq!(picked[0].version, "3.0");
    }

    #[tokio::test]
    async fn test_unparsable_versions_rank_lowest() {
        let templates = vec![template("a", "latest", "*"), template("a", "0.1", "*")];
        let picked = resolve(&templates, None).await;
        assert_eq!(picked[0].version, "0.1");
    }

    #[tokio::test]
    async fn test_ties_go_to_most_recent() {
        let mut older = template("a", "1.0", "*");
        older.updated_at = Utc::now() - Duration::hours(1);
        older.content = "older".to_string();
        let mut newer = template("a", "1.0.0", "*");
        newer.content = "newer".to_string();

        let picked = resolve(&[newer, older], None).await;
        assert_eq!(picked[0].content, "newer");
    }

    #[tokio::test]
    async fn test_names_keep_first_seen_order() {
        let templates = vec![
            template("b", "1", "*"),
            template("a", "1", "*"),
            template("b", "2", "*"),
        ];
        let names: Vec<String> = resolve(&templates, None)
            .await
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_other_target_backfills_from_registry() {
        let registry = LocalRegistry::in_memory();
        let mut stored = template("a", "2.0", "*");
        stored.content = "from registry".to_string();
        let mut batch = WriteBatch::new();
        batch.templates.push(stored);
        registry.commit(batch).await.unwrap();

        let mut windows_only = template("a", "5.0", "*");
        windows_only.platform = Platform::Windows;
        let mut unknown = template("z", "1.0", "*");
        unknown.platform = Platform::Windows;

        let picked = resolve_latest(
            "proc",
            Platform::Linux,
            CpuArch::X86_64,
            &[windows_only, unknown],
            None,
            &registry,
        )
        .await
        .unwrap();

        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].content, "from registry");
    }

    #[tokio::test]
    async fn test_latest_for_package_filters_plugin_versions() {
        let registry = LocalRegistry::in_memory();
        let mut batch = WriteBatch::new();
        batch.templates.push(template("a", "1.0", "*"));
        batch.templates.push(template("a", "9.0", "3.0"));
        batch.templates.push(template("a", "1.5", "1.2"));
        registry.commit(batch).await.unwrap();

        let key = PackageKey::new("proc", "1.2", Platform::Linux, CpuArch::X86_64);
        let picked = latest_for_package(&registry, &key).await.unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].version, "1.5");

        let key = PackageKey::new("proc", "1.0", Platform::Linux, CpuArch::X86_64);
        let picked = latest_for_package(&registry, &key).await.unwrap();
        assert_eq!(picked[0].version, "1.0");
    }
}
