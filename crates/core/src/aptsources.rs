//! Rendering of apt `sources.list` text for a resolved dependency set.
//!
//! The graph engine resolves which versions contribute repositories and
//! in which order; this module only turns that resolved set into text.

/// The distribution name of the stable package channel.
pub const DIST_STABLE: &str = "stable";
/// The distribution name of the CI / unstable package channel.
pub const DIST_UNSTABLE: &str = "unstable";

/// One version's repository, ready to be rendered as a `deb` line.
#[derive(Debug, Clone)]
pub struct AptRepoSource {
    pub project_name: String,
    pub version_name: String,
    /// The owning project is a basemirror (OS base package set).
    pub is_basemirror: bool,
    /// Mirror content lives on a foreign host instead of our repositories.
    pub external_repo: bool,
    pub mirror_url: Option<String>,
    pub mirror_distribution: Option<String>,
    pub mirror_components: Option<Vec<String>>,
}

impl AptRepoSource {
    /// Render the `deb` line for this repository.
    ///
    /// `base_url` is the routing-resolved repository base; `dist`
    /// selects the channel for regular project repositories and is
    /// ignored for mirrors, which carry their own distribution.
    pub fn apt_line(&self, base_url: &str, dist: &str) -> String {
        if self.external_repo {
            let url = self.mirror_url.as_deref().unwrap_or_default();
            let mirror_dist = self.mirror_distribution.as_deref().unwrap_or(dist);
            format!("deb {} {} {}", url, mirror_dist, self.components())
        } else if self.is_basemirror {
            let mirror_dist = self.mirror_distribution.as_deref().unwrap_or(DIST_STABLE);
            format!(
                "deb {}/{}/{} {} {}",
                base_url, self.project_name, self.version_name, mirror_dist,
                self.components()
            )
        } else {
            format!(
                "deb {}/{}/{} {} main",
                base_url, self.project_name, self.version_name, dist
            )
        }
    }

    fn components(&self) -> String {
        match &self.mirror_components {
            Some(components) if !components.is_empty() => components.join(" "),
            _ => "main".to_string(),
        }
    }
}

/// A repository entry of the resolved closure, with its unstable opt-in.
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    pub source: AptRepoSource,
    /// Emit an additional unstable-channel line after the stable one.
    pub with_unstable: bool,
}

/// Render the full apt sources text for one version.
///
/// Layout: header comments, optional basemirror line, then one stable
/// line per resolved source in the order given, each optionally
/// followed by its unstable variant.
pub fn render_sources_list(
    project_name: &str,
    version_name: &str,
    base_url: &str,
    key_url: &str,
    basemirror: Option<&AptRepoSource>,
    sources: &[ResolvedSource],
) -> String {
    let mut out = format!("# APT Sources for project {project_name} {version_name}\n");
    out.push_str(&format!("# GPG-Key: {key_url}\n"));

    if let Some(mirror) = basemirror {
        out.push_str("\n# Base Mirror\n");
        out.push_str(&mirror.apt_line(base_url, DIST_STABLE));
        out.push('\n');
    }

    out.push_str("\n# Project Sources\n");
    for entry in sources {
        out.push_str(&entry.source.apt_line(base_url, DIST_STABLE));
        out.push('\n');
        if entry.with_unstable {
            out.push_str(&entry.source.apt_line(base_url, DIST_UNSTABLE));
            out.push('\n');
        }
    }

    out
}
