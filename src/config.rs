use serde::{Deserialize, Serialize};

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

// ── Final (merged) config types ──

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub rules: RuleTables,
    #[serde(default)]
    pub consent: ConsentConfig,
    #[serde(default)]
    pub manifest: ManifestConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default = "default_oracle_model")]
    pub oracle_model: String,
    #[serde(default = "default_context_turns")]
    pub context_turns: usize,
    #[serde(default = "default_consent_scan_turns")]
    pub consent_scan_turns: usize,
}

fn default_oracle_model() -> String {
    "haiku".into()
}

fn default_context_turns() -> usize {
    6
}

fn default_consent_scan_turns() -> usize {
    3
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            oracle_model: default_oracle_model(),
            context_turns: default_context_turns(),
            consent_scan_turns: default_consent_scan_turns(),
        }
    }
}

/// Ordered, domain-tagged pattern groups. Order within each category is
/// preserved from the TOML; modifying is always consulted before readonly.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct RuleTables {
    #[serde(default)]
    pub readonly: Vec<PatternGroup>,
    #[serde(default)]
    pub modifying: Vec<PatternGroup>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PatternGroup {
    pub domain: String,
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct ConsentConfig {
    #[serde(default)]
    pub exact: Vec<String>,
    #[serde(default)]
    pub contains: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct ManifestConfig {
    #[serde(default)]
    pub builtin_subcommands: Vec<String>,
}

// ── Overlay types (user config that merges with defaults) ──

#[derive(Debug, Deserialize, Default)]
struct ConfigOverlay {
    #[serde(default)]
    settings: SettingsOverlay,
    #[serde(default)]
    rules: RulesOverlay,
    #[serde(default)]
    consent: ConsentOverlay,
    #[serde(default)]
    manifest: ManifestOverlay,
}

#[derive(Debug, Deserialize, Default)]
struct SettingsOverlay {
    oracle_model: Option<String>,
    context_turns: Option<usize>,
    consent_scan_turns: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct RulesOverlay {
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    readonly: Vec<PatternGroup>,
    #[serde(default)]
    modifying: Vec<PatternGroup>,
    /// Domains to drop from the default tables (both categories).
    #[serde(default)]
    remove_domains: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ConsentOverlay {
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    exact: Vec<String>,
    #[serde(default)]
    contains: Vec<String>,
    #[serde(default)]
    remove_exact: Vec<String>,
    #[serde(default)]
    remove_contains: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ManifestOverlay {
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    builtin_subcommands: Vec<String>,
    #[serde(default)]
    remove_builtin_subcommands: Vec<String>,
}

// ── Merge logic ──

/// Merge a user list into a default list.
/// In replace mode: user list replaces default entirely.
/// In merge mode: remove items first, then extend with additions (deduped).
fn merge_list(base: &mut Vec<String>, add: Vec<String>, remove: &[String], replace: bool) {
    if replace {
        *base = add;
    } else {
        base.retain(|item| !remove.contains(item));
        for item in add {
            if !base.contains(&item) {
                base.push(item);
            }
        }
    }
}

/// Merge pattern groups: same-domain groups extend, new domains append.
fn merge_groups(
    base: &mut Vec<PatternGroup>,
    add: Vec<PatternGroup>,
    remove_domains: &[String],
    replace: bool,
) {
    if replace {
        *base = add;
        return;
    }
    base.retain(|g| !remove_domains.contains(&g.domain));
    for group in add {
        if let Some(existing) = base.iter_mut().find(|g| g.domain == group.domain) {
            for p in group.patterns {
                if !existing.patterns.contains(&p) {
                    existing.patterns.push(p);
                }
            }
        } else {
            base.push(group);
        }
    }
}

impl Config {
    /// Load the default embedded configuration.
    pub fn default_config() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }

    /// Load configuration with resolution order:
    /// 1. Start with embedded defaults
    /// 2. Merge user overlay from ~/.config/cc-smartgate/config.toml (if exists)
    ///
    /// User config merges with defaults: lists extend, scalars override.
    /// Set `replace = true` in a section to replace its defaults entirely.
    pub fn load() -> Self {
        let mut config = Self::default_config();
        if let Some(overlay) = Self::load_overlay() {
            config.apply_overlay(overlay);
        }
        config
    }

    fn load_overlay() -> Option<ConfigOverlay> {
        let path = crate::store::config_dir()?.join("config.toml");
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(overlay) => Some(overlay),
            Err(e) => {
                eprintln!("cc-smartgate: config parse error: {e}");
                None
            }
        }
    }

    /// Apply an overlay on top of this config (merge semantics).
    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        let s = overlay.settings;
        if let Some(v) = s.oracle_model {
            self.settings.oracle_model = v;
        }
        if let Some(v) = s.context_turns {
            self.settings.context_turns = v;
        }
        if let Some(v) = s.consent_scan_turns {
            self.settings.consent_scan_turns = v;
        }

        let r = overlay.rules;
        merge_groups(
            &mut self.rules.readonly,
            r.readonly,
            &r.remove_domains,
            r.replace,
        );
        merge_groups(
            &mut self.rules.modifying,
            r.modifying,
            &r.remove_domains,
            r.replace,
        );

        let c = overlay.consent;
        merge_list(&mut self.consent.exact, c.exact, &c.remove_exact, c.replace);
        merge_list(
            &mut self.consent.contains,
            c.contains,
            &c.remove_contains,
            c.replace,
        );

        let m = overlay.manifest;
        merge_list(
            &mut self.manifest.builtin_subcommands,
            m.builtin_subcommands,
            &m.remove_builtin_subcommands,
            m.replace,
        );
    }

    /// Apply an overlay from a TOML string. Used for testing.
    #[cfg(test)]
    fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }
}
