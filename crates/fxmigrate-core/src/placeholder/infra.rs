//! Output declarations of the legacy infrastructure template.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// `output <name> object = { ... teamsFxPluginId: '<plugin>' ... }`
static PLUGIN_OUTPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"output\s+([A-Za-z_][A-Za-z0-9_]*)\s+object\s*=\s*\{[^}]*?teamsFxPluginId:\s*'([^']+)'")
        .unwrap()
});

/// Map plugin ids to the name of the template output that carries their
/// provisioned values. The first declaration of a plugin wins.
pub fn plugin_outputs(template: &str) -> BTreeMap<String, String> {
    let mut outputs = BTreeMap::new();
    for caps in PLUGIN_OUTPUT.captures_iter(template) {
        outputs
            .entry(caps[2].to_string())
            .or_insert_with(|| caps[1].to_string());
    }
    outputs
}
