use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::model::{ConfigOverlay, WorkflowConfig};

/// How an overlay may change the base it is merged onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// New keys are added, existing keys are replaced.
    Extend,
    /// Existing keys are replaced; a key the base does not know is an error.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOverrideKeys {
    pub keys: Vec<String>,
}

impl fmt::Display for UnknownOverrideKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "override introduces keys missing from the base config: {}",
            self.keys.join(", ")
        )
    }
}

impl std::error::Error for UnknownOverrideKeys {}

/// Applies `overlay` onto `base` entry by entry; overlay values win.
pub fn merge_config(
    mut base: WorkflowConfig,
    overlay: ConfigOverlay,
    mode: MergeMode,
) -> Result<WorkflowConfig, UnknownOverrideKeys> {
    let mut unknown = Vec::new();
    merge_category("ACTIONS", &mut base.actions, overlay.actions, mode, &mut unknown);
    merge_category("COMMANDS", &mut base.commands, overlay.commands, mode, &mut unknown);
    merge_category("PACKAGES", &mut base.packages, overlay.packages, mode, &mut unknown);
    merge_category(
        "UI_ELEMENTS",
        &mut base.ui_elements,
        overlay.ui_elements,
        mode,
        &mut unknown,
    );
    merge_category("WORKFLOWS", &mut base.workflows, overlay.workflows, mode, &mut unknown);

    if unknown.is_empty() {
        Ok(base)
    } else {
        Err(UnknownOverrideKeys { keys: unknown })
    }
}

fn merge_category<V>(
    category: &str,
    base: &mut BTreeMap<String, V>,
    overlay: Option<BTreeMap<String, V>>,
    mode: MergeMode,
    unknown: &mut Vec<String>,
) {
    let Some(overlay) = overlay else {
        return;
    };
    for (key, value) in overlay {
        if mode == MergeMode::Strict && !base.contains_key(&key) {
            unknown.push(format!("{category}.{key}"));
            continue;
        }
        base.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> WorkflowConfig {
        serde_json::from_value(json!({
            "ACTIONS": { "A": "a" },
            "COMMANDS": { "GO_HOME": "input keyevent 3", "REBOOT": "reboot" },
            "PACKAGES": { "SETTINGS": "com.android.settings" },
            "UI_ELEMENTS": { "OK": { "TEXT": "OK" } },
            "WORKFLOWS": { "HOME": [{ "TYPE": "PRESS", "CONFIG": { "TEXT": "HOME" } }] }
        }))
        .expect("base")
    }

    fn overlay(value: serde_json::Value) -> ConfigOverlay {
        serde_json::from_value(value).expect("overlay")
    }

    #[test]
    fn extend_merge_unions_with_override_precedence() {
        let merged = merge_config(
            base(),
            overlay(json!({
                "COMMANDS": { "GO_HOME": "am start -c android.intent.category.HOME", "LIST": "ls" },
                "PACKAGES": { "DIALER": "com.android.dialer" }
            })),
            MergeMode::Extend,
        )
        .expect("merge");

        assert_eq!(merged.commands["GO_HOME"], "am start -c android.intent.category.HOME");
        assert_eq!(merged.commands["REBOOT"], "reboot");
        assert_eq!(merged.commands["LIST"], "ls");
        assert_eq!(merged.packages.len(), 2);
        assert_eq!(merged.actions["A"], "a");
        assert!(merged.workflows.contains_key("HOME"));
    }

    #[test]
    fn strict_merge_replaces_known_keys() {
        let merged = merge_config(
            base(),
            overlay(json!({ "UI_ELEMENTS": { "OK": { "DESCRIPTION": "Confirm" } } })),
            MergeMode::Strict,
        )
        .expect("merge");
        assert_eq!(merged.ui_elements["OK"].value, "Confirm");
    }

    #[test]
    fn strict_merge_rejects_every_unknown_key() {
        let err = merge_config(
            base(),
            overlay(json!({
                "PACKAGES": { "SETTINGS": "com.android.car.settings", "SETTNGS": "typo" },
                "WORKFLOWS": { "NEW_FLOW": [] }
            })),
            MergeMode::Strict,
        )
        .expect_err("unknown keys");
        assert_eq!(err.keys, vec!["PACKAGES.SETTNGS", "WORKFLOWS.NEW_FLOW"]);
        assert!(err.to_string().contains("PACKAGES.SETTNGS"));
    }

    #[test]
    fn empty_overlay_leaves_base_untouched() {
        let merged = merge_config(base(), ConfigOverlay::default(), MergeMode::Strict).expect("merge");
        assert_eq!(merged, base());
    }
}
