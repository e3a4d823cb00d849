//! Editor configuration derived from the host environment.
//!
//! The host tells us where we run (web, desktop, mobile) and optionally a
//! platform name. Everything else about the editing surface is fixed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Surface option toggled per note from `content.spellcheck`.
pub const SPELLCHECK_OPTION: &str = "spellcheck";

/// Surface option controlling the editor's own selection colouring.
pub const STYLE_SELECTED_TEXT_OPTION: &str = "styleSelectedText";

/// Execution context reported by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostEnvironment {
    #[default]
    Web,
    Desktop,
    Mobile,
}

impl HostEnvironment {
    pub fn is_mobile(&self) -> bool {
        matches!(self, HostEnvironment::Mobile)
    }

    /// Parse an optional host-reported name, falling back to `Web`.
    pub fn from_host(name: Option<&str>) -> Self {
        match name {
            Some(name) => name.parse().unwrap_or_else(|e| {
                tracing::warn!("{}, assuming web", e);
                HostEnvironment::Web
            }),
            None => HostEnvironment::Web,
        }
    }
}

impl Display for HostEnvironment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            HostEnvironment::Web => "web",
            HostEnvironment::Desktop => "desktop",
            HostEnvironment::Mobile => "mobile",
        };
        f.write_str(name)
    }
}

impl FromStr for HostEnvironment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web" => Ok(HostEnvironment::Web),
            "desktop" => Ok(HostEnvironment::Desktop),
            "mobile" => Ok(HostEnvironment::Mobile),
            other => Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
    }
}

/// How the surface captures keyboard input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputStyle {
    #[serde(rename = "textarea")]
    Textarea,
    #[serde(rename = "contenteditable")]
    ContentEditable,
}

impl InputStyle {
    /// Mobile keyboards behave better with a hidden textarea.
    pub fn for_environment(environment: HostEnvironment) -> Self {
        if environment.is_mobile() {
            InputStyle::Textarea
        } else {
            InputStyle::ContentEditable
        }
    }
}

/// Options handed to the editing surface when it is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Syntax mode (GitHub-flavoured markdown)
    pub mode: String,
    pub line_wrapping: bool,
    /// Key chord -> editor command
    pub extra_keys: BTreeMap<String, String>,
    pub input_style: InputStyle,
    /// Selection colouring is left to the platform on mobile
    pub style_selected_text: bool,
    /// Host platform name, applied by the host as a CSS class
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_class: Option<String>,
}

impl EditorConfig {
    pub fn for_host(environment: HostEnvironment, platform: Option<String>) -> Self {
        let mut extra_keys = BTreeMap::new();
        extra_keys.insert("Alt-F".to_string(), "findPersistent".to_string());

        Self {
            mode: "gfm".to_string(),
            line_wrapping: true,
            extra_keys,
            input_style: InputStyle::for_environment(environment),
            style_selected_text: !environment.is_mobile(),
            platform_class: platform.filter(|p| !p.is_empty()),
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self::for_host(HostEnvironment::default(), None)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown host environment: {0}")]
    UnknownEnvironment(String),
}
