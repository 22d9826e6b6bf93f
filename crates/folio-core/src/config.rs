//! Editor configuration.
//!
//! Every field has a default, so a JSON document only needs the values it overrides:
//!
//! ```rust
//! use folio_core::EditorConfig;
//!
//! let config = EditorConfig::from_json(r#"{ "margins": { "left": 96 } }"#).unwrap();
//! assert_eq!(config.margins.left, 96.0);
//! assert_eq!(config.margins.right, 72.0);
//! ```

use crate::error::ConfigError;
use crate::layout::{LayoutParams, Margins, PageSetup, TextMetrics};
use crate::render::RenderTheme;
use serde::{Deserialize, Serialize};

/// Page geometry, glyph metrics and colors for an [`Editor`](crate::Editor).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Page size (A4 at 96 DPI by default).
    pub page: PageSetup,
    /// Default document margins.
    pub margins: Margins,
    /// Glyph metrics.
    pub metrics: TextMetrics,
    /// Scene colors.
    pub theme: RenderTheme,
}

impl EditorConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EditorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that the geometry leaves room for text.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let values = [
            ("page.width", self.page.width),
            ("page.height", self.page.height),
            ("margins.left", self.margins.left),
            ("margins.right", self.margins.right),
            ("margins.top", self.margins.top),
            ("margins.bottom", self.margins.bottom),
            ("metrics.base_advance", self.metrics.base_advance),
            ("metrics.line_height", self.metrics.line_height),
            ("metrics.bold_scale", self.metrics.bold_scale),
            ("metrics.italic_scale", self.metrics.italic_scale),
        ];
        for (name, value) in values {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.metrics.base_advance == 0.0 || self.metrics.line_height == 0.0 {
            return Err(ConfigError::Invalid(
                "metrics.base_advance and metrics.line_height must be positive".to_string(),
            ));
        }
        if self.margins.left + self.margins.right >= self.page.width {
            return Err(ConfigError::Invalid(format!(
                "horizontal margins ({} + {}) leave no room on a {} px wide page",
                self.margins.left, self.margins.right, self.page.width
            )));
        }
        if self.margins.top + self.margins.bottom + self.metrics.line_height > self.page.height {
            return Err(ConfigError::Invalid(format!(
                "vertical margins ({} + {}) leave no room for a {} px line on a {} px tall page",
                self.margins.top, self.margins.bottom, self.metrics.line_height, self.page.height
            )));
        }
        Ok(())
    }

    /// Layout parameters derived from this configuration.
    pub fn layout_params(&self) -> LayoutParams {
        LayoutParams {
            page: self.page,
            margins: self.margins,
            metrics: self.metrics,
        }
    }
}
