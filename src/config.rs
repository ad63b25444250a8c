//! Instance configuration
//!
//! Configuration captured at instance creation and applied during the
//! initialization handshake.

use serde::{Deserialize, Serialize};

/// Configuration for one web view instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Name of the host-side object that consumes this instance's events
    pub host_object: String,
    /// Render with a transparent background
    pub transparent: bool,
    /// Enable user zoom controls
    pub zoom_enabled: bool,
    /// View width in pixels (default: 960)
    pub width: u32,
    /// View height in pixels (default: 600)
    pub height: u32,
    /// User agent override (None = engine default)
    pub user_agent: Option<String>,
    /// Run as a separated top-level window instead of an embedded view
    pub separated: bool,
    /// Forward pointer/keyboard input (default: true)
    pub interaction_enabled: bool,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            host_object: String::new(),
            transparent: false,
            zoom_enabled: true,
            width: 960,
            height: 600,
            user_agent: None,
            separated: false,
            interaction_enabled: true,
        }
    }
}

impl InstanceConfig {
    /// Create a new config builder
    pub fn builder() -> InstanceConfigBuilder {
        InstanceConfigBuilder::default()
    }
}

/// Builder for InstanceConfig
#[derive(Default)]
pub struct InstanceConfigBuilder {
    config: InstanceConfig,
}

impl InstanceConfigBuilder {
    /// Set the host object name
    pub fn host_object<S: Into<String>>(mut self, name: S) -> Self {
        self.config.host_object = name.into();
        self
    }

    /// Enable/disable transparent background
    pub fn transparent(mut self, transparent: bool) -> Self {
        self.config.transparent = transparent;
        self
    }

    /// Enable/disable zoom controls
    pub fn zoom_enabled(mut self, zoom: bool) -> Self {
        self.config.zoom_enabled = zoom;
        self
    }

    /// Set view dimensions; zero falls back to the defaults
    pub fn size(mut self, width: u32, height: u32) -> Self {
        if width > 0 {
            self.config.width = width;
        }
        if height > 0 {
            self.config.height = height;
        }
        self
    }

    /// Set the user agent
    pub fn user_agent<S: Into<String>>(mut self, ua: S) -> Self {
        self.config.user_agent = Some(ua.into());
        self
    }

    /// Run as a separated top-level window
    pub fn separated(mut self, separated: bool) -> Self {
        self.config.separated = separated;
        self
    }

    /// Enable/disable input forwarding
    pub fn interaction_enabled(mut self, enabled: bool) -> Self {
        self.config.interaction_enabled = enabled;
        self
    }

    /// Build the config
    pub fn build(self) -> InstanceConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = InstanceConfig::default();
        assert_eq!(config.width, 960);
        assert_eq!(config.height, 600);
        assert!(!config.transparent);
        assert!(config.zoom_enabled);
        assert!(!config.separated);
        assert!(config.interaction_enabled);
        assert!(config.user_agent.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = InstanceConfig::builder()
            .host_object("WebViewObject")
            .transparent(true)
            .zoom_enabled(false)
            .size(1280, 720)
            .user_agent("HostView/1.0")
            .separated(true)
            .interaction_enabled(false)
            .build();

        assert_eq!(config.host_object, "WebViewObject");
        assert!(config.transparent);
        assert!(!config.zoom_enabled);
        assert_eq!(config.width, 1280);
        assert_eq!(config.height, 720);
        assert_eq!(config.user_agent, Some("HostView/1.0".to_string()));
        assert!(config.separated);
        assert!(!config.interaction_enabled);
    }

    #[test]
    fn test_zero_size_keeps_defaults() {
        let config = InstanceConfig::builder().size(0, 0).build();
        assert_eq!(config.width, 960);
        assert_eq!(config.height, 600);
    }
}
