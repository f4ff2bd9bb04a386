//! User configuration file.
//!
//! `<threeDepictconfig>` holds the recent-file list, default parameter
//! blocks for filters, and which panels to show at startup. Filter
//! defaults are stored as the filters' own state elements; only
//! non-hazardous filters belong here, and every filter in this engine
//! qualifies (none execute external programs).

use ionvue_filters::xml::{XmlElem, XmlError};
use std::path::{Path, PathBuf};
use thiserror::Error;

const ROOT_TAG: &str = "threeDepictconfig";

/// Bound on the recent-files list.
pub const MAX_RECENT: usize = 9;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Xml(#[from] XmlError),

    #[error("Not a config file (root tag is not {ROOT_TAG})")]
    BadRoot,
}

/// Panels shown when the application starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupPanels {
    /// 0 = remember, 1 = show listed, 2 = show all.
    pub mode: u32,
    pub raw_data: bool,
    pub control: bool,
    pub plot_list: bool,
}

impl Default for StartupPanels {
    fn default() -> Self {
        Self {
            mode: 0,
            raw_data: true,
            control: true,
            plot_list: true,
        }
    }
}

/// The persisted user configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    recent: Vec<PathBuf>,
    /// Per-filter default parameter blocks, keyed by element name.
    pub filter_defaults: Vec<XmlElem>,
    pub startup_panels: StartupPanels,
}

impl ConfigFile {
    pub fn new() -> Self {
        Self {
            startup_panels: StartupPanels::default(),
            ..Default::default()
        }
    }

    pub fn recent_files(&self) -> &[PathBuf] {
        &self.recent
    }

    /// Add to the front of the MRU list, dropping duplicates and
    /// trimming to [`MAX_RECENT`].
    pub fn add_recent(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.recent.retain(|p| *p != path);
        self.recent.insert(0, path);
        self.recent.truncate(MAX_RECENT);
    }

    pub fn remove_recent(&mut self, path: &Path) {
        self.recent.retain(|p| p != path);
    }

    /// Default parameters recorded for a filter type, if any.
    pub fn default_for(&self, type_string: &str) -> Option<&XmlElem> {
        self.filter_defaults.iter().find(|e| e.name == type_string)
    }

    /// Record a filter's current state as the default for its type.
    pub fn set_default(&mut self, state: XmlElem) {
        self.filter_defaults.retain(|e| e.name != state.name);
        self.filter_defaults.push(state);
    }

    pub fn to_xml(&self) -> XmlElem {
        let mut root = XmlElem::new(ROOT_TAG);
        let mut recent = XmlElem::new("recent");
        for path in &self.recent {
            recent = recent.child(XmlElem::new("file").attr("name", path.display()));
        }
        root = root.child(recent);

        let mut defaults = XmlElem::new("filterdefaults");
        for elem in &self.filter_defaults {
            defaults = defaults.child(elem.clone());
        }
        root = root.child(defaults);

        root.child(
            XmlElem::new("startuppanels")
                .attr("mode", self.startup_panels.mode)
                .attr("rawdata", self.startup_panels.raw_data as u8)
                .attr("control", self.startup_panels.control as u8)
                .attr("plotlist", self.startup_panels.plot_list as u8),
        )
    }

    pub fn from_xml(root: &XmlElem) -> Result<Self, ConfigError> {
        if root.name != ROOT_TAG {
            return Err(ConfigError::BadRoot);
        }
        let mut config = Self::new();
        if let Some(recent) = root.get_child("recent") {
            for file in recent.get_children("file") {
                if let Some(name) = file.get_attr("name") {
                    config.recent.push(PathBuf::from(name));
                }
            }
            config.recent.truncate(MAX_RECENT);
        }
        if let Some(defaults) = root.get_child("filterdefaults") {
            config.filter_defaults = defaults
                .children
                .iter()
                // Only known filter elements are kept; anything else in
                // the config is silently dropped.
                .filter(|e| ionvue_filters::FilterType::from_type_string(&e.name).is_some())
                .cloned()
                .collect();
        }
        if let Some(panels) = root.get_child("startuppanels") {
            config.startup_panels = StartupPanels {
                mode: panels.parse_attr("mode").unwrap_or(0),
                raw_data: panels.parse_attr::<u8>("rawdata").unwrap_or(1) != 0,
                control: panels.parse_attr::<u8>("control").unwrap_or(1) != 0,
                plot_list: panels.parse_attr::<u8>("plotlist").unwrap_or(1) != 0,
            };
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_xml().to_document()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_xml(&XmlElem::parse_document(&text)?)
    }
}
