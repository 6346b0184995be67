use std::fmt::Write as _;

use tracing::{debug, error, info, warn};

use crate::api::ApiClient;
use crate::datastore::DataStore;
use crate::error::{ClientError, ClientResult};
use crate::session::AuthState;

/// CSS custom properties every palette assigns, in declaration order.
pub const THEME_VARIABLES: [&str; 23] = [
    "--primary-color",
    "--primary-light",
    "--primary-dark",
    "--primary-rgb",
    "--secondary-color",
    "--background-color",
    "--card-color",
    "--card-bg",
    "--text-color",
    "--text-secondary",
    "--text-on-primary",
    "--border-color",
    "--success-color",
    "--danger-color",
    "--warning-color",
    "--info-color",
    "--datepicker-bg",
    "--datepicker-text-color",
    "--datepicker-hover-bg",
    "--datepicker-active-text-color",
    "--icon-color",
    "--icon-primary",
    "--icon-secondary",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub name: &'static str,
    values: [&'static str; 23],
}

impl Palette {
    pub fn colors(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        THEME_VARIABLES.iter().copied().zip(self.values.iter().copied())
    }

    pub fn color(&self, variable: &str) -> Option<&'static str> {
        self.colors().find(|(var, _)| *var == variable).map(|(_, value)| value)
    }
}

/// Built-in palettes. A palette's 1-based position is its id on the server,
/// so the order is fixed.
pub static PALETTES: [Palette; 6] = [
    Palette {
        name: "Azure",
        values: [
            "#3498db", "#5dade2", "#ffffff", "52, 152, 219", "#2ecc71", "#f5f7fa", "#ffffff",
            "#ffffff", "#3c4858", "#8492a6", "#ffffff", "#e0e6ed", "#67c23a", "#f56c6c",
            "#e6a23c", "#909399", "#ffffff", "#3c4858", "#ecf5ff", "#ffffff", "#3c4858",
            "#3498db", "#8492a6",
        ],
    },
    Palette {
        name: "Ink Jade",
        values: [
            "#409eff", "#66b1ff", "#ffffff", "64, 158, 255", "#85ce61", "#1d1e20", "#2c2f33",
            "#363a3f", "#dcdfe6", "#a0a5ac", "#ffffff", "#41454a", "#67c23a", "#f56c6c",
            "#e6a23c", "#909399", "#363a3f", "#dcdfe6", "#41454a", "#ffffff", "#dcdfe6",
            "#409eff", "#a0a5ac",
        ],
    },
    Palette {
        name: "Rouge",
        values: [
            "#c74c3c", "#e74c3c", "#ffffff", "199, 76, 60", "#d35400", "#fdf6f5", "#ffffff",
            "#ffffff", "#5a2a27", "#a1665e", "#ffffff", "#f8e9e7", "#27ae60", "#c0392b",
            "#f39c12", "#c74c3c", "#fffafa", "#5a2a27", "#f8e9e7", "#ffffff", "#5a2a27",
            "#c74c3c", "#a1665e",
        ],
    },
    Palette {
        name: "Gamboge",
        values: [
            "#f39c12", "#f1c40f", "#ffffff", "243, 156, 18", "#e67e22", "#fffcf5", "#ffffff",
            "#ffffff", "#79550a", "#b18933", "#ffffff", "#faebcc", "#27ae60", "#c0392b",
            "#f39c12", "#f39c12", "#fffef9", "#79550a", "#faebcc", "#ffffff", "#79550a",
            "#f39c12", "#b18933",
        ],
    },
    Palette {
        name: "Violet",
        values: [
            "#8e44ad", "#9b59b6", "#ffffff", "142, 68, 173", "#c39bd3", "#fbf5ff", "#ffffff",
            "#ffffff", "#4a148c", "#884ea0", "#ffffff", "#f2e7fe", "#27ae60", "#c0392b",
            "#f39c12", "#8e44ad", "#fdfaff", "#4a148c", "#f2e7fe", "#ffffff", "#4a148c",
            "#8e44ad", "#884ea0",
        ],
    },
    Palette {
        name: "Celadon",
        values: [
            "#1abc9c", "#48c9b0", "#ffffff", "26, 188, 156", "#76d7c4", "#f4fcfb", "#ffffff",
            "#ffffff", "#0e6251", "#54998c", "#ffffff", "#d1f2eb", "#27ae60", "#c0392b",
            "#f39c12", "#1abc9c", "#f8fefd", "#0e6251", "#d1f2eb", "#ffffff", "#0e6251",
            "#1abc9c", "#54998c",
        ],
    },
];

/// The root style scope palettes are written onto.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootStyle {
    properties: Vec<(String, String)>,
}

impl RootStyle {
    pub fn set_property(&mut self, name: &str, value: &str) {
        match self.properties.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.properties.push((name.to_string(), value.to_string())),
        }
    }

    pub fn get_property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn to_css(&self) -> String {
        let mut css = String::from(":root {\n");
        for (name, value) in &self.properties {
            let _ = writeln!(css, "  {name}: {value};");
        }
        css.push_str("}\n");
        css
    }
}

#[derive(Debug, Clone, Default)]
pub struct ThemeSwitcher {
    active: usize,
    root: RootStyle,
}

impl ThemeSwitcher {
    pub fn palettes(&self) -> &'static [Palette] {
        &PALETTES
    }

    pub fn current(&self) -> &'static Palette {
        &PALETTES[self.active.min(PALETTES.len() - 1)]
    }

    pub fn active_name(&self) -> &'static str {
        self.current().name
    }

    pub fn root_style(&self) -> &RootStyle {
        &self.root
    }

    /// 1-based palette id for a name, ignoring case.
    pub fn find(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        PALETTES
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name))
            .map(|idx| idx + 1)
    }

    /// Applies a palette by name. When logged in the choice is also saved to
    /// the server and the session; a failed save keeps the new palette.
    pub async fn apply(
        &mut self,
        name: &str,
        api: &ApiClient,
        auth: &mut AuthState,
        storage: &mut DataStore,
    ) -> ClientResult<&'static Palette> {
        let Some(theme_id) = self.find(name) else {
            api.notifier().error("Theme not found");
            return Err(ClientError::ThemeNotFound(name.to_string()));
        };
        self.paint(theme_id - 1);

        if !auth.is_authenticated() {
            debug!(theme = self.active_name(), "applied locally only");
            return Ok(self.current());
        }

        match api.update_theme(auth.token(), theme_id).await {
            Ok(()) => {
                if let Err(err) = auth.set_theme(storage, theme_id as i64) {
                    error!(error = %err, "failed to store theme in session");
                }
            }
            Err(err) => {
                error!(error = %err, theme_id, "failed to save theme on server");
            }
        }
        Ok(self.current())
    }

    /// Applies the session's palette when it names a known one, else the
    /// first palette.
    pub fn init(&mut self, auth: &AuthState) -> &'static Palette {
        let idx = auth
            .theme_id()
            .filter(|id| (1..=PALETTES.len() as i64).contains(id))
            .map_or(0, |id| (id - 1) as usize);
        if idx == 0 && auth.theme_id().is_some_and(|id| id != 1) {
            warn!(theme = ?auth.theme_id(), "unknown theme id; using default");
        }
        self.paint(idx);
        self.current()
    }

    fn paint(&mut self, idx: usize) {
        let palette = &PALETTES[idx];
        for (name, value) in palette.colors() {
            self.root.set_property(name, value);
        }
        self.active = idx;
        info!(theme = palette.name, "theme applied");
    }
}
