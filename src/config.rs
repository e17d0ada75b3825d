use crate::routing::CrossingMode;
use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Gap kept between a wire and any component it routes around.
    pub clearance: f64,
    /// Length of the straight stub leaving a pin perpendicular to its edge.
    pub approach_clearance: f64,
    /// Distance between parallel wires sharing a track.
    pub lane_spacing: f64,
    /// Tolerance used when deciding that two segments share a track.
    pub overlap_tolerance: f64,
    pub max_detour_passes: usize,
    /// Swap endpoints so routes always run left to right.
    pub canonical_order: bool,
    pub crossings: CrossingMode,
    pub bump_size: f64,
    /// Background worker count, 0 lets rayon decide.
    pub worker_threads: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            clearance: 30.0,
            approach_clearance: 20.0,
            lane_spacing: 10.0,
            overlap_tolerance: 1.0,
            max_detour_passes: 4,
            canonical_order: true,
            crossings: CrossingMode::Off,
            bump_size: 8.0,
            worker_threads: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f64,
    pub height: f64,
    pub padding: f64,
    pub wire_width: f64,
    pub pin_radius: f64,
    pub show_labels: bool,
    pub background: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            padding: 40.0,
            wire_width: 2.0,
            pin_radius: 3.0,
            show_labels: true,
            background: "#FFFFFF".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub router: RouterConfig,
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        let theme = Theme::classic();
        let render = RenderConfig {
            background: theme.background.clone(),
            ..Default::default()
        };
        Self {
            theme,
            router: RouterConfig::default(),
            render,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    router: Option<RouterConfigFile>,
    render: Option<RenderConfigFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f64>,
    component_fill: Option<String>,
    component_border: Option<String>,
    component_text: Option<String>,
    pin_color: Option<String>,
    wire_color: Option<String>,
    background: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouterConfigFile {
    clearance: Option<f64>,
    approach_clearance: Option<f64>,
    lane_spacing: Option<f64>,
    overlap_tolerance: Option<f64>,
    max_detour_passes: Option<usize>,
    canonical_order: Option<bool>,
    crossings: Option<CrossingMode>,
    bump_size: Option<f64>,
    worker_threads: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderConfigFile {
    width: Option<f64>,
    height: Option<f64>,
    padding: Option<f64>,
    wire_width: Option<f64>,
    pin_radius: Option<f64>,
    show_labels: Option<bool>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = serde_json::from_str(contents)?;

    if let Some(theme_name) = parsed.theme.as_deref() {
        match Theme::by_name(theme_name) {
            Some(theme) => config.theme = theme,
            None => tracing::warn!("unknown theme `{theme_name}`, keeping the default"),
        }
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            config.theme.font_size = v;
        }
        if let Some(v) = vars.component_fill {
            config.theme.component_fill = v;
        }
        if let Some(v) = vars.component_border {
            config.theme.component_border = v;
        }
        if let Some(v) = vars.component_text {
            config.theme.component_text = v;
        }
        if let Some(v) = vars.pin_color {
            config.theme.pin_color = v;
        }
        if let Some(v) = vars.wire_color {
            config.theme.wire_color = v;
        }
        if let Some(v) = vars.background {
            config.theme.background = v;
        }
    }

    if let Some(router) = parsed.router {
        if let Some(v) = router.clearance {
            config.router.clearance = v.max(0.0);
        }
        if let Some(v) = router.approach_clearance {
            config.router.approach_clearance = v.max(0.0);
        }
        if let Some(v) = router.lane_spacing {
            config.router.lane_spacing = v.max(0.0);
        }
        if let Some(v) = router.overlap_tolerance {
            config.router.overlap_tolerance = v.max(0.0);
        }
        if let Some(v) = router.max_detour_passes {
            config.router.max_detour_passes = v;
        }
        if let Some(v) = router.canonical_order {
            config.router.canonical_order = v;
        }
        if let Some(v) = router.crossings {
            config.router.crossings = v;
        }
        if let Some(v) = router.bump_size {
            config.router.bump_size = v.max(0.0);
        }
        if let Some(v) = router.worker_threads {
            config.router.worker_threads = v;
        }
    }

    if let Some(render) = parsed.render {
        if let Some(v) = render.width {
            config.render.width = v;
        }
        if let Some(v) = render.height {
            config.render.height = v;
        }
        if let Some(v) = render.padding {
            config.render.padding = v;
        }
        if let Some(v) = render.wire_width {
            config.render.wire_width = v;
        }
        if let Some(v) = render.pin_radius {
            config.render.pin_radius = v;
        }
        if let Some(v) = render.show_labels {
            config.render.show_labels = v;
        }
    }

    config.render.background = config.theme.background.clone();

    Ok(config)
}
