use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f64,
    pub component_fill: String,
    pub component_border: String,
    pub component_text: String,
    pub pin_color: String,
    pub wire_color: String,
    pub background: String,
}

impl Theme {
    /// Black wires on white, as the schematic editor draws them.
    pub fn classic() -> Self {
        Self {
            font_family: "\"trebuchet ms\", verdana, arial, sans-serif".to_string(),
            font_size: 14.0,
            component_fill: "#F4F4F4".to_string(),
            component_border: "#333333".to_string(),
            component_text: "#111111".to_string(),
            pin_color: "#B03030".to_string(),
            wire_color: "#000000".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            component_fill: "#F8FAFF".to_string(),
            component_border: "#C7D2E5".to_string(),
            component_text: "#1C2430".to_string(),
            pin_color: "#4F6BED".to_string(),
            wire_color: "#7A8AA6".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "modern" => Some(Self::modern()),
            "classic" | "default" | "base" => Some(Self::classic()),
            _ => None,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::classic()
    }
}
