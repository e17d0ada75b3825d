use crate::config::RenderConfig;
use crate::geometry::Rect;
use crate::routing::HasEdgeAndRect;
use crate::scene::Scene;
use crate::theme::Theme;
use anyhow::Result;
use std::path::Path;

pub fn render_svg(scene: &Scene, theme: &Theme, config: &RenderConfig) -> String {
    let pad = config.padding;
    let bounds = scene
        .bounds()
        .unwrap_or_else(|| Rect::new(0.0, 0.0, config.width, config.height));
    let min_x = bounds.left - pad;
    let min_y = bounds.top - pad;
    let width = (bounds.width() + pad * 2.0).max(200.0);
    let height = (bounds.height() + pad * 2.0).max(200.0);

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.2}\" height=\"{height:.2}\" viewBox=\"{min_x:.2} {min_y:.2} {width:.2} {height:.2}\">",
    ));
    svg.push_str(&format!(
        "<rect x=\"{min_x:.2}\" y=\"{min_y:.2}\" width=\"{width:.2}\" height=\"{height:.2}\" fill=\"{}\"/>",
        config.background
    ));

    for component in scene.components() {
        let r = component.rect;
        svg.push_str(&format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1.2\"/>",
            r.left,
            r.top,
            r.width(),
            r.height(),
            theme.component_fill,
            theme.component_border
        ));
        if config.show_labels {
            let label = component.label.as_deref().unwrap_or(component.id.as_str());
            let center = r.center();
            svg.push_str(&format!(
                "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" dominant-baseline=\"central\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
                center.x,
                center.y,
                escape_xml(&theme.font_family),
                theme.font_size,
                theme.component_text,
                escape_xml(label)
            ));
        }
    }

    for route in scene.routes() {
        svg.push_str(&format!(
            "<path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\" stroke-linejoin=\"round\" data-wire=\"{}\"/>",
            route.svg_path_data(),
            theme.wire_color,
            config.wire_width,
            escape_xml(route.wire.as_str())
        ));
    }

    for pin in scene.pins() {
        let Ok(placed) = scene.placed_pin(&pin.id) else {
            continue;
        };
        let at = placed.connection_point();
        svg.push_str(&format!(
            "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{}\" fill=\"{}\"/>",
            at.x, at.y, config.pin_radius, theme.pin_color
        ));
    }

    svg.push_str("</svg>");
    svg
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.default_size = usvg::Size::from_wh(render_cfg.width as f32, render_cfg.height as f32)
        .or_else(|| usvg::Size::from_wh(800.0, 600.0))
        .ok_or_else(|| anyhow::anyhow!("Invalid render size"))?;

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(not(feature = "png"))]
pub fn write_output_png(_svg: &str, _output: &Path, _render_cfg: &RenderConfig) -> Result<()> {
    anyhow::bail!("PNG output requires the `png` feature")
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
