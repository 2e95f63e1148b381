use anyhow::Result;
use xmltree::{Element, EmitterConfig, XMLNode};

#[derive(Debug, Clone, PartialEq)]
pub struct Circle {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub fill: String,
}

/// 2D output of a sandbox run. Only records what was drawn.
#[derive(Debug, Clone)]
pub struct DrawingSurface {
    width: u32,
    height: u32,
    fill: String,
    circles: Vec<Circle>,
}

impl DrawingSurface {
    pub const DEFAULT_FILL: &'static str = "#4c97ff";

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            fill: Self::DEFAULT_FILL.to_string(),
            circles: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn circles(&self) -> &[Circle] {
        &self.circles
    }

    pub fn is_blank(&self) -> bool {
        self.circles.is_empty()
    }

    pub fn set_fill(&mut self, fill: &str) {
        self.fill = fill.to_string();
    }

    pub fn clear(&mut self) {
        self.circles.clear();
    }

    /// Records a filled circle. Negative radii are drawn as zero.
    pub fn fill_circle(&mut self, x: f64, y: f64, radius: f64) {
        self.circles.push(Circle {
            x,
            y,
            radius: radius.max(0.0),
            fill: self.fill.clone(),
        });
    }

    pub fn to_svg(&self) -> Result<String> {
        let mut root = Element::new("svg");
        root.attributes
            .insert("xmlns".to_string(), "http://www.w3.org/2000/svg".to_string());
        root.attributes.insert("width".to_string(), self.width.to_string());
        root.attributes.insert("height".to_string(), self.height.to_string());
        root.attributes.insert(
            "viewBox".to_string(),
            format!("0 0 {} {}", self.width, self.height),
        );
        for circle in &self.circles {
            let mut el = Element::new("circle");
            el.attributes.insert("cx".to_string(), svg_number(circle.x));
            el.attributes.insert("cy".to_string(), svg_number(circle.y));
            el.attributes.insert("r".to_string(), svg_number(circle.radius));
            el.attributes.insert("fill".to_string(), circle.fill.clone());
            root.children.push(XMLNode::Element(el));
        }
        let mut out = Vec::new();
        let config = EmitterConfig::new()
            .perform_indent(true)
            .write_document_declaration(false);
        root.write_with_config(&mut out, config)?;
        Ok(String::from_utf8(out)?)
    }
}

impl Default for DrawingSurface {
    fn default() -> Self {
        Self::new(400, 400)
    }
}

fn svg_number(n: f64) -> String {
    if n.is_finite() {
        crate::javascript::format_number(n)
    } else {
        "0".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn svg_lists_every_circle() {
        let mut surface = DrawingSurface::new(100, 50);
        surface.fill_circle(10.0, 20.0, 5.0);
        surface.fill_circle(30.5, 20.0, -1.0);
        let svg = surface.to_svg().unwrap();
        let root = Element::parse(Cursor::new(svg.as_bytes())).unwrap();
        let circles = root
            .children
            .iter()
            .filter_map(|n| n.as_element())
            .collect::<Vec<_>>();
        assert_eq!(circles.len(), 2);
        assert_eq!(circles[0].attributes.get("r").map(String::as_str), Some("5"));
        assert_eq!(circles[1].attributes.get("cx").map(String::as_str), Some("30.5"));
        assert_eq!(circles[1].attributes.get("r").map(String::as_str), Some("0"));
    }

    #[test]
    fn clear_forgets_drawings() {
        let mut surface = DrawingSurface::default();
        surface.fill_circle(1.0, 1.0, 1.0);
        surface.clear();
        assert!(surface.is_blank());
    }
}
