use crate::error::{FolioError, Result};
use crate::font::FontRegistry;
use crate::pdf::fmt_pt;
use crate::spec::{Border, BorderStyle, DashPattern, Extent, FontSpec, Side};
use crate::types::{Color, Edges, Pt, Size};
use roxmltree::{Document, Node};
use std::fmt::Write as _;

pub trait XmlAttributes: Sized {
    fn write_xml(&self, tag: &str) -> String;
    fn read_xml(node: Node<'_, '_>) -> Result<Self>;

    fn from_xml_str(xml: &str) -> Result<Self> {
        let doc = Document::parse(xml)?;
        Self::read_xml(doc.root_element())
    }
}

impl XmlAttributes for Edges {
    fn write_xml(&self, tag: &str) -> String {
        format!(
            r#"<{tag} top="{}" right="{}" bottom="{}" left="{}"/>"#,
            fmt_pt(self.top),
            fmt_pt(self.right),
            fmt_pt(self.bottom),
            fmt_pt(self.left)
        )
    }

    fn read_xml(node: Node<'_, '_>) -> Result<Self> {
        Ok(Edges {
            top: optional_length(node, "top")?.unwrap_or(Pt::ZERO),
            right: optional_length(node, "right")?.unwrap_or(Pt::ZERO),
            bottom: optional_length(node, "bottom")?.unwrap_or(Pt::ZERO),
            left: optional_length(node, "left")?.unwrap_or(Pt::ZERO),
        })
    }
}

impl XmlAttributes for Size {
    fn write_xml(&self, tag: &str) -> String {
        format!(
            r#"<{tag} width="{}" height="{}"/>"#,
            fmt_pt(self.width),
            fmt_pt(self.height)
        )
    }

    fn read_xml(node: Node<'_, '_>) -> Result<Self> {
        let width = required_length(node, "width")?;
        let height = required_length(node, "height")?;
        if width < Pt::ZERO || height < Pt::ZERO {
            return Err(FolioError::config(format!(
                "<{}> must not be negative",
                node.tag_name().name()
            )));
        }
        Ok(Size::new(width, height))
    }
}

impl XmlAttributes for Extent {
    fn write_xml(&self, tag: &str) -> String {
        let unit = self.unit_name();
        match self {
            Extent::Auto | Extent::Star => format!(r#"<{tag} unit="{unit}"/>"#),
            Extent::Percentage(value) => format!(r#"<{tag} unit="{unit}" value="{value}"/>"#),
            Extent::Absolute(value) => {
                format!(r#"<{tag} unit="{unit}" value="{}"/>"#, fmt_pt(*value))
            }
        }
    }

    fn read_xml(node: Node<'_, '_>) -> Result<Self> {
        let unit = node.attribute("unit").unwrap_or("auto");
        match unit {
            "auto" => Ok(Extent::Auto),
            "star" => Ok(Extent::Star),
            "percentage" => Extent::percentage(required_number(node, "value")?),
            "absolute" => Extent::absolute(required_number(node, "value")?),
            other => Err(FolioError::config(format!("unknown width unit {other:?}"))),
        }
    }
}

impl XmlAttributes for Border {
    fn write_xml(&self, tag: &str) -> String {
        let mut out = format!("<{tag}>");
        for (side, style) in self.sides() {
            let Some(style) = style else {
                continue;
            };
            let _ = write!(
                out,
                r#"<{} color="{}" width="{}""#,
                side.name(),
                style.color.to_hex(),
                fmt_pt(style.width)
            );
            if !style.dash.is_solid() {
                let dash = style
                    .dash
                    .segments
                    .iter()
                    .map(|v| fmt_pt(*v))
                    .collect::<Vec<_>>()
                    .join(" ");
                let _ = write!(out, r#" dash="{}" phase="{}""#, dash, fmt_pt(style.dash.phase));
            }
            out.push_str("/>");
        }
        let _ = write!(out, "</{tag}>");
        out
    }

    fn read_xml(node: Node<'_, '_>) -> Result<Self> {
        let mut border = Border::none();
        for child in node.children().filter(|child| child.is_element()) {
            let side = match child.tag_name().name() {
                "top" => Side::Top,
                "right" => Side::Right,
                "bottom" => Side::Bottom,
                "left" => Side::Left,
                other => {
                    return Err(FolioError::Persist(format!("unexpected border side <{other}>")));
                }
            };
            *border.side_mut(side) = Some(border_style(child)?);
        }
        Ok(border)
    }
}

fn border_style(node: Node<'_, '_>) -> Result<BorderStyle> {
    let color = optional_color(node)?.unwrap_or(Color::BLACK);
    let width = required_number(node, "width")?;
    let mut style = BorderStyle::new(color, width)?;
    if let Some(raw) = node.attribute("dash") {
        let segments = raw
            .split_whitespace()
            .map(|part| parse_number("dash", part))
            .collect::<Result<Vec<_>>>()?;
        let phase = optional_number(node, "phase")?.unwrap_or(0.0);
        style = style.with_dash(DashPattern::new(phase, &segments)?);
    }
    Ok(style)
}

/// Fonts are stored by registered name, so reading needs the registry.
pub fn font_to_xml(font: &FontSpec, registry: &FontRegistry, tag: &str) -> Result<String> {
    let name = registry
        .name(font.font)
        .ok_or_else(|| FolioError::config(format!("font id {} is not registered", font.font.index())))?;
    Ok(format!(
        r#"<{tag} name="{}" size="{}" color="{}"/>"#,
        escape_attribute(name),
        fmt_pt(font.size),
        font.color.to_hex()
    ))
}

pub fn font_from_xml(xml: &str, registry: &FontRegistry) -> Result<FontSpec> {
    let doc = Document::parse(xml)?;
    read_font(doc.root_element(), registry)
}

pub fn read_font(node: Node<'_, '_>, registry: &FontRegistry) -> Result<FontSpec> {
    let name = node
        .attribute("name")
        .ok_or_else(|| FolioError::Persist("<font> is missing name".to_string()))?;
    let font = registry.resolve(name)?;
    let size = required_number(node, "size")?;
    let color = optional_color(node)?.unwrap_or(Color::BLACK);
    FontSpec::new(font, size, color)
}

fn escape_attribute(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn parse_number(key: &str, raw: &str) -> Result<f32> {
    match raw.trim().parse::<f32>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(FolioError::Persist(format!("{key}={raw:?} is not a number"))),
    }
}

fn optional_number(node: Node<'_, '_>, key: &str) -> Result<Option<f32>> {
    node.attribute(key)
        .map(|raw| parse_number(key, raw))
        .transpose()
}

fn required_number(node: Node<'_, '_>, key: &str) -> Result<f32> {
    optional_number(node, key)?.ok_or_else(|| {
        FolioError::Persist(format!(
            "<{}> is missing {key}",
            node.tag_name().name()
        ))
    })
}

fn optional_length(node: Node<'_, '_>, key: &str) -> Result<Option<Pt>> {
    Ok(optional_number(node, key)?.map(Pt::from_f32))
}

fn required_length(node: Node<'_, '_>, key: &str) -> Result<Pt> {
    required_number(node, key).map(Pt::from_f32)
}

fn optional_color(node: Node<'_, '_>) -> Result<Option<Color>> {
    node.attribute("color")
        .map(|raw| {
            Color::from_hex(raw)
                .ok_or_else(|| FolioError::config(format!("invalid color {raw:?}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontId;

    #[test]
    fn margins_read_back() {
        let margin = Edges::new(10.0, 5.5, 0.0, 2.25);
        let xml = margin.write_xml("margin");
        assert_eq!(xml, r#"<margin top="10" right="5.5" bottom="0" left="2.25"/>"#);
        assert_eq!(Edges::from_xml_str(&xml).unwrap(), margin);
    }

    #[test]
    fn missing_edges_default_to_zero() {
        let edges = Edges::from_xml_str(r#"<padding top="4"/>"#).unwrap();
        assert_eq!(edges.top, Pt::from_f32(4.0));
        assert_eq!(edges.left, Pt::ZERO);
    }

    #[test]
    fn width_units() {
        for extent in [
            Extent::Auto,
            Extent::Star,
            Extent::percentage(37.5).unwrap(),
            Extent::absolute(120.0).unwrap(),
        ] {
            let xml = extent.write_xml("width");
            assert_eq!(Extent::from_xml_str(&xml).unwrap(), extent, "{xml}");
        }
    }

    #[test]
    fn unknown_unit_is_a_configuration_error() {
        let err = Extent::from_xml_str(r#"<width unit="em" value="3"/>"#).unwrap_err();
        assert!(matches!(err, FolioError::Configuration(_)));
        let err = Extent::from_xml_str(r#"<width unit="percentage" value="140"/>"#).unwrap_err();
        assert!(matches!(err, FolioError::Configuration(_)));
    }

    #[test]
    fn malformed_xml_is_a_persist_error() {
        let err = Size::from_xml_str("<size width=").unwrap_err();
        assert!(matches!(err, FolioError::Persist(_)));
        let err = Size::from_xml_str(r#"<size width="10"/>"#).unwrap_err();
        assert!(matches!(err, FolioError::Persist(_)));
    }

    #[test]
    fn border_sides_and_dashes() {
        let dashed = BorderStyle::new(Color::from_rgb8(255, 0, 0), 1.5)
            .unwrap()
            .with_dash(DashPattern::new(1.0, &[3.0, 2.0]).unwrap());
        let border = Border {
            top: Some(dashed),
            bottom: Some(BorderStyle::solid(0.5).unwrap()),
            ..Border::none()
        };
        let xml = border.write_xml("border");
        assert!(xml.contains(r##"<top color="#ff0000" width="1.5" dash="3 2" phase="1"/>"##));
        assert_eq!(Border::from_xml_str(&xml).unwrap(), border);
    }

    #[test]
    fn fonts_resolve_through_the_registry() {
        let registry = FontRegistry::new();
        let font = FontSpec::new(FontId::COURIER, 9.5, Color::from_rgb8(0, 0, 255)).unwrap();
        let xml = font_to_xml(&font, &registry, "font").unwrap();
        assert_eq!(xml, r##"<font name="Courier" size="9.5" color="#0000ff"/>"##);
        assert_eq!(font_from_xml(&xml, &registry).unwrap(), font);
        let err = font_from_xml(r#"<font name="Comic" size="9"/>"#, &registry).unwrap_err();
        assert!(matches!(err, FolioError::Configuration(_)));
    }
}
