//! Helpers shared by the filter implementations: property string forms
//! and the XML shapes used for geometric parameters.

use crate::xml::XmlElem;
use ionvue_core::{ColourRGBAf, Point3D};

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

pub(crate) fn bool_str(v: bool) -> &'static str {
    if v {
        "1"
    } else {
        "0"
    }
}

/// Property form of a point: `x,y,z`.
pub(crate) fn point_str(p: &Point3D) -> String {
    format!("{},{},{}", p.x, p.y, p.z)
}

pub(crate) fn parse_point(value: &str) -> Option<Point3D> {
    let mut it = value.split(',').map(str::trim);
    let x = it.next()?.parse().ok()?;
    let y = it.next()?.parse().ok()?;
    let z = it.next()?.parse().ok()?;
    it.next().is_none().then(|| Point3D::new(x, y, z))
}

/// Property form of a colour: `r,g,b,a` in unit floats.
pub(crate) fn colour_str(c: &ColourRGBAf) -> String {
    format!("{},{},{},{}", c.r, c.g, c.b, c.a)
}

pub(crate) fn parse_colour(value: &str) -> Option<ColourRGBAf> {
    let parts: Vec<f32> = value
        .split(',')
        .map(|p| p.trim().parse().ok())
        .collect::<Option<_>>()?;
    let c = match parts.as_slice() {
        [r, g, b] => ColourRGBAf::opaque(*r, *g, *b),
        [r, g, b, a] => ColourRGBAf::new(*r, *g, *b, *a),
        _ => return None,
    };
    c.in_unit_range().then_some(c)
}

/// `<name x= y= z=/>` element for persisted points.
pub(crate) fn point_elem(name: &str, p: &Point3D) -> XmlElem {
    XmlElem::new(name).attr("x", p.x).attr("y", p.y).attr("z", p.z)
}

pub(crate) fn point_from_elem(elem: &XmlElem) -> Option<Point3D> {
    Some(Point3D::new(
        elem.parse_attr("x")?,
        elem.parse_attr("y")?,
        elem.parse_attr("z")?,
    ))
}

/// `<colour r= g= b= a=/>` element.
pub(crate) fn colour_elem(c: &ColourRGBAf) -> XmlElem {
    XmlElem::new("colour")
        .attr("r", c.r)
        .attr("g", c.g)
        .attr("b", c.b)
        .attr("a", c.a)
}

pub(crate) fn colour_from_elem(elem: &XmlElem) -> Option<ColourRGBAf> {
    Some(ColourRGBAf::new(
        elem.parse_attr("r")?,
        elem.parse_attr("g")?,
        elem.parse_attr("b")?,
        // Alpha arrived in a later writer version; default opaque.
        elem.parse_attr("a").unwrap_or(1.0),
    ))
}

/// Flag vector persisted as a compact `0`/`1` string.
pub(crate) fn flags_str(flags: &[bool]) -> String {
    flags.iter().map(|&f| if f { '1' } else { '0' }).collect()
}

pub(crate) fn parse_flags(value: &str) -> Option<Vec<bool>> {
    value
        .chars()
        .map(|c| match c {
            '1' => Some(true),
            '0' => Some(false),
            _ => None,
        })
        .collect()
}
