//! GeoJSON geometries as stored on survey features.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

/// A GeoJSON position: `[lon, lat]` with an optional altitude.
pub type Position = Vec<f64>;

/// Geometry of a survey feature, in the GeoJSON object layout
/// (`{"type": "...", "coordinates": [...]}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Position),
    MultiPoint(Vec<Position>),
    LineString(Vec<Position>),
    MultiLineString(Vec<Vec<Position>>),
    Polygon(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

/// Shapefile layers cannot mix geometry kinds; single and multi variants of
/// the same kind share a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GeometryKind {
    Point,
    Line,
    Polygon,
}

impl GeometryKind {
    /// All kinds, in layer order.
    pub const ALL: [GeometryKind; 3] = [GeometryKind::Point, GeometryKind::Line, GeometryKind::Polygon];

    /// Suffix appended to the export's layer name.
    pub fn layer_suffix(self) -> &'static str {
        match self {
            GeometryKind::Point => "points",
            GeometryKind::Line => "lines",
            GeometryKind::Polygon => "polygons",
        }
    }
}

impl Geometry {
    /// The layer this geometry belongs to.
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Point(_) | Geometry::MultiPoint(_) => GeometryKind::Point,
            Geometry::LineString(_) | Geometry::MultiLineString(_) => GeometryKind::Line,
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) => GeometryKind::Polygon,
        }
    }

    /// Render as Well-Known Text, e.g. `POINT (-122.4 37.8)`.
    pub fn to_wkt(&self) -> String {
        let mut out = String::new();
        match self {
            Geometry::Point(p) => {
                out.push_str("POINT (");
                write_position(&mut out, p);
                out.push(')');
            }
            Geometry::MultiPoint(points) => {
                out.push_str("MULTIPOINT ");
                write_list(&mut out, points, |out, p| {
                    out.push('(');
                    write_position(out, p);
                    out.push(')');
                });
            }
            Geometry::LineString(line) => {
                out.push_str("LINESTRING ");
                write_ring(&mut out, line);
            }
            Geometry::MultiLineString(lines) => {
                out.push_str("MULTILINESTRING ");
                write_list(&mut out, lines, |out, line| write_ring(out, line));
            }
            Geometry::Polygon(rings) => {
                out.push_str("POLYGON ");
                write_list(&mut out, rings, |out, ring| write_ring(out, ring));
            }
            Geometry::MultiPolygon(polygons) => {
                out.push_str("MULTIPOLYGON ");
                write_list(&mut out, polygons, |out, rings| {
                    write_list(out, rings, |out, ring| write_ring(out, ring));
                });
            }
        }
        out
    }
}

fn write_position(out: &mut String, position: &[f64]) {
    for (i, coordinate) in position.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{coordinate}");
    }
}

fn write_ring(out: &mut String, ring: &[Position]) {
    write_list(out, ring, |out, p| write_position(out, p));
}

fn write_list<T>(out: &mut String, items: &[T], mut write_item: impl FnMut(&mut String, &T)) {
    if items.is_empty() {
        out.push_str("EMPTY");
        return;
    }
    out.push('(');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_item(out, item);
    }
    out.push(')');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Position> {
        vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
        ]
    }

    #[test]
    fn test_kinds() {
        assert_eq!(Geometry::Point(vec![1.0, 2.0]).kind(), GeometryKind::Point);
        assert_eq!(Geometry::MultiPoint(vec![]).kind(), GeometryKind::Point);
        assert_eq!(Geometry::LineString(vec![]).kind(), GeometryKind::Line);
        assert_eq!(Geometry::MultiLineString(vec![]).kind(), GeometryKind::Line);
        assert_eq!(Geometry::Polygon(vec![]).kind(), GeometryKind::Polygon);
        assert_eq!(Geometry::MultiPolygon(vec![]).kind(), GeometryKind::Polygon);
    }

    #[test]
    fn test_point_wkt() {
        let point = Geometry::Point(vec![-122.41, 37.77]);
        assert_eq!(point.to_wkt(), "POINT (-122.41 37.77)");
    }

    #[test]
    fn test_polygon_wkt() {
        let polygon = Geometry::Polygon(vec![square()]);
        assert_eq!(polygon.to_wkt(), "POLYGON ((0 0, 1 0, 1 1, 0 0))");

        let multi = Geometry::MultiPolygon(vec![vec![square()], vec![square()]]);
        assert_eq!(
            multi.to_wkt(),
            "MULTIPOLYGON (((0 0, 1 0, 1 1, 0 0)), ((0 0, 1 0, 1 1, 0 0)))"
        );
    }

    #[test]
    fn test_multipoint_and_empty_wkt() {
        let multi = Geometry::MultiPoint(vec![vec![1.0, 2.0], vec![3.5, 4.0]]);
        assert_eq!(multi.to_wkt(), "MULTIPOINT ((1 2), (3.5 4))");
        assert_eq!(Geometry::LineString(vec![]).to_wkt(), "LINESTRING EMPTY");
    }

    #[test]
    fn test_geojson_layout() {
        let line = Geometry::LineString(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let json = serde_json::to_string(&line).unwrap();
        assert_eq!(json, r#"{"type":"LineString","coordinates":[[1.0,2.0],[3.0,4.0]]}"#);

        let parsed: Geometry =
            serde_json::from_str(r#"{"type":"Point","coordinates":[5,6]}"#).unwrap();
        assert_eq!(parsed, Geometry::Point(vec![5.0, 6.0]));
    }
}
