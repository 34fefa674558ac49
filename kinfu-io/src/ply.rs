//! PLY format support

use kinfu_core::{Error, NormalPoint3f, Point3f, PointCloud, Result, Vector3f};
use ply_rs::{
    parser::Parser,
    ply::{Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType, ScalarType},
    writer::Writer,
};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// On-disk encoding of a PLY file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlyFormat {
    Ascii,
    #[default]
    BinaryLittleEndian,
}

impl From<PlyFormat> for Encoding {
    fn from(format: PlyFormat) -> Self {
        match format {
            PlyFormat::Ascii => Encoding::Ascii,
            PlyFormat::BinaryLittleEndian => Encoding::BinaryLittleEndian,
        }
    }
}

const VERTEX: &str = "vertex";
const FIELDS: [&str; 6] = ["x", "y", "z", "nx", "ny", "nz"];

/// Write an oriented point cloud as binary little-endian PLY with
/// `x y z nx ny nz` float vertex properties.
pub fn write_point_cloud<P: AsRef<Path>>(cloud: &PointCloud<NormalPoint3f>, path: P) -> Result<()> {
    write_point_cloud_as(cloud, path, PlyFormat::default())
}

/// Same as [`write_point_cloud`] with an explicit encoding
pub fn write_point_cloud_as<P: AsRef<Path>>(
    cloud: &PointCloud<NormalPoint3f>,
    path: P,
    format: PlyFormat,
) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = format.into();
    ply.header.comments.push("generated by kinfu-rs".to_string());

    let mut vertex_element = ElementDef::new(VERTEX.to_string());
    vertex_element.count = cloud.len();
    for field in FIELDS {
        vertex_element
            .properties
            .add(PropertyDef::new(field.to_string(), PropertyType::Scalar(ScalarType::Float)));
    }
    ply.header.elements.add(vertex_element);

    let vertices: Vec<DefaultElement> = cloud
        .iter()
        .map(|point| {
            let values = [
                point.position.x,
                point.position.y,
                point.position.z,
                point.normal.x,
                point.normal.y,
                point.normal.z,
            ];
            let mut vertex = DefaultElement::new();
            for (field, value) in FIELDS.iter().zip(values) {
                vertex.insert(field.to_string(), Property::Float(value));
            }
            vertex
        })
        .collect();
    ply.payload.insert(VERTEX.to_string(), vertices);

    Writer::new().write_ply(&mut writer, &mut ply)?;
    writer.flush()?;

    log::info!("wrote {} points to {}", cloud.len(), path.display());
    Ok(())
}

fn read_vertices<P: AsRef<Path>>(path: P) -> Result<Vec<DefaultElement>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let ply = Parser::<DefaultElement>::new().read_ply(&mut reader)?;
    Ok(ply.payload.get(VERTEX).cloned().unwrap_or_default())
}

/// Read vertex positions from a PLY file
pub fn read_point_cloud<P: AsRef<Path>>(path: P) -> Result<PointCloud<Point3f>> {
    read_vertices(path)?
        .iter()
        .map(|vertex| {
            Ok(Point3f::new(
                extract_property_value(vertex, "x")?,
                extract_property_value(vertex, "y")?,
                extract_property_value(vertex, "z")?,
            ))
        })
        .collect()
}

/// Read vertex positions and normals from a PLY file
pub fn read_normal_cloud<P: AsRef<Path>>(path: P) -> Result<PointCloud<NormalPoint3f>> {
    read_vertices(path)?
        .iter()
        .map(|vertex| {
            let position = Point3f::new(
                extract_property_value(vertex, "x")?,
                extract_property_value(vertex, "y")?,
                extract_property_value(vertex, "z")?,
            );
            let normal = Vector3f::new(
                extract_property_value(vertex, "nx")?,
                extract_property_value(vertex, "ny")?,
                extract_property_value(vertex, "nz")?,
            );
            Ok(NormalPoint3f::new(position, normal))
        })
        .collect()
}

/// Extract a property value as f32 from a PLY element
fn extract_property_value(element: &DefaultElement, name: &str) -> Result<f32> {
    match element.get(name) {
        Some(Property::Float(val)) => Ok(*val),
        Some(Property::Double(val)) => Ok(*val as f32),
        Some(Property::Int(val)) => Ok(*val as f32),
        Some(Property::UInt(val)) => Ok(*val as f32),
        Some(Property::Short(val)) => Ok(*val as f32),
        Some(Property::UShort(val)) => Ok(*val as f32),
        _ => Err(Error::InvalidData(format!(
            "PLY vertex property '{}' missing or not numeric",
            name
        ))),
    }
}
