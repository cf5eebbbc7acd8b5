//! PLY vertex reading and writing.

use std::io::{BufRead, Read, Write};

use dense_prior_core::{PointCloud, Pt3, Vec3};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{PlyError, Result};

/// Upper bound on vertices preallocated from the header count. Larger files
/// grow as rows are actually read.
const MAX_PREALLOCATED_VERTICES: usize = 1 << 16;

/// On-disk encoding of the vertex payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlyEncoding {
    Ascii,
    #[default]
    BinaryLittleEndian,
}

impl PlyEncoding {
    fn header_name(self) -> &'static str {
        match self {
            PlyEncoding::Ascii => "ascii",
            PlyEncoding::BinaryLittleEndian => "binary_little_endian",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scalar {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl Scalar {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "char" | "int8" => Scalar::I8,
            "uchar" | "uint8" => Scalar::U8,
            "short" | "int16" => Scalar::I16,
            "ushort" | "uint16" => Scalar::U16,
            "int" | "int32" => Scalar::I32,
            "uint" | "uint32" => Scalar::U32,
            "float" | "float32" => Scalar::F32,
            "double" | "float64" => Scalar::F64,
            _ => return None,
        })
    }

    fn size(self) -> usize {
        match self {
            Scalar::I8 | Scalar::U8 => 1,
            Scalar::I16 | Scalar::U16 => 2,
            Scalar::I32 | Scalar::U32 | Scalar::F32 => 4,
            Scalar::F64 => 8,
        }
    }

    /// Decode one little-endian value; `bytes` holds exactly `self.size()` bytes.
    fn decode_le(self, bytes: &[u8]) -> f64 {
        match self {
            Scalar::I8 => bytes[0] as i8 as f64,
            Scalar::U8 => bytes[0] as f64,
            Scalar::I16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            Scalar::U16 => u16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            Scalar::I32 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            Scalar::U32 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            Scalar::F32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            Scalar::F64 => {
                let mut b = [0u8; 8];
                b.copy_from_slice(bytes);
                f64::from_le_bytes(b)
            }
        }
    }

    /// Factor mapping a stored color sample to `[0, 1]`.
    fn color_scale(self) -> f64 {
        match self {
            Scalar::F32 | Scalar::F64 => 1.0,
            Scalar::U16 => 1.0 / 65535.0,
            _ => 1.0 / 255.0,
        }
    }
}

#[derive(Debug)]
struct Property {
    name: String,
    scalar: Scalar,
}

#[derive(Debug)]
struct Header {
    encoding: PlyEncoding,
    vertex_count: usize,
    properties: Vec<Property>,
}

impl Header {
    fn column(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name == name)
    }
}

fn next_header_line<R: BufRead>(reader: &mut R, line: &mut String) -> Result<()> {
    line.clear();
    if reader.read_line(line)? == 0 {
        return Err(PlyError::Parse("unexpected end of file in header".into()));
    }
    Ok(())
}

fn read_header<R: BufRead>(reader: &mut R) -> Result<Header> {
    let mut line = String::new();
    next_header_line(reader, &mut line)?;
    if line.trim() != "ply" {
        return Err(PlyError::Parse("missing 'ply' magic line".into()));
    }

    let mut encoding = None;
    let mut vertex_count = None;
    let mut properties = Vec::new();
    let mut in_vertex = false;

    loop {
        next_header_line(reader, &mut line)?;
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            None | Some("comment") | Some("obj_info") => {}
            Some("format") => {
                encoding = Some(match tokens.next() {
                    Some("ascii") => PlyEncoding::Ascii,
                    Some("binary_little_endian") => PlyEncoding::BinaryLittleEndian,
                    Some(other) => {
                        return Err(PlyError::Unsupported(format!("format '{other}'")));
                    }
                    None => return Err(PlyError::Parse("format line without encoding".into())),
                });
            }
            Some("element") => {
                let name = tokens.next();
                let count = tokens.next().and_then(|c| c.parse::<usize>().ok());
                let (Some(name), Some(count)) = (name, count) else {
                    return Err(PlyError::Parse(format!(
                        "invalid element line '{}'",
                        line.trim()
                    )));
                };
                if name == "vertex" {
                    if vertex_count.is_some() {
                        return Err(PlyError::Parse("duplicate vertex element".into()));
                    }
                    vertex_count = Some(count);
                    in_vertex = true;
                } else {
                    if vertex_count.is_none() {
                        return Err(PlyError::Unsupported(format!(
                            "element '{name}' before vertex"
                        )));
                    }
                    in_vertex = false;
                }
            }
            Some("property") => {
                if !in_vertex {
                    continue;
                }
                let ty = tokens
                    .next()
                    .ok_or_else(|| PlyError::Parse("property without type".into()))?;
                if ty == "list" {
                    return Err(PlyError::Unsupported("list property in vertex element".into()));
                }
                let scalar = Scalar::parse(ty)
                    .ok_or_else(|| PlyError::Parse(format!("unknown property type '{ty}'")))?;
                let name = tokens
                    .next()
                    .ok_or_else(|| PlyError::Parse("property without name".into()))?;
                properties.push(Property {
                    name: name.to_string(),
                    scalar,
                });
            }
            Some("end_header") => break,
            Some(other) => {
                return Err(PlyError::Parse(format!(
                    "unexpected header keyword '{other}'"
                )));
            }
        }
    }

    Ok(Header {
        encoding: encoding.ok_or_else(|| PlyError::Parse("missing format line".into()))?,
        vertex_count: vertex_count
            .ok_or_else(|| PlyError::Parse("missing vertex element".into()))?,
        properties,
    })
}

/// Read a PLY point cloud.
///
/// Only the vertex element is decoded; elements declared after it are
/// ignored. Colors are read when `red`, `green`, and `blue` are all present
/// and normalized to `[0, 1]` according to their stored type.
pub fn read_ply<R: BufRead>(mut reader: R) -> Result<PointCloud> {
    let header = read_header(&mut reader)?;

    let xyz = match (header.column("x"), header.column("y"), header.column("z")) {
        (Some(x), Some(y), Some(z)) => [x, y, z],
        _ => return Err(PlyError::Unsupported("vertex element without x/y/z".into())),
    };
    let rgb = match (
        header.column("red"),
        header.column("green"),
        header.column("blue"),
    ) {
        (Some(r), Some(g), Some(b)) => Some([r, g, b]),
        _ => None,
    };

    let n = header.vertex_count;
    debug!(
        "PLY header: {n} vertices, {:?}, {} properties, colors: {}",
        header.encoding,
        header.properties.len(),
        rgb.is_some()
    );
    let capacity = n.min(MAX_PREALLOCATED_VERTICES);
    let mut points = Vec::with_capacity(capacity);
    let mut colors = rgb.map(|_| Vec::with_capacity(capacity));
    let mut row = vec![0.0f64; header.properties.len()];

    match header.encoding {
        PlyEncoding::Ascii => {
            let mut line = String::new();
            for v in 0..n {
                line.clear();
                if reader.read_line(&mut line)? == 0 {
                    return Err(PlyError::Parse(format!(
                        "unexpected end of data at vertex {v} of {n}"
                    )));
                }
                let mut tokens = line.split_whitespace();
                for value in row.iter_mut() {
                    let token = tokens.next().ok_or_else(|| {
                        PlyError::Parse(format!("vertex {v} has too few values"))
                    })?;
                    *value = token
                        .parse()
                        .map_err(|_| PlyError::Parse(format!("invalid number '{token}'")))?;
                }
                push_row(&row, &header, xyz, rgb, &mut points, colors.as_mut());
            }
        }
        PlyEncoding::BinaryLittleEndian => {
            let stride: usize = header.properties.iter().map(|p| p.scalar.size()).sum();
            let mut record = vec![0u8; stride];
            for v in 0..n {
                reader.read_exact(&mut record).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::UnexpectedEof {
                        PlyError::Parse(format!("unexpected end of data at vertex {v} of {n}"))
                    } else {
                        PlyError::Io(e)
                    }
                })?;
                let mut offset = 0;
                for (value, prop) in row.iter_mut().zip(&header.properties) {
                    let size = prop.scalar.size();
                    *value = prop.scalar.decode_le(&record[offset..offset + size]);
                    offset += size;
                }
                push_row(&row, &header, xyz, rgb, &mut points, colors.as_mut());
            }
        }
    }

    let cloud = PointCloud::new(points);
    Ok(match colors {
        Some(c) => cloud.with_colors(c)?,
        None => cloud,
    })
}

fn push_row(
    row: &[f64],
    header: &Header,
    xyz: [usize; 3],
    rgb: Option<[usize; 3]>,
    points: &mut Vec<Pt3>,
    colors: Option<&mut Vec<Vec3>>,
) {
    points.push(Pt3::new(row[xyz[0]], row[xyz[1]], row[xyz[2]]));
    if let (Some(rgb), Some(colors)) = (rgb, colors) {
        let channel = |i: usize| row[rgb[i]] * header.properties[rgb[i]].scalar.color_scale();
        colors.push(Vec3::new(channel(0), channel(1), channel(2)));
    }
}

fn color_to_u8(c: f64) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Write a point cloud as PLY.
///
/// Positions are stored as `double`, colors (when present) as `uchar`.
pub fn write_ply<W: Write>(
    writer: &mut W,
    cloud: &PointCloud,
    encoding: PlyEncoding,
) -> Result<()> {
    writeln!(writer, "ply")?;
    writeln!(writer, "format {} 1.0", encoding.header_name())?;
    writeln!(writer, "element vertex {}", cloud.len())?;
    writeln!(writer, "property double x")?;
    writeln!(writer, "property double y")?;
    writeln!(writer, "property double z")?;
    if cloud.has_colors() {
        writeln!(writer, "property uchar red")?;
        writeln!(writer, "property uchar green")?;
        writeln!(writer, "property uchar blue")?;
    }
    writeln!(writer, "end_header")?;

    for (i, p) in cloud.points.iter().enumerate() {
        let rgb = cloud
            .colors
            .as_ref()
            .map(|c| [color_to_u8(c[i].x), color_to_u8(c[i].y), color_to_u8(c[i].z)]);
        match encoding {
            PlyEncoding::Ascii => {
                write!(writer, "{} {} {}", p.x, p.y, p.z)?;
                if let Some([r, g, b]) = rgb {
                    write!(writer, " {r} {g} {b}")?;
                }
                writeln!(writer)?;
            }
            PlyEncoding::BinaryLittleEndian => {
                writer.write_all(&p.x.to_le_bytes())?;
                writer.write_all(&p.y.to_le_bytes())?;
                writer.write_all(&p.z.to_le_bytes())?;
                if let Some(rgb) = rgb {
                    writer.write_all(&rgb)?;
                }
            }
        }
    }
    Ok(())
}
