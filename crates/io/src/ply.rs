use std::fs;
use std::io::{self, BufWriter, Write as _};
use std::path::Path;

use voxdiff_core::PointCloud;

use crate::error::DecodeError;
use crate::scalar::{parse_token, Scalar};

pub const MAGIC: &[u8] = b"ply";

const MAX_PREALLOC: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlyFormat {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

#[derive(Debug, Clone)]
enum Property {
    Scalar { name: String, ty: Scalar },
    List { count: Scalar, item: Scalar },
}

#[derive(Debug, Clone)]
struct Element {
    name: String,
    count: usize,
    properties: Vec<Property>,
}

impl Element {
    fn scalar_index(&self, wanted: &str) -> Option<usize> {
        self.properties
            .iter()
            .position(|p| matches!(p, Property::Scalar { name, .. } if name == wanted))
    }
}

/// Parsed header information.
struct PlyHeader {
    format: PlyFormat,
    elements: Vec<Element>,
    body_offset: usize, // byte offset just after the end_header line
}

fn malformed(msg: impl Into<String>) -> DecodeError {
    DecodeError::Malformed(msg.into())
}

fn parse_ply_header(data: &[u8]) -> Result<PlyHeader, DecodeError> {
    let first_line = data.split(|&b| b == b'\n').next().unwrap_or_default();
    if first_line.strip_suffix(b"\r").unwrap_or(first_line) != MAGIC {
        return Err(malformed("file does not start with a 'ply' line"));
    }

    // end_header only counts at the start of a line
    let marker = b"end_header";
    let marker_at = find_bytes(data, b"\nend_header")
        .map(|at| at + 1)
        .ok_or_else(|| malformed("missing end_header in PLY file"))?;
    let mut body_offset = marker_at + marker.len();
    if data.get(body_offset) == Some(&b'\r') {
        body_offset += 1;
    }
    match data.get(body_offset) {
        Some(b'\n') => body_offset += 1,
        None => {}
        Some(_) => return Err(malformed("end_header must end its line")),
    }

    let header_text = std::str::from_utf8(&data[..marker_at])
        .map_err(|_| malformed("PLY header not valid UTF-8"))?;

    let mut format = None;
    let mut elements: Vec<Element> = Vec::new();

    for line in header_text.lines().skip(1) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [] | ["comment", ..] | ["obj_info", ..] => {}
            ["format", kind, _version] => {
                format = Some(match *kind {
                    "ascii" => PlyFormat::Ascii,
                    "binary_little_endian" => PlyFormat::BinaryLittleEndian,
                    "binary_big_endian" => PlyFormat::BinaryBigEndian,
                    other => return Err(DecodeError::Unsupported(format!("PLY format {other}"))),
                });
            }
            ["element", name, count] => {
                let count = count
                    .parse::<usize>()
                    .map_err(|e| malformed(format!("invalid element count: {e}")))?;
                elements.push(Element {
                    name: name.to_string(),
                    count,
                    properties: Vec::new(),
                });
            }
            ["property", "list", count_ty, item_ty, _name] => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| malformed("property declared before any element"))?;
                element.properties.push(Property::List {
                    count: scalar_type(count_ty)?,
                    item: scalar_type(item_ty)?,
                });
            }
            ["property", ty, name] => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| malformed("property declared before any element"))?;
                element.properties.push(Property::Scalar {
                    name: name.to_string(),
                    ty: scalar_type(ty)?,
                });
            }
            _ => return Err(malformed(format!("unexpected PLY header line: {line}"))),
        }
    }

    let format = format.ok_or_else(|| malformed("PLY format line missing"))?;

    Ok(PlyHeader {
        format,
        elements,
        body_offset,
    })
}

fn scalar_type(name: &str) -> Result<Scalar, DecodeError> {
    Scalar::from_ply_name(name)
        .ok_or_else(|| DecodeError::Unsupported(format!("PLY property type {name}")))
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Read the `x`, `y`, `z` properties of the `vertex` element.
///
/// Handles ASCII and both binary encodings. Elements declared before
/// `vertex` are walked over; everything after it is ignored.
pub fn read_ply(path: impl AsRef<Path>) -> Result<PointCloud, DecodeError> {
    let data = fs::read(path)?;
    let header = parse_ply_header(&data)?;

    let vertex_at = header
        .elements
        .iter()
        .position(|e| e.name == "vertex")
        .ok_or_else(|| malformed("PLY file has no vertex element"))?;
    let vertex = &header.elements[vertex_at];
    if vertex.properties.iter().any(|p| matches!(p, Property::List { .. })) {
        return Err(DecodeError::Unsupported("list property in PLY vertex element".to_string()));
    }

    let (idx_x, idx_y, idx_z) = match (
        vertex.scalar_index("x"),
        vertex.scalar_index("y"),
        vertex.scalar_index("z"),
    ) {
        (Some(ix), Some(iy), Some(iz)) => (ix, iy, iz),
        _ => return Err(malformed("PLY file missing required x, y, z properties")),
    };

    let body = &data[header.body_offset..];
    let mut cloud = PointCloud::with_capacity(vertex.count.min(MAX_PREALLOC));
    let mut row = vec![0.0f64; vertex.properties.len()];

    match header.format {
        PlyFormat::Ascii => {
            let text = std::str::from_utf8(body).map_err(|_| malformed("PLY body not valid UTF-8"))?;
            let mut tokens = text.split_whitespace();
            for element in &header.elements[..vertex_at] {
                for _ in 0..element.count {
                    skip_ascii_instance(element, &mut tokens)?;
                }
            }
            for _ in 0..vertex.count {
                read_ascii_instance(vertex, &mut tokens, &mut row)?;
                cloud.push([row[idx_x], row[idx_y], row[idx_z]]);
            }
        }
        PlyFormat::BinaryLittleEndian | PlyFormat::BinaryBigEndian => {
            let big_endian = header.format == PlyFormat::BinaryBigEndian;
            let mut cursor = 0usize;
            for element in &header.elements[..vertex_at] {
                for _ in 0..element.count {
                    cursor += binary_instance(element, &body[cursor..], big_endian, None)?;
                }
            }
            for _ in 0..vertex.count {
                cursor += binary_instance(vertex, &body[cursor..], big_endian, Some(&mut row))?;
                cloud.push([row[idx_x], row[idx_y], row[idx_z]]);
            }
        }
    }

    Ok(cloud)
}

fn next_token<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Result<&'a str, DecodeError> {
    tokens
        .next()
        .ok_or_else(|| malformed("PLY body ends before all elements were read"))
}

fn list_len(value: f64) -> Result<usize, DecodeError> {
    if value < 0.0 || value.fract() != 0.0 {
        return Err(malformed(format!("invalid PLY list length {value}")));
    }
    Ok(value as usize)
}

fn skip_ascii_instance<'a>(
    element: &Element,
    tokens: &mut impl Iterator<Item = &'a str>,
) -> Result<(), DecodeError> {
    for property in &element.properties {
        match property {
            Property::Scalar { .. } => {
                next_token(tokens)?;
            }
            Property::List { .. } => {
                let n = list_len(parse_token(next_token(tokens)?)?)?;
                for _ in 0..n {
                    next_token(tokens)?;
                }
            }
        }
    }
    Ok(())
}

/// Read one instance of an element made only of scalar properties.
fn read_ascii_instance<'a>(
    element: &Element,
    tokens: &mut impl Iterator<Item = &'a str>,
    row: &mut [f64],
) -> Result<(), DecodeError> {
    debug_assert_eq!(row.len(), element.properties.len());
    for slot in row.iter_mut() {
        *slot = parse_token(next_token(tokens)?)?;
    }
    Ok(())
}

/// Decode one binary element instance, returning how many bytes it spans.
/// Scalar values land in `row` when one is given.
fn binary_instance(
    element: &Element,
    bytes: &[u8],
    big_endian: bool,
    mut row: Option<&mut Vec<f64>>,
) -> Result<usize, DecodeError> {
    let mut offset = 0usize;
    for (i, property) in element.properties.iter().enumerate() {
        let rest = bytes.get(offset..).unwrap_or_default();
        match property {
            Property::Scalar { ty, .. } => {
                let value = ty.read(rest, big_endian)?;
                if let Some(row) = row.as_deref_mut() {
                    row[i] = value;
                }
                offset += ty.byte_size();
            }
            Property::List { count, item } => {
                let n = list_len(count.read(rest, big_endian)?)?;
                offset += count.byte_size() + n * item.byte_size();
                if offset > bytes.len() {
                    return Err(malformed("binary body ends mid-record"));
                }
            }
        }
    }
    Ok(offset)
}

/// Write an ASCII PLY with double-precision `x`, `y`, `z` vertices.
pub fn write_ply(path: impl AsRef<Path>, cloud: &PointCloud) -> io::Result<()> {
    let file = fs::File::create(path)?;
    let mut w = BufWriter::new(file);

    w.write_all(b"ply\n")?;
    w.write_all(b"format ascii 1.0\n")?;
    writeln!(w, "element vertex {}", cloud.len())?;
    w.write_all(b"property double x\n")?;
    w.write_all(b"property double y\n")?;
    w.write_all(b"property double z\n")?;
    w.write_all(b"end_header\n")?;

    for [x, y, z] in cloud.iter_points() {
        writeln!(w, "{x} {y} {z}")?;
    }

    w.flush()
}
