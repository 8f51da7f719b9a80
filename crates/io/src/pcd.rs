use std::fs;
use std::io::{self, BufWriter, Write as _};
use std::path::Path;

use voxdiff_core::PointCloud;

use crate::error::DecodeError;
use crate::scalar::{parse_token, Scalar};

const MAX_PREALLOC: usize = 1 << 20;

/// Reads a PCD file (ASCII or binary format).
pub fn read_pcd(path: impl AsRef<Path>) -> Result<PointCloud, DecodeError> {
    let raw = fs::read(path)?;
    let header = parse_header(&raw)?;

    let (idx_x, idx_y, idx_z) = match (
        header.field_index("x"),
        header.field_index("y"),
        header.field_index("z"),
    ) {
        (Some(ix), Some(iy), Some(iz)) => (ix, iy, iz),
        _ => return Err(malformed("PCD file missing x, y, z fields")),
    };
    if [idx_x, idx_y, idx_z].iter().any(|&i| header.fields[i].count == 0) {
        return Err(malformed("PCD x, y, z fields must have COUNT of at least 1"));
    }

    let body = &raw[header.body_offset..];
    match header.data {
        DataFormat::Ascii => read_ascii(body, &header, [idx_x, idx_y, idx_z]),
        DataFormat::Binary => read_binary(body, &header, [idx_x, idx_y, idx_z]),
    }
}

/// Writes a PCD file in ASCII format with double-precision coordinates.
pub fn write_pcd(path: impl AsRef<Path>, cloud: &PointCloud) -> io::Result<()> {
    let file = fs::File::create(path)?;
    let mut w = BufWriter::new(file);

    w.write_all(b"# .PCD v0.7 - Point Cloud Data file format\n")?;
    w.write_all(b"VERSION 0.7\n")?;
    w.write_all(b"FIELDS x y z\n")?;
    w.write_all(b"SIZE 8 8 8\n")?;
    w.write_all(b"TYPE F F F\n")?;
    w.write_all(b"COUNT 1 1 1\n")?;
    writeln!(w, "WIDTH {}", cloud.len())?;
    w.write_all(b"HEIGHT 1\n")?;
    w.write_all(b"VIEWPOINT 0 0 0 1 0 0 0\n")?;
    writeln!(w, "POINTS {}", cloud.len())?;
    w.write_all(b"DATA ascii\n")?;

    for [x, y, z] in cloud.iter_points() {
        writeln!(w, "{x} {y} {z}")?;
    }

    w.flush()
}

// --- Internal helpers ---

#[derive(Debug, Clone, Copy, PartialEq)]
enum DataFormat {
    Ascii,
    Binary,
}

#[derive(Debug)]
struct Field {
    name: String,
    ty: Scalar,
    count: usize,
}

/// Where each field starts within one point, once `COUNT` is expanded.
#[derive(Debug)]
struct Layout {
    /// Index of each field's first value in an ASCII row.
    value_offsets: Vec<usize>,
    values_per_point: usize,
    /// Byte offset of each field within a binary record.
    byte_offsets: Vec<usize>,
    stride: usize,
}

impl Layout {
    fn of(fields: &[Field]) -> Result<Self, DecodeError> {
        let overflow = || malformed("PCD COUNT/SIZE values overflow the point layout");
        let mut layout = Layout {
            value_offsets: Vec::with_capacity(fields.len()),
            values_per_point: 0,
            byte_offsets: Vec::with_capacity(fields.len()),
            stride: 0,
        };
        for field in fields {
            layout.value_offsets.push(layout.values_per_point);
            layout.byte_offsets.push(layout.stride);
            let bytes = field.ty.byte_size().checked_mul(field.count).ok_or_else(overflow)?;
            layout.values_per_point = layout.values_per_point.checked_add(field.count).ok_or_else(overflow)?;
            layout.stride = layout.stride.checked_add(bytes).ok_or_else(overflow)?;
        }
        Ok(layout)
    }
}

#[derive(Debug)]
struct PcdHeader {
    fields: Vec<Field>,
    layout: Layout,
    points: usize,
    data: DataFormat,
    body_offset: usize,
}

impl PcdHeader {
    fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

fn malformed(msg: impl Into<String>) -> DecodeError {
    DecodeError::Malformed(msg.into())
}

fn parse_header(raw: &[u8]) -> Result<PcdHeader, DecodeError> {
    let mut names: Option<Vec<String>> = None;
    let mut sizes: Option<Vec<usize>> = None;
    let mut types: Option<Vec<String>> = None;
    let mut counts: Option<Vec<usize>> = None;
    let mut width: Option<usize> = None;
    let mut height: usize = 1;
    let mut points: Option<usize> = None;

    let mut offset = 0usize;
    loop {
        let rest = &raw[offset..];
        if rest.is_empty() {
            return Err(malformed("PCD file missing DATA line"));
        }
        let line_len = rest.iter().position(|&b| b == b'\n').map_or(rest.len(), |n| n + 1);
        let line = std::str::from_utf8(&rest[..line_len])
            .map_err(|_| malformed("PCD header is not valid UTF-8"))?;
        offset += line_len;

        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((&key, values)) = parts.split_first() else {
            continue;
        };
        if key.starts_with('#') {
            continue;
        }

        match key {
            "VERSION" | "VIEWPOINT" => {}
            "FIELDS" => names = Some(values.iter().map(|s| s.to_string()).collect()),
            "SIZE" => sizes = Some(parse_list(key, values)?),
            "TYPE" => types = Some(values.iter().map(|s| s.to_string()).collect()),
            "COUNT" => counts = Some(parse_list(key, values)?),
            "WIDTH" => width = Some(parse_one(key, values)?),
            "HEIGHT" => height = parse_one(key, values)?,
            "POINTS" => points = Some(parse_one(key, values)?),
            "DATA" => {
                let data = match values.first().copied() {
                    Some("ascii") => DataFormat::Ascii,
                    Some("binary") => DataFormat::Binary,
                    Some(other) => {
                        return Err(DecodeError::Unsupported(format!("PCD DATA format {other}")))
                    }
                    None => return Err(malformed("PCD DATA line has no format")),
                };
                let names = names.ok_or_else(|| malformed("PCD header missing FIELDS"))?;
                let n = names.len();
                let sizes = sizes.unwrap_or_else(|| vec![4; n]);
                let types = types.unwrap_or_else(|| vec!["F".to_string(); n]);
                let counts = counts.unwrap_or_else(|| vec![1; n]);
                if sizes.len() != n || types.len() != n || counts.len() != n {
                    return Err(malformed("PCD FIELDS/SIZE/TYPE/COUNT lengths differ"));
                }

                let mut fields = Vec::with_capacity(n);
                for (((name, size), kind), count) in names.into_iter().zip(sizes).zip(types).zip(counts) {
                    let ty = Scalar::from_pcd(&kind, size).ok_or_else(|| {
                        DecodeError::Unsupported(format!("PCD field type {kind}{size}"))
                    })?;
                    fields.push(Field { name, ty, count });
                }

                let points = points
                    .or(width.map(|w| w.saturating_mul(height)))
                    .ok_or_else(|| malformed("PCD file missing POINTS/WIDTH header"))?;

                let layout = Layout::of(&fields)?;

                return Ok(PcdHeader {
                    fields,
                    layout,
                    points,
                    data,
                    body_offset: offset,
                });
            }
            other => return Err(malformed(format!("unexpected PCD header line starting with {other:?}"))),
        }
    }
}

fn parse_one(key: &str, values: &[&str]) -> Result<usize, DecodeError> {
    let value = values
        .first()
        .ok_or_else(|| malformed(format!("PCD {key} line has no value")))?;
    value
        .parse::<usize>()
        .map_err(|e| malformed(format!("invalid {key} value: {e}")))
}

fn parse_list(key: &str, values: &[&str]) -> Result<Vec<usize>, DecodeError> {
    values
        .iter()
        .map(|v| {
            v.parse::<usize>()
                .map_err(|e| malformed(format!("invalid {key} value: {e}")))
        })
        .collect()
}

fn read_ascii(body: &[u8], header: &PcdHeader, xyz: [usize; 3]) -> Result<PointCloud, DecodeError> {
    let text = std::str::from_utf8(body).map_err(|_| malformed("PCD body not valid UTF-8"))?;
    let width = header.layout.values_per_point;
    let [ox, oy, oz] = xyz.map(|i| header.layout.value_offsets[i]);

    let mut cloud = PointCloud::with_capacity(header.points.min(MAX_PREALLOC));
    let mut rows = 0usize;
    for line in text.lines() {
        if rows >= header.points {
            break;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() || parts[0].starts_with('#') {
            continue;
        }
        if parts.len() < width {
            return Err(malformed(format!(
                "PCD row has {} values, expected {}",
                parts.len(),
                width
            )));
        }
        cloud.push([parse_token(parts[ox])?, parse_token(parts[oy])?, parse_token(parts[oz])?]);
        rows += 1;
    }

    if rows < header.points {
        return Err(malformed(format!(
            "PCD body has {rows} rows, header declares {}",
            header.points
        )));
    }

    Ok(cloud)
}

fn read_binary(body: &[u8], header: &PcdHeader, xyz: [usize; 3]) -> Result<PointCloud, DecodeError> {
    let stride = header.layout.stride;
    let byte_offsets = &header.layout.byte_offsets;
    let needed = header.points.saturating_mul(stride);
    if body.len() < needed {
        return Err(malformed(format!(
            "binary PCD data too short: have {} bytes, expected {} ({} points x {} bytes)",
            body.len(),
            needed,
            header.points,
            stride
        )));
    }

    let mut cloud = PointCloud::with_capacity(header.points.min(MAX_PREALLOC));
    if stride == 0 {
        return Ok(cloud);
    }
    for record in body[..needed].chunks_exact(stride) {
        let read = |i: usize| header.fields[i].ty.read(&record[byte_offsets[i]..], false);
        cloud.push([read(xyz[0])?, read(xyz[1])?, read(xyz[2])?]);
    }

    Ok(cloud)
}
