use std::collections::HashMap;
use std::io::{BufRead, Read};
use std::path::Path;
use std::str::FromStr;

use glam::{DVec2, DVec3};
use serde::Deserialize;

use radar_fusion_3d::{
    pointcloud::{PointCloudFrame, RadarPoint},
    SensorFrame,
};

const MAX_POINT_STEP: usize = 1024;
const MAX_POINTS: usize = 50_000_000;
const PREALLOCATED_POINTS: usize = 4096;

/// Error types for the PCD module.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PcdError {
    /// Failed to read PCD file
    #[error("Failed to read PCD file")]
    Io(#[from] std::io::Error),

    /// Unsupported header
    #[error("Unsupported PCD header")]
    UnsupportedProperty,

    /// Malformed PCD header
    #[error("Malformed PCD header")]
    MalformedHeader,

    /// A field required by the reader is not in the file
    #[error("Missing PCD field {0}")]
    MissingField(String),

    /// A field has a type or element count the reader cannot use
    #[error("Unsupported layout for PCD field {0}")]
    InvalidField(String),

    /// Invalid PCD file extension
    #[error("Invalid PCD file extension. Got:{0}")]
    InvalidFileExtension(String),
}

/// The radar point filter applied while decoding.
///
/// A point is kept when each state field that is present in the file has one of the listed
/// values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RadarFilter {
    /// Accepted values of `invalid_state`.
    pub invalid_states: Vec<i64>,
    /// Accepted values of `dyn_prop`.
    pub dynprop_states: Vec<i64>,
    /// Accepted values of `ambig_state`.
    pub ambig_states: Vec<i64>,
}

impl Default for RadarFilter {
    fn default() -> Self {
        Self {
            invalid_states: vec![0],
            dynprop_states: (0..7).collect(),
            ambig_states: vec![3],
        }
    }
}

impl RadarFilter {
    fn accepts(states: &[i64], value: Option<f64>) -> bool {
        match value {
            Some(v) => states.iter().any(|&s| s as f64 == v),
            None => true,
        }
    }

    fn keep(&self, invalid: Option<f64>, dynprop: Option<f64>, ambig: Option<f64>) -> bool {
        Self::accepts(&self.invalid_states, invalid)
            && Self::accepts(&self.dynprop_states, dynprop)
            && Self::accepts(&self.ambig_states, ambig)
    }
}

/// Options for decoding radar PCD files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RadarPcdOptions {
    /// The fields holding the planar velocity (vx, vy).
    pub velocity_fields: [String; 2],
    /// The point filter, `None` to keep every point.
    pub filter: Option<RadarFilter>,
}

impl Default for RadarPcdOptions {
    fn default() -> Self {
        Self {
            velocity_fields: ["vx_comp".to_string(), "vy_comp".to_string()],
            filter: Some(RadarFilter::default()),
        }
    }
}

impl RadarPcdOptions {
    /// Keep every point.
    pub fn unfiltered() -> Self {
        Self {
            filter: None,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Float,
    Signed,
    Unsigned,
}

impl FieldKind {
    fn from_code(code: &str) -> Result<Self, PcdError> {
        match code {
            "F" => Ok(Self::Float),
            "I" => Ok(Self::Signed),
            "U" => Ok(Self::Unsigned),
            _ => Err(PcdError::UnsupportedProperty),
        }
    }

    fn supports(self, size: usize) -> bool {
        match self {
            Self::Float => matches!(size, 4 | 8),
            Self::Signed | Self::Unsigned => matches!(size, 1 | 2 | 4 | 8),
        }
    }
}

/// Describes a single field in a PCD point record
#[derive(Debug)]
struct PcdField {
    name: String,
    offset: usize, // byte offset within a point
    size: usize,   // size of one element (bytes)
    count: usize,  // number of elements
    kind: FieldKind,
}

impl PcdField {
    /// Read element `index` of the field as f64.
    fn read(&self, buf: &[u8], index: usize) -> Result<f64, PcdError> {
        let start = self.offset + index * self.size;
        let slice = buf
            .get(start..start + self.size)
            .ok_or(PcdError::UnsupportedProperty)?;
        let value = match (self.kind, self.size) {
            (FieldKind::Float, 4) => f32::from_le_bytes(to_array(slice)?) as f64,
            (FieldKind::Float, 8) => f64::from_le_bytes(to_array(slice)?),
            (FieldKind::Signed, 1) => i8::from_le_bytes(to_array(slice)?) as f64,
            (FieldKind::Signed, 2) => i16::from_le_bytes(to_array(slice)?) as f64,
            (FieldKind::Signed, 4) => i32::from_le_bytes(to_array(slice)?) as f64,
            (FieldKind::Signed, 8) => i64::from_le_bytes(to_array(slice)?) as f64,
            (FieldKind::Unsigned, 1) => u8::from_le_bytes(to_array(slice)?) as f64,
            (FieldKind::Unsigned, 2) => u16::from_le_bytes(to_array(slice)?) as f64,
            (FieldKind::Unsigned, 4) => u32::from_le_bytes(to_array(slice)?) as f64,
            (FieldKind::Unsigned, 8) => u64::from_le_bytes(to_array(slice)?) as f64,
            _ => return Err(PcdError::UnsupportedProperty),
        };
        Ok(value)
    }
}

#[inline]
fn to_array<const N: usize>(slice: &[u8]) -> Result<[u8; N], PcdError> {
    slice.try_into().map_err(|_| PcdError::UnsupportedProperty)
}

#[derive(Debug)]
struct PcdLayout {
    fields: Vec<PcdField>,
    point_step: usize, // total bytes per point
    num_points: usize,
}

impl PcdLayout {
    fn field(&self, name: &str) -> Option<&PcdField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// A single-element field, optionally restricted to floating point.
    fn scalar(&self, name: &str, float: bool) -> Result<&PcdField, PcdError> {
        let field = self
            .field(name)
            .ok_or_else(|| PcdError::MissingField(name.to_string()))?;
        if field.count != 1 || (float && field.kind != FieldKind::Float) {
            return Err(PcdError::InvalidField(name.to_string()));
        }
        Ok(field)
    }
}

/// Collect the keyword lines of the header up to `DATA`, which must be `binary`.
fn read_header<R: BufRead>(reader: &mut R) -> Result<HashMap<String, Vec<String>>, PcdError> {
    let mut entries = HashMap::new();
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(PcdError::MalformedHeader);
        }

        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };
        if keyword.starts_with('#') {
            continue;
        }

        let values: Vec<String> = tokens.map(String::from).collect();
        if keyword == "DATA" {
            return match values.as_slice() {
                [encoding] if encoding == "binary" => Ok(entries),
                _ => Err(PcdError::UnsupportedProperty),
            };
        }
        entries.insert(keyword.to_string(), values);
    }
}

fn parse_values<T: FromStr>(values: &[String]) -> Result<Vec<T>, PcdError> {
    values
        .iter()
        .map(|v| v.parse().map_err(|_| PcdError::MalformedHeader))
        .collect()
}

fn parse_pcd_layout<R: BufRead>(reader: &mut R) -> Result<PcdLayout, PcdError> {
    let header = read_header(reader)?;
    let values = |key: &str| header.get(key).map(Vec::as_slice).unwrap_or_default();

    let names = values("FIELDS");
    let sizes: Vec<usize> = parse_values(values("SIZE"))?;
    let kinds = values("TYPE")
        .iter()
        .map(|code| FieldKind::from_code(code))
        .collect::<Result<Vec<_>, _>>()?;
    let counts: Vec<usize> = match header.get("COUNT") {
        Some(counts) => parse_values(counts)?,
        None => vec![1; names.len()],
    };

    if names.is_empty()
        || [sizes.len(), kinds.len(), counts.len()]
            .iter()
            .any(|&n| n != names.len())
    {
        return Err(PcdError::MalformedHeader);
    }

    let num_points = match parse_values::<usize>(values("POINTS"))?.as_slice() {
        [n] if *n <= MAX_POINTS => *n,
        _ => return Err(PcdError::MalformedHeader),
    };

    let mut fields: Vec<PcdField> = Vec::with_capacity(names.len());
    let mut offset = 0usize;
    for (((name, &size), &kind), &count) in names.iter().zip(&sizes).zip(&kinds).zip(&counts) {
        if !kind.supports(size) || count == 0 {
            return Err(PcdError::UnsupportedProperty);
        }
        if fields.iter().any(|f| &f.name == name) {
            return Err(PcdError::MalformedHeader);
        }
        fields.push(PcdField {
            name: name.clone(),
            offset,
            size,
            count,
            kind,
        });
        offset = size
            .checked_mul(count)
            .and_then(|bytes| offset.checked_add(bytes))
            .filter(|&end| end <= MAX_POINT_STEP)
            .ok_or(PcdError::MalformedHeader)?;
    }

    Ok(PcdLayout {
        fields,
        point_step: offset,
        num_points,
    })
}

/// The fields a radar decoder reads, resolved against a file layout.
struct RadarFields<'a> {
    position: [&'a PcdField; 3],
    velocity: [&'a PcdField; 2],
    invalid_state: Option<&'a PcdField>,
    dyn_prop: Option<&'a PcdField>,
    ambig_state: Option<&'a PcdField>,
    auxiliary: Vec<&'a PcdField>,
}

impl<'a> RadarFields<'a> {
    fn resolve(layout: &'a PcdLayout, options: &RadarPcdOptions) -> Result<Self, PcdError> {
        let [vx, vy] = &options.velocity_fields;
        // state fields are optional, but must be scalars when present
        let state = move |name: &str| {
            layout
                .field(name)
                .map(|_| layout.scalar(name, false))
                .transpose()
        };

        Ok(Self {
            position: [
                layout.scalar("x", true)?,
                layout.scalar("y", true)?,
                layout.scalar("z", true)?,
            ],
            velocity: [layout.scalar(vx, false)?, layout.scalar(vy, false)?],
            invalid_state: state("invalid_state")?,
            dyn_prop: state("dyn_prop")?,
            ambig_state: state("ambig_state")?,
            auxiliary: layout
                .fields
                .iter()
                .filter(|f| !matches!(f.name.as_str(), "x" | "y" | "z"))
                .filter(|f| &f.name != vx && &f.name != vy)
                .collect(),
        })
    }

    fn read_state(field: Option<&PcdField>, buf: &[u8]) -> Result<Option<f64>, PcdError> {
        field.map(|f| f.read(buf, 0)).transpose()
    }

    fn keep(&self, filter: &RadarFilter, buf: &[u8]) -> Result<bool, PcdError> {
        Ok(filter.keep(
            Self::read_state(self.invalid_state, buf)?,
            Self::read_state(self.dyn_prop, buf)?,
            Self::read_state(self.ambig_state, buf)?,
        ))
    }

    fn decode(&self, buf: &[u8]) -> Result<RadarPoint, PcdError> {
        let [x, y, z] = self.position;
        let [vx, vy] = self.velocity;

        let mut auxiliary = Vec::with_capacity(self.auxiliary.len());
        for field in &self.auxiliary {
            for i in 0..field.count {
                auxiliary.push(field.read(buf, i)? as f32);
            }
        }

        Ok(RadarPoint {
            position: DVec3::new(x.read(buf, 0)?, y.read(buf, 0)?, z.read(buf, 0)?),
            velocity: DVec2::new(vx.read(buf, 0)?, vy.read(buf, 0)?),
            auxiliary,
        })
    }
}

/// Decode radar detections from a binary PCD stream.
///
/// Positions come from `x`, `y`, `z`, the velocity from `options.velocity_fields`, and every
/// other field is kept as an auxiliary channel in header order.
pub fn read_radar_pcd_from<R: BufRead>(
    reader: &mut R,
    sensor: &str,
    options: &RadarPcdOptions,
) -> Result<PointCloudFrame<SensorFrame>, PcdError> {
    let layout = parse_pcd_layout(reader)?;
    let fields = RadarFields::resolve(&layout, options)?;

    let mut buffer = vec![0u8; layout.point_step];
    let mut points = Vec::with_capacity(layout.num_points.min(PREALLOCATED_POINTS));

    for _ in 0..layout.num_points {
        reader.read_exact(&mut buffer)?;

        if let Some(filter) = &options.filter {
            if !fields.keep(filter, &buffer)? {
                continue;
            }
        }
        points.push(fields.decode(&buffer)?);
    }

    log::debug!(
        "{}: kept {} of {} radar points",
        sensor,
        points.len(),
        layout.num_points
    );

    Ok(PointCloudFrame::new(sensor, points))
}

/// Read a binary radar PCD file.
///
/// # Arguments
/// * `path` - Path to a `.pcd` file.
/// * `sensor` - The sensor identifier given to the returned frame.
/// * `options` - Velocity fields and point filter.
///
/// # Returns
/// A [`PointCloudFrame`] in the sensor frame. A file without points yields an empty frame.
pub fn read_radar_pcd(
    path: impl AsRef<Path>,
    sensor: &str,
    options: &RadarPcdOptions,
) -> Result<PointCloudFrame<SensorFrame>, PcdError> {
    let Some(file_ext) = path.as_ref().extension() else {
        return Err(PcdError::InvalidFileExtension("".into()));
    };

    if file_ext != "pcd" {
        return Err(PcdError::InvalidFileExtension(
            file_ext.to_string_lossy().to_string(),
        ));
    }

    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    read_radar_pcd_from(&mut reader, sensor, options)
}
