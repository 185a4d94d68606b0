//! Binary glTF and Batched 3D Model encoding.
//!
//! One tile becomes one GLB with a single textured, unlit primitive. The
//! GLB is wrapped in a b3dm v1 container whose feature table carries the
//! tile centre as `RTC_CENTER`, so vertex positions stay small enough for
//! `f32`.

use glam::{DVec3, Vec2, Vec3};
use objtiles_mesh::{CompressedTexture, CroppedMesh, OctantPath};
use serde_json::json;

use crate::config::UpAxis;

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

const B3DM_MAGIC: &[u8; 4] = b"b3dm";
const B3DM_VERSION: u32 = 1;
const B3DM_HEADER_LEN: usize = 28;

// glTF enums.
const FLOAT: u32 = 5126;
const UNSIGNED_SHORT: u32 = 5123;
const UNSIGNED_INT: u32 = 5125;
const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;
const LINEAR: u32 = 9729;
const CLAMP_TO_EDGE: u32 = 33071;

/// A tile that cannot be written as valid glTF.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("tile has no faces")]
    EmptyMesh,

    #[error("face index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },

    #[error("{what} of {len} bytes does not fit a 32-bit length field")]
    TooLarge { what: &'static str, len: usize },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Length field value for a container header.
fn length_field(what: &'static str, len: usize) -> Result<u32, EncodeError> {
    u32::try_from(len).map_err(|_| EncodeError::TooLarge { what, len })
}

/// Per-tile encoding parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeOptions {
    /// Subtracted from every position before narrowing to `f32`.
    pub center: DVec3,
    pub up_axis: UpAxis,
}

/// Relative URI of a tile's payload: `tiles/{depth}/{path}.b3dm`.
#[must_use]
pub fn tile_uri(path: &OctantPath) -> String {
    format!("tiles/{}/{path}.b3dm", path.depth())
}

fn pad_to(buf: &mut Vec<u8>, align: usize, byte: u8) {
    let rem = buf.len() % align;
    if rem != 0 {
        buf.resize(buf.len() + align - rem, byte);
    }
}

fn push_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn to_gltf(p: DVec3, center: DVec3, up: UpAxis) -> Vec3 {
    let r = (p - center).as_vec3();
    match up {
        UpAxis::Z => r,
        UpAxis::Y => Vec3::new(r.x, r.z, -r.y),
    }
}

/// Encode a cropped mesh and its texture as a binary glTF 2.0 asset.
pub fn encode_glb(
    mesh: &CroppedMesh,
    texture: &CompressedTexture,
    options: &EncodeOptions,
) -> Result<Vec<u8>, EncodeError> {
    if mesh.faces.is_empty() {
        return Err(EncodeError::EmptyMesh);
    }
    let vertex_count = mesh.vertex_count();
    if let Some(&index) = mesh.faces.iter().flatten().find(|&&i| i as usize >= vertex_count) {
        return Err(EncodeError::IndexOutOfRange {
            index,
            vertex_count,
        });
    }

    let mut bin = Vec::new();

    let positions: Vec<Vec3> = mesh
        .positions
        .iter()
        .map(|&p| to_gltf(p, options.center, options.up_axis))
        .collect();
    let (pos_min, pos_max) = positions.iter().fold(
        (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
        |(lo, hi), &p| (lo.min(p), hi.max(p)),
    );
    for p in &positions {
        for c in p.to_array() {
            bin.extend_from_slice(&c.to_le_bytes());
        }
    }
    let pos_len = bin.len();

    let uv_offset = bin.len();
    for uv in &mesh.uvs {
        // glTF addresses textures from the top-left corner.
        let t = Vec2::new(uv.x, 1.0 - uv.y);
        bin.extend_from_slice(&t.x.to_le_bytes());
        bin.extend_from_slice(&t.y.to_le_bytes());
    }
    let uv_len = bin.len() - uv_offset;

    let index_offset = bin.len();
    let wide = vertex_count > usize::from(u16::MAX);
    for &i in mesh.faces.iter().flatten() {
        if wide {
            bin.extend_from_slice(&i.to_le_bytes());
        } else {
            bin.extend_from_slice(&(i as u16).to_le_bytes());
        }
    }
    let index_len = bin.len() - index_offset;
    pad_to(&mut bin, 4, 0);

    let image_offset = bin.len();
    bin.extend_from_slice(&texture.bytes);
    let image_len = texture.bytes.len();
    pad_to(&mut bin, 4, 0);

    let gltf = json!({
        "asset": { "version": "2.0", "generator": concat!("objtiles ", env!("CARGO_PKG_VERSION")) },
        "extensionsUsed": ["KHR_materials_unlit"],
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{
            "primitives": [{
                "attributes": { "POSITION": 0, "TEXCOORD_0": 1 },
                "indices": 2,
                "material": 0,
                "mode": 4
            }]
        }],
        "materials": [{
            "pbrMetallicRoughness": {
                "baseColorTexture": { "index": 0 },
                "metallicFactor": 0.0,
                "roughnessFactor": 1.0
            },
            "doubleSided": true,
            "extensions": { "KHR_materials_unlit": {} }
        }],
        "textures": [{ "sampler": 0, "source": 0 }],
        "samplers": [{
            "magFilter": LINEAR,
            "minFilter": LINEAR,
            "wrapS": CLAMP_TO_EDGE,
            "wrapT": CLAMP_TO_EDGE
        }],
        "images": [{ "bufferView": 3, "mimeType": texture.mime_type }],
        "buffers": [{ "byteLength": bin.len() }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": pos_len, "target": ARRAY_BUFFER },
            { "buffer": 0, "byteOffset": uv_offset, "byteLength": uv_len, "target": ARRAY_BUFFER },
            { "buffer": 0, "byteOffset": index_offset, "byteLength": index_len, "target": ELEMENT_ARRAY_BUFFER },
            { "buffer": 0, "byteOffset": image_offset, "byteLength": image_len }
        ],
        "accessors": [
            {
                "bufferView": 0,
                "componentType": FLOAT,
                "count": vertex_count,
                "type": "VEC3",
                "min": pos_min.to_array(),
                "max": pos_max.to_array()
            },
            { "bufferView": 1, "componentType": FLOAT, "count": vertex_count, "type": "VEC2" },
            {
                "bufferView": 2,
                "componentType": if wide { UNSIGNED_INT } else { UNSIGNED_SHORT },
                "count": mesh.faces.len() * 3,
                "type": "SCALAR"
            }
        ]
    });

    let mut json_chunk = serde_json::to_vec(&gltf)?;
    pad_to(&mut json_chunk, 4, b' ');
    // Keep the whole GLB a multiple of 8 so it can be embedded in b3dm.
    if (12 + 8 + json_chunk.len() + 8 + bin.len()) % 8 != 0 {
        json_chunk.extend_from_slice(b"    ");
    }

    let total = 12 + 8 + json_chunk.len() + 8 + bin.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(GLB_MAGIC);
    push_u32(&mut out, GLB_VERSION);
    push_u32(&mut out, length_field("GLB", total)?);
    push_u32(&mut out, length_field("glTF JSON chunk", json_chunk.len())?);
    push_u32(&mut out, CHUNK_JSON);
    out.extend_from_slice(&json_chunk);
    push_u32(&mut out, length_field("BIN chunk", bin.len())?);
    push_u32(&mut out, CHUNK_BIN);
    out.extend_from_slice(&bin);
    Ok(out)
}

/// Wrap a GLB in a b3dm v1 container with an empty batch.
pub fn encode_b3dm(glb: &[u8], rtc_center: DVec3) -> Result<Vec<u8>, EncodeError> {
    let feature_table = json!({
        "BATCH_LENGTH": 0,
        "RTC_CENTER": rtc_center.to_array(),
    });
    let mut ft = serde_json::to_vec(&feature_table)?;
    while (B3DM_HEADER_LEN + ft.len()) % 8 != 0 {
        ft.push(b' ');
    }

    let total = B3DM_HEADER_LEN + ft.len() + glb.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(B3DM_MAGIC);
    push_u32(&mut out, B3DM_VERSION);
    push_u32(&mut out, length_field("b3dm", total)?);
    push_u32(&mut out, length_field("feature table", ft.len())?);
    push_u32(&mut out, 0); // feature table binary
    push_u32(&mut out, 0); // batch table JSON
    push_u32(&mut out, 0); // batch table binary
    out.extend_from_slice(&ft);
    out.extend_from_slice(glb);
    Ok(out)
}

/// Parsed view of a GLB, for inspecting encoder output.
#[derive(Debug)]
pub struct GlbView<'a> {
    pub json: serde_json::Value,
    pub bin: &'a [u8],
}

impl<'a> GlbView<'a> {
    /// Split a GLB into its JSON and BIN chunks. Returns `None` on any
    /// structural mismatch.
    #[must_use]
    pub fn parse(glb: &'a [u8]) -> Option<Self> {
        let u32_at = |o: usize| -> Option<u32> {
            Some(u32::from_le_bytes(glb.get(o..o + 4)?.try_into().ok()?))
        };
        if glb.get(..4)? != GLB_MAGIC || u32_at(8)? as usize != glb.len() {
            return None;
        }
        let json_len = u32_at(12)? as usize;
        if u32_at(16)? != CHUNK_JSON {
            return None;
        }
        let json = serde_json::from_slice(glb.get(20..20 + json_len)?).ok()?;
        let bin_start = 20 + json_len;
        let bin_len = u32_at(bin_start)? as usize;
        if u32_at(bin_start + 4)? != CHUNK_BIN {
            return None;
        }
        let bin = glb.get(bin_start + 8..bin_start + 8 + bin_len)?;
        Some(Self { json, bin })
    }
}
