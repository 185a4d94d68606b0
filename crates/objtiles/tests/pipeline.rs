//! End-to-end runs over synthetic meshes.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use objtiles::objtiles_mesh::MeshError;
use objtiles::{Error, GlbView, SyntheticMesh, TILESET_FILE, Tile, TilerConfig, Tileset, generate};

fn config() -> TilerConfig {
    TilerConfig {
        target_texels_per_tile: None,
        ..TilerConfig::default()
    }
}

fn run(mesh: &SyntheticMesh, config: &TilerConfig) -> (tempfile::TempDir, PathBuf, Tileset) {
    let dir = tempfile::tempdir().unwrap();
    let obj = mesh.write(&dir.path().join("input"), "mesh").unwrap();
    let out = dir.path().join("out");
    generate(&obj, &out, config).unwrap();
    let tileset = Tileset::from_file(out.join(TILESET_FILE)).unwrap();
    (dir, out, tileset)
}

/// `(depth, tile)` pairs in pre-order.
fn flatten(root: &Tile) -> Vec<(u32, Tile)> {
    let mut tiles = Vec::new();
    root.walk(&mut |t, depth| tiles.push((depth, t.clone())));
    tiles
}

/// Embedded image of a b3dm payload: mime type and dimensions.
fn payload_image(path: &Path) -> (String, u32, u32) {
    let b3dm = fs::read(path).unwrap();
    assert_eq!(&b3dm[..4], b"b3dm");
    let ft_len = u32::from_le_bytes(b3dm[12..16].try_into().unwrap()) as usize;
    let view = GlbView::parse(&b3dm[28 + ft_len..]).unwrap();
    let image = &view.json["images"][0];
    let buffer_view = &view.json["bufferViews"][image["bufferView"].as_u64().unwrap() as usize];
    let offset = buffer_view["byteOffset"].as_u64().unwrap() as usize;
    let len = buffer_view["byteLength"].as_u64().unwrap() as usize;
    let decoded = image::load_from_memory(&view.bin[offset..offset + len]).unwrap();
    (
        image["mimeType"].as_str().unwrap().to_string(),
        decoded.width(),
        decoded.height(),
    )
}

/// Triangle count of a b3dm payload, read from its index accessor.
fn payload_faces(path: &Path) -> u64 {
    let b3dm = fs::read(path).unwrap();
    let ft_len = u32::from_le_bytes(b3dm[12..16].try_into().unwrap()) as usize;
    let view = GlbView::parse(&b3dm[28 + ft_len..]).unwrap();
    let indices = view.json["meshes"][0]["primitives"][0]["indices"].as_u64().unwrap() as usize;
    let count = view.json["accessors"][indices]["count"].as_u64().unwrap();
    assert_eq!(count % 3, 0);
    count / 3
}

fn read_tree(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fn go(base: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                go(base, &path, out);
            } else {
                out.insert(path.strip_prefix(base).unwrap().to_path_buf(), fs::read(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    go(dir, dir, &mut out);
    out
}

#[test]
fn single_triangle() {
    let (_dir, out, tileset) = run(&SyntheticMesh::triangle(64), &config());

    assert_eq!(tileset.root.count(), 1);
    assert!(tileset.root.children.is_empty());
    assert_eq!(tileset.root.geometric_error, 0.0);
    assert!(tileset.geometric_error > 0.0);
    assert_eq!(tileset.asset.version, "1.0");
    assert_eq!(tileset.asset.gltf_up_axis, "Z");

    let uri = &tileset.root.content.as_ref().unwrap().uri;
    assert_eq!(uri, "tiles/0/root.b3dm");
    let (mime, w, h) = payload_image(&out.join(uri));
    assert_eq!(mime, "image/png");
    assert_eq!((w, h), (64, 64));
}

#[test]
fn eight_octants() {
    let config = TilerConfig {
        max_depth: 1,
        max_faces_per_leaf: 1,
        ..config()
    };
    let (_dir, out, tileset) = run(&SyntheticMesh::octant_clusters(256), &config);

    assert_eq!(tileset.root.children.len(), 8);
    tileset.validate().unwrap();
    for (i, child) in tileset.root.children.iter().enumerate() {
        let uri = &child.content.as_ref().unwrap().uri;
        assert_eq!(uri, &format!("tiles/1/{i}.b3dm"));
        assert!(out.join(uri).is_file());
        assert!(child.children.is_empty());
        assert_eq!(child.geometric_error, 0.0);
    }
    assert!(tileset.root.geometric_error > 0.0);
    assert!(tileset.geometric_error >= tileset.root.geometric_error);
}

#[test]
fn containment_and_monotone_error() {
    let config = TilerConfig {
        max_depth: 4,
        max_faces_per_leaf: 8,
        ..config()
    };
    let (_dir, _out, tileset) = run(&SyntheticMesh::tilted_grid(16, 16.0, 0.05, 256), &config);
    tileset.validate().unwrap();

    fn check(tile: &Tile) {
        let parent = tile.bounding_volume.to_aabb();
        for child in &tile.children {
            assert!(parent.contains(&child.bounding_volume.to_aabb(), 1e-9));
            assert!(child.geometric_error <= tile.geometric_error);
            check(child);
        }
        if tile.children.is_empty() {
            assert_eq!(tile.geometric_error, 0.0);
        } else {
            assert!(tile.geometric_error > 0.0);
        }
    }
    check(&tileset.root);
}

#[test]
fn leaves_carry_every_input_face_once() {
    let config = TilerConfig {
        max_depth: 4,
        max_faces_per_leaf: 8,
        ..config()
    };
    let mesh = SyntheticMesh::tilted_grid(16, 16.0, 0.05, 256);
    let (_dir, out, tileset) = run(&mesh, &config);
    assert!(!tileset.root.children.is_empty());

    fn faces_below(tile: &Tile, out: &Path, leaf_total: &mut u64) -> u64 {
        let own = payload_faces(&out.join(&tile.content.as_ref().unwrap().uri));
        if tile.children.is_empty() {
            *leaf_total += own;
        } else {
            let children: u64 = tile.children.iter().map(|c| faces_below(c, out, leaf_total)).sum();
            assert_eq!(own, children);
        }
        own
    }
    let mut leaf_total = 0;
    let root = faces_below(&tileset.root, &out, &mut leaf_total);
    assert_eq!(leaf_total, mesh.faces.len() as u64);
    assert_eq!(root, mesh.faces.len() as u64);
}

#[test]
fn texture_detail_grows_with_depth() {
    let config = TilerConfig {
        max_depth: 3,
        max_faces_per_leaf: 8,
        texture_margin: 2,
        ..config()
    };
    let (_dir, out, tileset) = run(&SyntheticMesh::tilted_grid(16, 16.0, 0.05, 256), &config);
    let tiles = flatten(&tileset.root);
    assert_eq!(tiles.iter().map(|(d, _)| *d).max(), Some(3));

    // Texels per world unit along x, per tile.
    let density = |tile: &Tile| {
        let (mime, w, _) = payload_image(&out.join(&tile.content.as_ref().unwrap().uri));
        let extent = tile.bounding_volume.to_aabb().size().x;
        (mime, f64::from(w) / extent)
    };

    fn pairs<'a>(tile: &'a Tile, out: &mut Vec<(&'a Tile, &'a Tile)>) {
        for child in &tile.children {
            out.push((tile, child));
            pairs(child, out);
        }
    }
    let mut edges = Vec::new();
    pairs(&tileset.root, &mut edges);
    assert!(!edges.is_empty());

    for (parent, child) in edges {
        let (parent_mime, parent_density) = density(parent);
        let (child_mime, child_density) = density(child);
        assert_eq!(parent_mime, "image/jpeg");
        let expected = if child.children.is_empty() { "image/png" } else { "image/jpeg" };
        assert_eq!(child_mime, expected);
        assert!(
            child_density >= parent_density,
            "child {child_density} < parent {parent_density}"
        );
    }
}

#[test]
fn output_is_deterministic_across_thread_counts() {
    let mesh = SyntheticMesh::tilted_grid(12, 10.0, 0.1, 128);
    let base = TilerConfig {
        max_depth: 3,
        max_faces_per_leaf: 6,
        ..config()
    };
    let (_d1, out1, ts1) = run(&mesh, &TilerConfig { threads: 1, ..base.clone() });
    let (_d2, out2, ts2) = run(&mesh, &TilerConfig { threads: 4, ..base });

    assert_eq!(ts1, ts2);
    let (a, b) = (read_tree(&out1), read_tree(&out2));
    assert_eq!(a.keys().collect::<Vec<_>>(), b.keys().collect::<Vec<_>>());
    for (path, bytes) in &a {
        assert!(bytes == &b[path], "{} differs", path.display());
    }
}

#[test]
fn y_up_is_declared() {
    let config = TilerConfig {
        up_axis: objtiles::UpAxis::Y,
        ..config()
    };
    let (_dir, _out, tileset) = run(&SyntheticMesh::triangle(16), &config);
    assert_eq!(tileset.asset.gltf_up_axis, "Y");
}

#[test]
fn debug_outputs() {
    let config = TilerConfig {
        max_depth: 1,
        max_faces_per_leaf: 1,
        debug_glb: true,
        debug_tileset: true,
        ..config()
    };
    let (_dir, out, _tileset) = run(&SyntheticMesh::octant_clusters(64), &config);
    let debug = out.join("debug");

    let list = fs::read_to_string(debug.join("leaf_tiles.txt")).unwrap();
    let leaves: Vec<&str> = list.lines().collect();
    assert_eq!(leaves.len(), 8);
    for leaf in leaves {
        let glb = fs::read(debug.join(leaf)).unwrap();
        assert!(GlbView::parse(&glb).is_some(), "{leaf}");
    }
    assert!(debug.join("debug_glb_viewer.html").is_file());
    assert!(debug.join("debug_tileset_viewer.html").is_file());
}

#[test]
fn missing_texture_leaves_no_tileset() {
    let dir = tempfile::tempdir().unwrap();
    let obj = SyntheticMesh::triangle(8).write(dir.path(), "mesh").unwrap();
    fs::remove_file(dir.path().join("mesh.png")).unwrap();
    let out = dir.path().join("out");

    let err = generate(&obj, &out, &config()).unwrap_err();
    assert!(matches!(err, Error::Mesh(MeshError::Image { .. })), "{err}");
    assert!(!out.join(TILESET_FILE).exists());
}

#[test]
fn flat_mesh_leaves_no_tileset() {
    let mut mesh = SyntheticMesh::triangle(8);
    for p in &mut mesh.positions {
        p.z = 0.0;
    }
    let dir = tempfile::tempdir().unwrap();
    let obj = mesh.write(dir.path(), "flat").unwrap();
    let out = dir.path().join("out");

    let err = generate(&obj, &out, &config()).unwrap_err();
    assert!(matches!(err, Error::Mesh(MeshError::DegenerateMesh(_))), "{err}");
    assert!(!out.join(TILESET_FILE).exists());
}

#[test]
fn existing_output_needs_overwrite() {
    let mesh = SyntheticMesh::triangle(8);
    let (dir, out, _) = run(&mesh, &config());
    let obj = dir.path().join("input/mesh.obj");

    assert!(matches!(
        generate(&obj, &out, &config()),
        Err(Error::OutputExists(_))
    ));
    let again = TilerConfig {
        overwrite: true,
        ..config()
    };
    let summary = generate(&obj, &out, &again).unwrap();
    assert_eq!(summary.tiles, 1);
    assert_eq!(summary.tileset_path, out.join(TILESET_FILE));
}
