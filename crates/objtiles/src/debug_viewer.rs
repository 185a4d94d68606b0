//! Browser pages for eyeballing tiler output.
//!
//! Both pages are static HTML that load three.js from a CDN. Serve the
//! output directory over HTTP (e.g. `python3 -m http.server`) and open
//! `debug/<page>.html`.

use std::fs;
use std::path::Path;

use glam::DVec3;
use tracing::info;

use crate::error::{Error, Result};

pub const DEBUG_DIR: &str = "debug";
pub const LEAF_LIST: &str = "leaf_tiles.txt";
pub const GLB_VIEWER: &str = "debug_glb_viewer.html";
pub const TILESET_VIEWER: &str = "debug_tileset_viewer.html";

const IMPORT_MAP: &str = r#"<script type="importmap">
{ "imports": {
    "three": "https://unpkg.com/three@0.160.0/build/three.module.js",
    "three/addons/": "https://unpkg.com/three@0.160.0/examples/jsm/",
    "3d-tiles-renderer": "https://unpkg.com/3d-tiles-renderer@0.3.31/src/index.js"
} }
</script>"#;

const GLB_VIEWER_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>objtiles: leaf tiles</title>
<style>body { margin: 0; overflow: hidden; }</style>
{{ import_map }}
</head>
<body>
<script type="module">
import * as THREE from 'three';
import { OrbitControls } from 'three/addons/controls/OrbitControls.js';
import { GLTFLoader } from 'three/addons/loaders/GLTFLoader.js';

const leafTiles = {{ leaf_tiles }};
const width = {{ width }};

const renderer = new THREE.WebGLRenderer({ antialias: true });
renderer.setSize(window.innerWidth, window.innerHeight);
document.body.appendChild(renderer.domElement);

const scene = new THREE.Scene();
scene.background = new THREE.Color(0x202020);
const camera = new THREE.PerspectiveCamera(45, window.innerWidth / window.innerHeight, width / 1000, width * 100);
camera.position.set(0, width, width);
const controls = new OrbitControls(camera, renderer.domElement);

const loader = new GLTFLoader();
for (const uri of leafTiles) {
  loader.load(uri, (gltf) => scene.add(gltf.scene));
}

window.addEventListener('resize', () => {
  camera.aspect = window.innerWidth / window.innerHeight;
  camera.updateProjectionMatrix();
  renderer.setSize(window.innerWidth, window.innerHeight);
});

renderer.setAnimationLoop(() => {
  controls.update();
  renderer.render(scene, camera);
});
</script>
</body>
</html>
"#;

const TILESET_VIEWER_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>objtiles: tileset</title>
<style>body { margin: 0; overflow: hidden; }</style>
{{ import_map }}
</head>
<body>
<script type="module">
import * as THREE from 'three';
import { OrbitControls } from 'three/addons/controls/OrbitControls.js';
import { DebugTilesRenderer } from '3d-tiles-renderer';

const centroid = new THREE.Vector3(...{{ centroid }});
const width = {{ width }};

const renderer = new THREE.WebGLRenderer({ antialias: true });
renderer.setSize(window.innerWidth, window.innerHeight);
document.body.appendChild(renderer.domElement);

const scene = new THREE.Scene();
scene.background = new THREE.Color(0x202020);
const camera = new THREE.PerspectiveCamera(45, window.innerWidth / window.innerHeight, width / 1000, width * 100);
camera.position.set(0, width, width);
const controls = new OrbitControls(camera, renderer.domElement);

// Tiles are Z-up; three.js is Y-up.
const frame = new THREE.Group();
frame.rotation.x = -Math.PI / 2;
frame.position.copy(centroid.clone().set(-centroid.x, -centroid.z, centroid.y));
scene.add(frame);

const tiles = new DebugTilesRenderer('../tileset.json');
tiles.displayBoxBounds = true;
tiles.setCamera(camera);
tiles.setResolutionFromRenderer(camera, renderer);
frame.add(tiles.group);

window.addEventListener('resize', () => {
  camera.aspect = window.innerWidth / window.innerHeight;
  camera.updateProjectionMatrix();
  renderer.setSize(window.innerWidth, window.innerHeight);
  tiles.setResolutionFromRenderer(camera, renderer);
});

renderer.setAnimationLoop(() => {
  controls.update();
  camera.updateMatrixWorld();
  tiles.update();
  renderer.render(scene, camera);
});
</script>
</body>
</html>
"#;

fn render(template: &str, params: &[(&str, String)]) -> String {
    params
        .iter()
        .fold(template.replace("{{ import_map }}", IMPORT_MAP), |text, (key, value)| {
            text.replace(&format!("{{{{ {key} }}}}"), value)
        })
}

fn write(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::write(path, text).map_err(|e| Error::io(path, e))
}

/// Write `leaf_tiles.txt` and the GLB viewer. `leaf_uris` are relative to
/// the debug directory.
pub fn write_glb_viewer(debug_dir: &Path, leaf_uris: &[String], width: f64) -> Result<()> {
    write(&debug_dir.join(LEAF_LIST), &(leaf_uris.join("\n") + "\n"))?;

    let html = render(
        GLB_VIEWER_TEMPLATE,
        &[
            ("leaf_tiles", serde_json::to_string(leaf_uris)?),
            ("width", format!("{width}")),
        ],
    );
    let path = debug_dir.join(GLB_VIEWER);
    write(&path, &html)?;
    info!(path = %path.display(), leaves = leaf_uris.len(), "wrote GLB debug viewer");
    Ok(())
}

/// Write the tileset viewer, framed on the mesh centre.
pub fn write_tileset_viewer(debug_dir: &Path, centroid: DVec3, width: f64) -> Result<()> {
    let html = render(
        TILESET_VIEWER_TEMPLATE,
        &[
            ("centroid", serde_json::to_string(&centroid.to_array())?),
            ("width", format!("{width}")),
        ],
    );
    let path = debug_dir.join(TILESET_VIEWER);
    write(&path, &html)?;
    info!(path = %path.display(), "wrote tileset debug viewer");
    Ok(())
}
