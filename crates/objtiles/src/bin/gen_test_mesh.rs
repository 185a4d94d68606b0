//! Write synthetic textured meshes for exercising the tiler.
//!
//! Produces three OBJ/MTL/PNG sets: a single triangle, one triangle per
//! octant of the unit cube, and a large tilted grid that subdivides several
//! levels deep.
//!
//! Run: `cargo run -p objtiles --features test-tools --bin gen_test_mesh -- [output_dir] [grid_cells]`

use std::env;
use std::path::Path;

use objtiles::SyntheticMesh;

const OUTPUT_DIR: &str = "test_meshes";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let output_path = Path::new(args.get(1).map_or(OUTPUT_DIR, String::as_str));
    let cells: u32 = match args.get(2) {
        Some(s) => s.parse()?,
        None => 128,
    };

    println!("Writing test meshes to {}\n", output_path.display());

    let sets = [
        ("triangle", SyntheticMesh::triangle(64)),
        ("octants", SyntheticMesh::octant_clusters(256)),
        ("grid", SyntheticMesh::tilted_grid(cells, 100.0, 0.05, 4096)),
    ];
    for (stem, mesh) in &sets {
        let obj = mesh.write(output_path, stem)?;
        println!(
            "  {stem}: {} vertices, {} faces, {}x{} texture -> {}",
            mesh.positions.len(),
            mesh.faces.len(),
            mesh.texture.width(),
            mesh.texture.height(),
            obj.display()
        );
    }

    println!("\nDone.");
    Ok(())
}
