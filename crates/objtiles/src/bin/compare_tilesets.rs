//! Compare two tiler output directories.
//!
//! Checks that both `tileset.json` files describe the same tree (bounding
//! volumes and geometric errors within a tolerance, identical content URIs)
//! and that every referenced payload is byte-identical. Used to confirm
//! that a run is independent of thread count.
//!
//! Run: `cargo run -p objtiles --features test-tools --bin compare_tilesets -- <dir_a> <dir_b>`

use std::env;
use std::fs;
use std::path::Path;

use objtiles::{TILESET_FILE, Tile, Tileset};

const TOLERANCE: f64 = 1e-9;

fn main() {
    let args: Vec<String> = env::args().collect();
    let (Some(a), Some(b)) = (args.get(1), args.get(2)) else {
        eprintln!("usage: compare_tilesets <dir_a> <dir_b>");
        std::process::exit(2);
    };
    let (dir_a, dir_b) = (Path::new(a), Path::new(b));

    println!("A: {}", dir_a.display());
    println!("B: {}\n", dir_b.display());

    let load = |dir: &Path| {
        Tileset::from_file(dir.join(TILESET_FILE)).unwrap_or_else(|e| {
            eprintln!("Failed to read tileset in {}: {e}", dir.display());
            std::process::exit(1);
        })
    };
    let (ts_a, ts_b) = (load(dir_a), load(dir_b));

    let mut all_passed = true;

    println!("--- Tileset ---");
    match compare_tileset(&ts_a, &ts_b) {
        Ok(()) => println!("PASSED\n"),
        Err(e) => {
            println!("FAILED: {e}\n");
            all_passed = false;
        }
    }

    println!("--- Payloads ---");
    match compare_payloads(&ts_a.root, dir_a, dir_b) {
        Ok(n) => println!("  {n} payloads identical\nPASSED\n"),
        Err(e) => {
            println!("FAILED: {e}\n");
            all_passed = false;
        }
    }

    if all_passed {
        println!("All comparisons PASSED!");
    } else {
        println!("Some comparisons FAILED!");
        std::process::exit(1);
    }
}

fn compare_tileset(a: &Tileset, b: &Tileset) -> Result<(), String> {
    if a.asset != b.asset {
        return Err(format!("asset mismatch: {:?} vs {:?}", a.asset, b.asset));
    }
    compare_f64("geometricError", a.geometric_error, b.geometric_error)?;
    compare_tile("root", &a.root, &b.root)?;
    println!("  {} tiles match", a.root.count());
    Ok(())
}

fn compare_tile(name: &str, a: &Tile, b: &Tile) -> Result<(), String> {
    compare_f64(&format!("{name}.geometricError"), a.geometric_error, b.geometric_error)?;
    for (i, (x, y)) in a
        .bounding_volume
        .bbox
        .iter()
        .zip(&b.bounding_volume.bbox)
        .enumerate()
    {
        compare_f64(&format!("{name}.box[{i}]"), *x, *y)?;
    }
    if a.content != b.content {
        return Err(format!(
            "{name}.content: mismatch: {:?} vs {:?}",
            a.content, b.content
        ));
    }
    if a.children.len() != b.children.len() {
        return Err(format!(
            "{name}.children: length mismatch: {} vs {}",
            a.children.len(),
            b.children.len()
        ));
    }
    for (i, (x, y)) in a.children.iter().zip(&b.children).enumerate() {
        compare_tile(&format!("{name}.children[{i}]"), x, y)?;
    }
    Ok(())
}

fn compare_f64(name: &str, a: f64, b: f64) -> Result<(), String> {
    let diff = (a - b).abs();
    if diff > TOLERANCE {
        return Err(format!("{name}: mismatch: a={a}, b={b}, diff={diff}"));
    }
    Ok(())
}

fn compare_payloads(root: &Tile, dir_a: &Path, dir_b: &Path) -> Result<usize, String> {
    let mut uris = Vec::new();
    root.walk(&mut |t, _| {
        if let Some(c) = &t.content {
            uris.push(c.uri.clone());
        }
    });

    for uri in &uris {
        let read = |dir: &Path| {
            fs::read(dir.join(uri)).map_err(|e| format!("failed to read {uri} in {}: {e}", dir.display()))
        };
        let (a, b) = (read(dir_a)?, read(dir_b)?);
        if a != b {
            return Err(format!(
                "{uri}: contents differ ({} vs {} bytes)",
                a.len(),
                b.len()
            ));
        }
    }
    Ok(uris.len())
}
