//! Example: Load and inspect a scene file.
//!
//! Run with: cargo run -p lumen_core --example inspect_scene -- scenes/demo.json

use std::env;

use lumen_core::{load_scene, LoadOptions, ObjectKind, Shape};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: inspect_scene <path-to-scene.json>");
        println!("\nExamples:");
        println!("  cargo run -p lumen_core --example inspect_scene -- scenes/demo.json");
        return;
    }

    let path = &args[1];
    println!("Loading scene file: {}", path);

    match load_scene(path, &LoadOptions::default()) {
        Ok(loaded) => {
            let scene = &loaded.scene;
            println!("\n=== Scene: {} ===", loaded.path.display());
            println!("Objects: {}", scene.object_count());
            println!("Emitters: {}", scene.emitter_count());
            println!("Cameras: {}", scene.cameras.len());

            println!("\n--- Object kinds ---");
            for kind in [
                ObjectKind::Sphere,
                ObjectKind::Cylinder,
                ObjectKind::Cone,
                ObjectKind::Plane,
                ObjectKind::Triangle,
            ] {
                println!("  {:<9} {}", kind, scene.count_of(kind));
            }

            println!("\n--- Objects ---");
            for object in &scene.objects {
                let p = object.position;
                let d = object.direction;
                println!(
                    "  [{}] {} at ({:.2}, {:.2}, {:.2}) dir ({:.2}, {:.2}, {:.2})",
                    object.id, object.kind(), p.x, p.y, p.z, d.x, d.y, d.z
                );
                match object.shape {
                    Shape::Plane { distance } => println!("       distance: {:.2}", distance),
                    Shape::Triangle { .. } => {}
                    ref shape => println!("       radius: {:.2}", shape.radius()),
                }
                println!(
                    "       texture: {}, normal: {}, reflection: {:.2}",
                    object.surface.texture, object.surface.normal, object.surface.reflection
                );
            }

            println!("\n--- Cameras ---");
            for (i, camera) in scene.cameras.iter().enumerate() {
                let p = camera.position;
                let d = camera.direction;
                println!(
                    "  [{}] at ({:.2}, {:.2}, {:.2}) looking ({:.2}, {:.2}, {:.2})",
                    i, p.x, p.y, p.z, d.x, d.y, d.z
                );
            }

            println!("\n--- Resources ---");
            println!(
                "  Textures: {:?} ({:.1} KB)",
                loaded.textures.names(),
                loaded.textures.total_size_bytes() as f32 / 1024.0
            );
            println!(
                "  Normal maps: {:?} ({:.1} KB)",
                loaded.normals.names(),
                loaded.normals.total_size_bytes() as f32 / 1024.0
            );
        }
        Err(e) => {
            eprintln!("Error loading scene file: {}", e);
        }
    }
}
