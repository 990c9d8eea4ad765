//! `partspec validate` — check an interchange JSON file.

use partspec_geometry::ValidatedParameterSet;
use std::path::Path;

pub fn run(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(file)?;
    let validated = ValidatedParameterSet::from_json(&content)?;

    println!("✅ {} is valid", file.display());
    println!("   Archetype: {}", validated.archetype);
    for (name, value) in &validated.dimensions {
        println!("   {name}: {}mm", value.value());
    }
    for (hole, center) in validated.holes.iter().zip(validated.hole_centers()) {
        println!(
            "   hole ⌀{}mm at ({:.3}, {:.3}){}",
            hole.diameter,
            center.x,
            center.y,
            hole.group_id
                .as_deref()
                .map(|g| format!(" [{g}]"))
                .unwrap_or_default()
        );
    }
    Ok(())
}
