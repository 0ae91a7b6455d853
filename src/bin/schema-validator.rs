//! # Entity Schema Validator
//!
//! A command-line utility for checking entity schema files before they are
//! handed to a [`SchemaRegistry`].
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin schema-validator schemas/user.json
//! cargo run --bin schema-validator ./schemas/
//! ```
//!
//! A single file is parsed and every schema in it is checked on its own
//! (identifier declared, names unique). A directory is checked file by file
//! and then loaded as one registry, which also verifies that every
//! association targets a registered type.
//!
//! ## Output Example
//!
//! ```text
//! Validating schemas in directory: ./schemas/
//!
//! Validating: address.json
//!   ✓ Valid - Address
//!
//! Validating: user.json
//!   ✓ Valid - User
//!
//! Validation Summary:
//!   Valid files: 2
//!   Invalid files: 0
//!
//! Testing schema registry loading...
//! ✓ Schema registry loaded successfully
//!   Entity types: Address, User
//! ```
//!
//! ## Exit Codes
//!
//! - `0`: All schemas are valid
//! - `1`: One or more schemas are invalid or the path is unusable

use entity_configurator::schema::{Cardinality, EntitySchema, SchemaRegistry};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <schema-file-or-directory>", args[0]);
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  {} schemas/user.json", args[0]);
        eprintln!("  {} ./schemas/", args[0]);
        process::exit(1);
    }

    let path = Path::new(&args[1]);

    if path.is_file() {
        validate_single_file(path);
    } else if path.is_dir() {
        validate_directory(path);
    } else {
        eprintln!("Error: '{}' is not a valid file or directory", path.display());
        process::exit(1);
    }
}

fn validate_single_file(file_path: &Path) {
    println!("Validating schema file: {}", file_path.display());

    match load_schemas(file_path) {
        Ok(schemas) => {
            println!("✓ Schema file is valid!");
            for schema in &schemas {
                print_schema_summary(schema);
            }
        }
        Err(e) => {
            eprintln!("❌ Schema validation failed: {e}");
            process::exit(1);
        }
    }
}

fn validate_directory(dir_path: &Path) {
    println!("Validating schemas in directory: {}", dir_path.display());

    let mut paths = match fs::read_dir(dir_path) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("json"))
            .collect::<Vec<_>>(),
        Err(e) => {
            eprintln!("Error reading directory: {e}");
            process::exit(1);
        }
    };
    paths.sort();

    let mut valid_count = 0;
    let mut error_count = 0;
    for path in &paths {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("\nValidating: {file_name}");

        match load_schemas(path) {
            Ok(schemas) => {
                let names: Vec<&str> = schemas.iter().map(|s| s.name.as_str()).collect();
                println!("  ✓ Valid - {}", names.join(", "));
                valid_count += 1;
            }
            Err(e) => {
                eprintln!("  ❌ Invalid - {e}");
                error_count += 1;
            }
        }
    }

    println!("\nValidation Summary:");
    println!("  Valid files: {valid_count}");
    println!("  Invalid files: {error_count}");

    if error_count > 0 {
        process::exit(1);
    }

    println!("\nTesting schema registry loading...");
    match SchemaRegistry::from_schema_dir(dir_path) {
        Ok(registry) => {
            println!("✓ Schema registry loaded successfully");
            println!("  Entity types: {}", registry.entity_types().join(", "));
        }
        Err(e) => {
            eprintln!("❌ Failed to load schema registry: {e}");
            process::exit(1);
        }
    }
}

/// Parse one file (a schema or an array of schemas) and check each schema.
fn load_schemas(file_path: &Path) -> Result<Vec<EntitySchema>, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(file_path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;

    let schemas: Vec<EntitySchema> = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        vec![serde_json::from_value(value)?]
    };
    if schemas.is_empty() {
        return Err("file declares no schemas".into());
    }

    for schema in &schemas {
        if schema.name.is_empty() {
            return Err("schema name cannot be empty".into());
        }
        schema.check()?;
    }
    Ok(schemas)
}

fn print_schema_summary(schema: &EntitySchema) {
    println!();
    println!("Schema Summary:");
    println!("  Name: {}", schema.name);
    if !schema.description.is_empty() {
        println!("  Description: {}", schema.description);
    }
    println!(
        "  Identifier: {} ({:?})",
        schema.identifier.join(", "),
        schema.id_strategy
    );
    println!("  Fields: {}", schema.fields.len());

    let mut type_counts = BTreeMap::new();
    for field in &schema.fields {
        *type_counts.entry(field.data_type.as_str()).or_insert(0) += 1;
    }
    println!("  Field types:");
    for (field_type, count) in type_counts {
        println!("    - {field_type}: {count}");
    }

    let constrained: Vec<&str> = schema
        .fields
        .iter()
        .filter(|field| !field.constraints.is_empty())
        .map(|field| field.name.as_str())
        .collect();
    if !constrained.is_empty() {
        println!("  Constrained fields: {}", constrained.join(", "));
    }

    if !schema.associations.is_empty() {
        println!("  Associations:");
        for association in &schema.associations {
            let arity = match association.cardinality {
                Cardinality::One => "one",
                Cardinality::Many => "many",
            };
            println!("    - {} -> {} ({arity})", association.name, association.target);
        }
    }
}
