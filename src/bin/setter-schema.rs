//! Setter Schema CLI
//!
//! Command-line interface for creating setters and editing document fields.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::json;
use setter_schema::{
    load_value, run, validate_schema, FieldMatchSpec, FieldPath, LocalPackage, Mutation,
    SchemaCache, SetterCreator,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "setter-schema")]
#[command(about = "Create setters and splice values into structured documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update a setter and reference it from matching fields
    CreateSetter {
        /// Package directory (or single file) holding the documents
        resources: PathBuf,

        /// Setter name
        name: String,

        /// Value written into matching fields (omit to only reference them)
        value: Option<String>,

        /// Registry file (default: Kptfile in RESOURCES, or next to it if it's a file)
        #[arg(long)]
        registry: Option<PathBuf>,

        /// Field path or path suffix, slash-delimited (e.g. containers/image)
        #[arg(long)]
        field: Option<String>,

        /// Only match fields with this name
        #[arg(long)]
        field_name: Option<String>,

        /// Only match fields with this current value
        #[arg(long)]
        field_value: Option<String>,

        /// Declared type (object, array, string, integer, number, boolean, file, null)
        #[arg(long = "type")]
        setter_type: Option<String>,

        /// JSON or YAML file with the setter's schema
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Setter description
        #[arg(long, default_value = "")]
        description: String,

        /// Who set the current value
        #[arg(long, default_value = "")]
        set_by: String,

        /// Consumers must set this setter before apply
        #[arg(long)]
        required: bool,

        /// Splice position: 0 replaces, 1 prefixes, past the end appends
        #[arg(long, default_value_t = 0)]
        position: usize,

        /// Segment delimiter for positional splicing
        #[arg(long, default_value = "/")]
        delimiter: String,
    },

    /// Set a value at a field path in every document, creating the path if missing
    AddValue {
        /// Package directory (or single file) holding the documents
        resources: PathBuf,

        /// Field path from the document root, slash-delimited
        #[arg(long)]
        field: String,

        /// Value to write
        #[arg(long)]
        value: String,

        /// Splice position: 0 replaces, 1 prefixes, past the end appends
        #[arg(long, default_value_t = 0)]
        position: usize,

        /// Segment delimiter for positional splicing
        #[arg(long, default_value = "/")]
        delimiter: String,
    },

    /// Check that a schema only uses supported type tags
    ValidateSchema {
        /// JSON or YAML schema file
        schema: PathBuf,
    },

    /// List the setters recorded in a registry file
    ListSetters {
        /// Registry file
        registry: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::CreateSetter {
            resources,
            name,
            value,
            registry,
            field,
            field_name,
            field_value,
            setter_type,
            schema,
            description,
            set_by,
            required,
            position,
            delimiter,
        } => {
            let mut creator = SetterCreator::new(name);
            creator.value = value;
            creator.field_path = field.as_deref().map(FieldPath::parse).unwrap_or_default();
            creator.field_name = field_name;
            creator.field_value = field_value;
            creator.setter_type = setter_type.unwrap_or_default();
            creator.description = description;
            creator.set_by = set_by;
            creator.required = required;
            creator.file_path_position = position;
            creator.delimiter = delimiter;
            let registry = registry.unwrap_or_else(|| default_registry(&resources));
            run_create_setter(creator, &resources, &registry, schema.as_deref())
        }

        Commands::AddValue {
            resources,
            field,
            value,
            position,
            delimiter,
        } => run_add_value(&resources, &field, value, position, delimiter),

        Commands::ValidateSchema { schema } => run_validate_schema(&schema),

        Commands::ListSetters { registry, json } => run_list_setters(&registry, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn default_registry(resources: &Path) -> PathBuf {
    let package = if resources.is_file() {
        resources.parent().unwrap_or_else(|| Path::new(""))
    } else {
        resources
    };
    package.join("Kptfile")
}

fn run_create_setter(
    mut creator: SetterCreator,
    resources: &Path,
    registry: &Path,
    schema: Option<&Path>,
) -> Result<(), u8> {
    if let Some(schema_path) = schema {
        let schema = load_value(schema_path).map_err(|e| {
            eprintln!("Error loading schema: {}", e);
            e.exit_code() as u8
        })?;
        creator.schema = Some(schema);
    }

    let cache = SchemaCache::new();
    let outcome = creator
        .create_in_package(registry, resources, &cache)
        .map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?;

    println!(
        "created setter {} ({} field(s) reference it)",
        outcome.definition.name, outcome.count
    );
    Ok(())
}

fn run_add_value(
    resources: &Path,
    field: &str,
    value: String,
    position: usize,
    delimiter: String,
) -> Result<(), u8> {
    let spec = FieldMatchSpec::new(FieldPath::parse(field));
    let mutation = Mutation::set(value)
        .position(position)
        .delimiter(delimiter)
        .create_missing();
    let mut package = LocalPackage::new(resources);

    let result = run(&mut package, &spec, &mutation).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    println!("{} field(s) updated", result.count);
    Ok(())
}

fn run_validate_schema(path: &Path) -> Result<(), u8> {
    let schema = load_value(path).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    match validate_schema(&schema) {
        Ok(()) => {
            println!("Valid");
            Ok(())
        }
        Err(e) => {
            eprintln!("Invalid schema: {}", e);
            Err(1)
        }
    }
}

fn run_list_setters(registry: &Path, json_output: bool) -> Result<(), u8> {
    if !registry.exists() {
        eprintln!("Error: file not found: {}", registry.display());
        return Err(3);
    }

    let cache = SchemaCache::new();
    let known = cache.get(registry).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    if json_output {
        let setters: Vec<_> = known
            .iter()
            .map(|def| {
                json!({
                    "name": def.name,
                    "value": def.value,
                    "listValues": def.list_values,
                    "type": def.setter_type,
                    "description": def.description,
                    "setBy": def.set_by,
                    "required": def.required,
                })
            })
            .collect();
        println!("{}", serde_json::Value::Array(setters));
        return Ok(());
    }

    for def in known.iter() {
        let value = if def.list_values.is_empty() {
            def.value.clone().unwrap_or_default()
        } else {
            format!("[{}]", def.list_values.join(", "))
        };
        let mut line = format!("{}\t{}", def.name, value);
        if !def.setter_type.is_empty() {
            line.push_str(&format!("\t({})", def.setter_type));
        }
        if !def.description.is_empty() {
            line.push_str(&format!("\t{}", def.description));
        }
        if def.required {
            line.push_str("\trequired");
        }
        println!("{}", line);
    }
    Ok(())
}
