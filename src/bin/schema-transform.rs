//! Schema Transform CLI
//!
//! Command-line interface for unmarshaling, marshaling and validating payloads
//! against a Swagger / OpenAPI document.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

use schema_transform::{
    load_spec, load_spec_auto, marshal, marshal_request, unmarshal, unmarshal_response, validate,
    Native, PayloadError, SchemaId, Spec, SpecConfig, ValidateError,
};

#[derive(Parser)]
#[command(name = "schema-transform")]
#[command(about = "Transform API payloads using the schemas of a Swagger/OpenAPI document")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a wire payload into its native form
    Unmarshal {
        #[command(flatten)]
        target: Target,

        /// Skip response validation before unmarshaling
        #[arg(long)]
        no_validate: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Convert a native payload back into its wire form
    Marshal {
        #[command(flatten)]
        target: Target,

        /// Skip request validation after marshaling
        #[arg(long)]
        no_validate: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Validate a wire payload against a schema
    Validate {
        #[command(flatten)]
        target: Target,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// List the models defined by a document
    Models {
        /// Spec source: file path or URL (http:// or https://)
        spec: String,

        /// Options file (JSON object of spec options)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct Target {
    /// Spec source: file path or URL (http:// or https://)
    spec: String,

    /// Payload file
    payload: PathBuf,

    /// Definition name (e.g. Pet) or JSON pointer (e.g. #/definitions/Pet)
    #[arg(long, short)]
    schema: String,

    /// Options file (JSON object of spec options)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Unmarshal {
            target,
            no_validate,
            pretty,
        } => run_unmarshal(&target, no_validate, pretty),
        Commands::Marshal {
            target,
            no_validate,
            pretty,
        } => run_marshal(&target, no_validate, pretty),
        Commands::Validate { target, json } => run_validate(&target, json),
        Commands::Models { spec, config } => run_models(&spec, config.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn run_unmarshal(target: &Target, no_validate: bool, pretty: bool) -> Result<(), u8> {
    let (spec, schema) = load_target(target)?;
    let payload = load_payload(&target.payload)?;

    let native = if no_validate {
        unmarshal(&spec, schema, &payload).map_err(PayloadError::from)
    } else {
        unmarshal_response(&spec, schema, &payload)
    }
    .map_err(report_payload_error)?;

    print_json(&render(&native), pretty)
}

fn run_marshal(target: &Target, no_validate: bool, pretty: bool) -> Result<(), u8> {
    let (spec, schema) = load_target(target)?;
    let native = Native::from(load_payload(&target.payload)?);

    let wire = if no_validate {
        marshal(&spec, schema, &native).map_err(PayloadError::from)
    } else {
        marshal_request(&spec, schema, &native)
    }
    .map_err(report_payload_error)?;

    print_json(&wire, pretty)
}

fn run_validate(target: &Target, json_output: bool) -> Result<(), u8> {
    let (spec, schema) = load_target(target).map_err(|code| {
        if json_output {
            println!(r#"{{"valid":false}}"#);
        }
        code
    })?;
    let payload = load_payload(&target.payload)?;

    match validate(&spec, schema, &payload) {
        Ok(()) => {
            if json_output {
                println!(r#"{{"valid":true}}"#);
            } else {
                println!("Valid");
            }
            Ok(())
        }
        Err(ValidateError::Invalid { errors }) => {
            if json_output {
                let output = serde_json::json!({
                    "valid": false,
                    "errors": errors
                });
                println!("{}", output);
            } else {
                eprintln!("Validation failed:");
                for error in errors {
                    eprintln!("  {}", error);
                }
            }
            Err(1)
        }
        Err(e @ ValidateError::Spec(_)) => {
            eprintln!("Error: {}", e);
            Err(e.exit_code() as u8)
        }
    }
}

fn run_models(source: &str, config: Option<&Path>) -> Result<(), u8> {
    let spec = load(source, config)?;

    for model in spec.definitions().values() {
        let mut line = model.name.clone();
        if !model.ancestors.is_empty() {
            let parents: Vec<&str> = model.ancestors.iter().map(String::as_str).collect();
            line.push_str(&format!(" : {}", parents.join(", ")));
        }
        if let Some(discriminator) = &model.discriminator {
            line.push_str(&format!(" [discriminator: {}]", discriminator));
        }
        println!("{}", line);
    }
    Ok(())
}

fn load_target(target: &Target) -> Result<(Spec, SchemaId), u8> {
    let spec = load(&target.spec, target.config.as_deref())?;
    let schema = spec.resolve_schema(&target.schema).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    Ok((spec, schema))
}

fn load(source: &str, config: Option<&Path>) -> Result<Spec, u8> {
    let config = match config {
        Some(path) => load_config(path)?,
        None => SpecConfig::default(),
    };

    let document = load_spec_auto(source).map_err(|e| {
        eprintln!("Error: loading spec: {}", e);
        e.exit_code() as u8
    })?;

    Spec::from_value(document, config).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn load_config(path: &Path) -> Result<SpecConfig, u8> {
    let value = load_spec(path).map_err(|e| {
        eprintln!("Error: loading config: {}", e);
        e.exit_code() as u8
    })?;
    serde_json::from_value(value).map_err(|e| {
        eprintln!("Error: invalid config {}: {}", path.display(), e);
        2u8
    })
}

fn load_payload(path: &Path) -> Result<Value, u8> {
    load_spec(path).map_err(|e| {
        eprintln!("Error: loading payload: {}", e);
        e.exit_code() as u8
    })
}

fn report_payload_error(error: PayloadError) -> u8 {
    match &error {
        PayloadError::Validate(ValidateError::Invalid { errors }) => {
            eprintln!("Validation failed:");
            for e in errors {
                eprintln!("  {}", e);
            }
        }
        _ => eprintln!("Error: {}", error),
    }
    error.exit_code() as u8
}

/// JSON rendering of a native value; models carry their name under `x-model`.
fn render(native: &Native) -> Value {
    match native {
        Native::List(items) => Value::Array(items.iter().map(render).collect()),
        Native::Map(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render(v)))
                .collect::<Map<String, Value>>(),
        ),
        Native::Model(model) => {
            let mut object = Map::new();
            object.insert("x-model".to_string(), Value::String(model.name().to_string()));
            for (k, v) in model.properties() {
                object.insert(k.clone(), render(v));
            }
            Value::Object(object)
        }
        other => other.to_wire(),
    }
}

fn print_json(value: &Value, pretty: bool) -> Result<(), u8> {
    let output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    println!("{}", output);
    Ok(())
}
