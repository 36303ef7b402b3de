use anyhow::{anyhow, Context};
use colored::Colorize;
use hsdb::{parse_id, FieldSpec, Hsdb, HsdbConfig, ModelSchema, Record, SerializeOptions};
use tracing::warn;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    if config.data_dir.is_none() && cli.command.mutates() {
        warn!("no data_dir configured; changes will not outlive this process");
    }
    let db = Hsdb::open(config).context("failed to open store")?;
    let format = cli.format;
    match cli.command {
        Command::Schema(args) => cmd_schema(&db, args, format),
        Command::Get(args) => cmd_get(&db, args, format),
        Command::Query(args) => cmd_query(&db, args, format),
        Command::Count(args) => {
            let count = db.model(&args.model)?.count();
            match format {
                OutputFormat::Json => println!("{}", serde_json::json!({ "model": args.model, "count": count })),
                OutputFormat::Text => println!("{} {}", count.to_string().bold(), args.model),
            }
            Ok(())
        }
        Command::Create(args) => {
            let record = db.model(&args.model)?.create(parse_body(&args.json)?)?;
            print_record(&db, &record, format, "created");
            Ok(())
        }
        Command::Update(args) => {
            let record = db.update(&parse_id(&args.id)?, parse_body(&args.json)?)?;
            print_record(&db, &record, format, "updated");
            Ok(())
        }
        Command::Delete(args) => {
            let id = parse_id(&args.id)?;
            if db.delete(&id)? {
                println!("{} Deleted {}", "✓".green().bold(), id.to_string().yellow());
                Ok(())
            } else {
                Err(anyhow!("no record with id {id}"))
            }
        }
        Command::Fixtures(args) => {
            let report = db.install_fixtures(&args.path)?;
            println!("{} Fixtures from {}: {report}", "✓".green().bold(), args.path.display());
            Ok(())
        }
        Command::Install(args) => {
            let report = db.install_index(&args.path)?;
            println!("{} Index file {}: {report}", "✓".green().bold(), args.path.display());
            Ok(())
        }
        Command::Export(args) => {
            let written = db.export_index(&args.path)?;
            println!("{} Wrote {written} records to {}", "✓".green().bold(), args.path.display());
            Ok(())
        }
    }
}

impl Command {
    fn mutates(&self) -> bool {
        matches!(
            self,
            Self::Create(_) | Self::Update(_) | Self::Delete(_) | Self::Fixtures(_)
        )
    }
}

/// The config named on the command line with flag overrides applied. A
/// missing default config file means defaults.
pub fn load_config(cli: &Cli) -> anyhow::Result<HsdbConfig> {
    let mut config = if cli.config.is_file() {
        HsdbConfig::from_path(&cli.config)?
    } else if cli.config.as_os_str() == "hsdb.toml" {
        HsdbConfig::default()
    } else {
        return Err(anyhow!("config file {} not found", cli.config.display()));
    };
    if let Some(schema) = &cli.schema {
        config.schema_path = Some(schema.clone());
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    Ok(config)
}

fn parse_body(raw: &str) -> anyhow::Result<serde_json::Value> {
    serde_json::from_str(raw).context("record body must be a JSON object")
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn print_record(db: &Hsdb, record: &Record, format: OutputFormat, verb: &str) {
    let document = record.serialize(&SerializeOptions::default(), Some(db.storage().index()));
    match format {
        OutputFormat::Json => println!("{}", pretty(&document)),
        OutputFormat::Text => {
            println!(
                "{} {} {} {}",
                "✓".green().bold(),
                verb,
                record.model_name().bold(),
                record.id().to_string().yellow()
            );
            print_fields(&document);
        }
    }
}

fn print_fields(document: &serde_json::Value) {
    if let Some(fields) = document.as_object() {
        for (name, value) in fields {
            println!("  {}: {}", name.cyan(), value);
        }
    }
}

fn cmd_schema(db: &Hsdb, args: SchemaArgs, format: OutputFormat) -> anyhow::Result<()> {
    let schemas: Vec<std::sync::Arc<ModelSchema>> = match &args.model {
        Some(name) => vec![db.model(name)?.schema().clone()],
        None => db.registry().schemas().cloned().collect(),
    };
    match format {
        OutputFormat::Json => {
            let values = schemas
                .iter()
                .map(|schema| serde_json::to_value(schema.as_ref()))
                .collect::<Result<Vec<_>, _>>()?;
            println!("{}", pretty(&serde_json::Value::Array(values)));
        }
        OutputFormat::Text => {
            for schema in schemas {
                let lineage = schema.ancestry.join(" > ");
                println!(
                    "{} ({}) {}",
                    schema.model_name.bold(),
                    schema.resource_name_plural.cyan(),
                    lineage.dimmed()
                );
                for field in schema.fields() {
                    println!("  {}", describe_field(field));
                }
            }
        }
    }
    Ok(())
}

fn cmd_get(db: &Hsdb, args: GetArgs, format: OutputFormat) -> anyhow::Result<()> {
    let model = db.model(&args.model)?;
    let id = parse_id(&args.id)?;
    let record = model
        .get(&id)
        .ok_or_else(|| anyhow!("no {} with id {id}", args.model))?;
    let options = if args.expand {
        SerializeOptions::expand_relations()
    } else {
        SerializeOptions::default()
    };
    let document = model.serialize(&record, &options);
    match format {
        OutputFormat::Json => println!("{}", pretty(&document)),
        OutputFormat::Text => {
            println!("{} {}", record.model_name().bold(), id.to_string().yellow());
            print_fields(&document);
        }
    }
    Ok(())
}

fn cmd_query(db: &Hsdb, args: QueryArgs, format: OutputFormat) -> anyhow::Result<()> {
    let params = args
        .params
        .iter()
        .map(|p| {
            p.split_once('=')
                .ok_or_else(|| anyhow!("parameter {p} is not KEY=VALUE"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    let mut query = db.model(&args.model)?.query_params(params)?;
    let rows = query.all()?;
    let rendered = query.render(&rows);
    match format {
        OutputFormat::Json => println!("{}", pretty(&rendered)),
        OutputFormat::Text => {
            for row in rendered.as_array().into_iter().flatten() {
                println!("{row}");
            }
            println!("{} {} rows", "→".dimmed(), rows.len().to_string().bold());
        }
    }
    Ok(())
}

/// One line describing a field: name, type and set flags.
fn describe_field(field: &FieldSpec) -> String {
    let (kind, flags) = match field {
        FieldSpec::Attribute(attr) => (attr.value_type.to_string(), attr.flags),
        FieldSpec::Relation(rel) => (
            format!("{} -> {}.{}", rel.kind, rel.secondary_model, rel.relation_key),
            rel.flags,
        ),
    };
    let tags: Vec<&str> = [
        (flags.required, "required"),
        (flags.computed, "computed"),
        (flags.indexed, "indexed"),
        (flags.unique, "unique"),
        (flags.searchable, "searchable"),
        (!flags.editable && !flags.computed, "read-only"),
    ]
    .into_iter()
    .filter_map(|(on, tag)| on.then_some(tag))
    .collect();
    format!("{} {} {}", field.name().cyan(), kind, tags.join(",").dimmed())
}
