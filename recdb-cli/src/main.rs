use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use recdb::fex::{Fex, FexKind};
use recdb::integrity::{check_record, integrity_check};
use recdb::query::parse_index_list;
use recdb::{
    Database, DeleteOptions, Field, InsertOptions, QueryOptions, Record, RecordSet, Selector,
    SetAction, SetOptions, Sex,
};
use std::process;

/// recdb CLI: query and edit rec files from the command line
#[derive(Parser)]
#[command(name = "recdb", version, about)]
struct Cli {
    /// Rec file to operate on (glob patterns allowed, repeatable).
    /// Defaults to $RECDB_FILE
    #[arg(long = "file", short = 'F', global = true)]
    files: Vec<String>,

    /// Output format
    #[arg(long, default_value = "rec", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Rec,
    Json,
    Yaml,
}

/// Ways of choosing records, shared by every subcommand.
#[derive(Args)]
struct Selection {
    /// Record type
    #[arg(short = 't', long = "type")]
    type_name: Option<String>,

    /// Selection expression (e.g. "Location = 'home'")
    #[arg(short = 'e', long = "expression", conflicts_with_all = ["index", "quick"])]
    expression: Option<String>,

    /// Record positions, 0-based (e.g. 0,2-4)
    #[arg(short = 'n', long = "index", conflicts_with = "quick")]
    index: Option<String>,

    /// Select records with a field containing this text
    #[arg(short = 'q', long = "quick", conflicts_with = "random")]
    quick: Option<String>,

    /// Select this many records at random
    #[arg(short = 'm', long = "random", conflicts_with_all = ["expression", "index"])]
    random: Option<usize>,

    /// Seed for --random
    #[arg(long, requires = "random")]
    seed: Option<u64>,

    /// Case-insensitive matching
    #[arg(short = 'i', long = "case-insensitive")]
    case_insensitive: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print the records that match
    Sel {
        #[command(flatten)]
        selection: Selection,
        /// Fields to print (e.g. Title,Author[1])
        #[arg(short = 'p', long = "print")]
        print: Option<String>,
        /// Group by these comma-separated fields
        #[arg(short = 'G', long = "group-by")]
        group_by: Option<String>,
        /// Sort by these comma-separated fields
        #[arg(short = 'S', long = "sort")]
        sort: Option<String>,
        /// Print at most this many records
        #[arg(long)]
        limit: Option<usize>,
        /// Join on this foreign key field
        #[arg(short = 'j', long = "join")]
        join: Option<String>,
        /// Print only the number of matching records
        #[arg(short = 'c', long = "count")]
        count: bool,
        /// Also print the record descriptor
        #[arg(short = 'd', long = "descriptor")]
        descriptor: bool,
    },

    /// Insert a record, or replace the selected ones
    Ins {
        #[command(flatten)]
        selection: Selection,
        /// Field of the new record (e.g. --field Title="Dune")
        #[arg(short = 'f', long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
        /// Do not generate %auto fields
        #[arg(long)]
        no_auto: bool,
        /// Insert even if the record violates the descriptor
        #[arg(long)]
        force: bool,
    },

    /// Delete the selected records
    Del {
        #[command(flatten)]
        selection: Selection,
        /// Comment the records out instead of removing them
        #[arg(long)]
        comment: bool,
        /// Remove the record set once it is empty
        #[arg(long)]
        remove_empty: bool,
    },

    /// Change fields of the selected records
    #[command(group(ArgGroup::new("action").required(true).args(["set", "add", "set_add", "rename", "delete", "comment"])))]
    Set {
        #[command(flatten)]
        selection: Selection,
        /// Fields to act on (e.g. Author or Author[2])
        #[arg(short = 'f', long = "fields")]
        fields: String,
        #[arg(long)]
        set: Option<String>,
        #[arg(long)]
        add: Option<String>,
        #[arg(long)]
        set_add: Option<String>,
        #[arg(long)]
        rename: Option<String>,
        #[arg(long)]
        delete: bool,
        #[arg(long)]
        comment: bool,
    },

    /// Check the database against its descriptors
    Fix,

    /// Show record types and counts
    Info,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid Name=value pair: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn run(cli: Cli) -> CliResult<()> {
    let files = resolve_files(&cli.files)?;
    let mut db = load(&files)?;

    match cli.command {
        Command::Sel {
            selection,
            print,
            group_by,
            sort,
            limit,
            join,
            count,
            descriptor,
        } => {
            let sex = compile(&selection)?;
            let opts = QueryOptions {
                type_name: selection.type_name.clone(),
                join,
                selector: selector(&selection, sex.as_ref())?,
                group_by: split_names(group_by.as_deref()),
                fex: print
                    .map(|p| Fex::new(&p, FexKind::Subscripts))
                    .transpose()?,
                sort_by: split_names(sort.as_deref()),
                limit,
                ..Default::default()
            };
            let result = recdb::query(&db, &opts)?;
            if count {
                println!("{}", result.num_records());
            } else {
                print_records(&result, descriptor, &cli.format)?;
            }
        }

        Command::Ins {
            selection,
            fields,
            no_auto,
            force,
        } => {
            let record = fields
                .iter()
                .map(|(name, value)| Field::new(name.as_str(), value.as_str()))
                .collect::<recdb::Result<Record>>()?;

            if !force {
                validate_new_record(&db, selection.type_name.as_deref(), &record)?;
            }

            let sex = compile(&selection)?;
            let opts = InsertOptions {
                type_name: selection.type_name.clone(),
                selector: selector(&selection, sex.as_ref())?,
                no_auto,
                ..Default::default()
            };
            let n = recdb::insert(&mut db, &opts, record)?;
            save(&db, &files)?;
            print_summary("inserted", n, &cli.format)?;
        }

        Command::Del {
            selection,
            comment,
            remove_empty,
        } => {
            let sex = compile(&selection)?;
            let opts = DeleteOptions {
                type_name: selection.type_name.clone(),
                selector: selector(&selection, sex.as_ref())?,
                comment_out: comment,
                remove_empty_set: remove_empty,
                ..Default::default()
            };
            let n = recdb::delete(&mut db, &opts)?;
            save(&db, &files)?;
            print_summary("deleted", n, &cli.format)?;
        }

        Command::Set {
            selection,
            fields,
            set,
            add,
            set_add,
            rename,
            delete,
            comment,
        } => {
            let action = if let Some(v) = set {
                SetAction::Set(v)
            } else if let Some(v) = add {
                SetAction::Add(v)
            } else if let Some(v) = set_add {
                SetAction::SetAdd(v)
            } else if let Some(v) = rename {
                SetAction::Rename(v)
            } else if delete {
                SetAction::Delete
            } else if comment {
                SetAction::Comment
            } else {
                SetAction::None
            };

            let sex = compile(&selection)?;
            let opts = SetOptions {
                type_name: selection.type_name.clone(),
                selector: selector(&selection, sex.as_ref())?,
                fex: Fex::new(&fields, FexKind::Subscripts)?,
                action,
                ..Default::default()
            };
            let n = recdb::set(&mut db, &opts)?;
            save(&db, &files)?;
            print_summary("changed", n, &cli.format)?;
        }

        Command::Fix => {
            let mut errors = Vec::new();
            let n = integrity_check(&db, true, true, &mut errors);
            match cli.format {
                OutputFormat::Rec => {
                    for error in &errors {
                        println!("{error}");
                    }
                }
                _ => print_output(&serde_json::to_value(&errors)?, &cli.format)?,
            }
            if n > 0 {
                return Err(format!("{n} integrity error(s)").into());
            }
        }

        Command::Info => {
            let sets: Vec<serde_json::Value> = db
                .iter()
                .map(|rset| {
                    serde_json::json!({
                        "type": rset.type_name(),
                        "records": rset.num_records(),
                    })
                })
                .collect();
            match cli.format {
                OutputFormat::Rec => {
                    for rset in db.iter() {
                        println!(
                            "{}: {}",
                            rset.type_name().unwrap_or("<default>"),
                            rset.num_records()
                        );
                    }
                }
                _ => print_output(&serde_json::Value::Array(sets), &cli.format)?,
            }
        }
    }

    Ok(())
}

/// Expand the file arguments (or $RECDB_FILE) into paths, in order.
fn resolve_files(args: &[String]) -> CliResult<Vec<String>> {
    let patterns: Vec<String> = if args.is_empty() {
        match std::env::var("RECDB_FILE") {
            Ok(file) => vec![file],
            Err(_) => return Err("no rec file given (use --file or set RECDB_FILE)".into()),
        }
    } else {
        args.to_vec()
    };

    let mut files = Vec::new();
    for pattern in &patterns {
        let mut matched: Vec<String> = glob::glob(pattern)?
            .filter_map(|entry| entry.ok())
            .map(|path| path.display().to_string())
            .collect();
        if matched.is_empty() {
            // Not a pattern, or nothing matched: let loading report it
            files.push(pattern.clone());
        } else {
            matched.sort();
            files.append(&mut matched);
        }
    }
    Ok(files)
}

fn load(files: &[String]) -> CliResult<Database> {
    let Some((first, rest)) = files.split_first() else {
        return Err("no rec file given".into());
    };
    let mut db = Database::load(first)?;
    for file in rest {
        let report = db.append(file)?;
        log::debug!(
            "Appended {} record set(s) from {}, skipped {}",
            report.added,
            file,
            report.skipped.len()
        );
    }
    Ok(db)
}

fn save(db: &Database, files: &[String]) -> CliResult<()> {
    match files {
        [file] => Ok(db.write(file)?),
        _ => Err("commands that modify the database need exactly one file".into()),
    }
}

fn compile(selection: &Selection) -> CliResult<Option<Sex>> {
    Ok(selection
        .expression
        .as_deref()
        .map(|e| Sex::compile_with(e, selection.case_insensitive))
        .transpose()?)
}

fn selector<'a>(selection: &Selection, sex: Option<&'a Sex>) -> CliResult<Selector<'a>> {
    if let Some(sex) = sex {
        return Ok(Selector::Sex(sex));
    }
    if let Some(index) = &selection.index {
        let ranges = parse_index_list(index).ok_or_else(|| format!("invalid index list '{index}'"))?;
        return Ok(Selector::Index(ranges));
    }
    if let Some(count) = selection.random {
        return Ok(Selector::Random {
            count,
            seed: selection.seed,
        });
    }
    if let Some(pattern) = &selection.quick {
        return Ok(Selector::FastString {
            pattern: pattern.clone(),
            case_insensitive: selection.case_insensitive,
        });
    }
    Ok(Selector::All)
}

fn split_names(s: Option<&str>) -> Vec<String> {
    s.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

fn validate_new_record(db: &Database, type_name: Option<&str>, record: &Record) -> CliResult<()> {
    let Some(type_name) = type_name else {
        return Ok(());
    };
    let Some(desc) = db.get_record_set_by_type(type_name)?.descriptor() else {
        return Ok(());
    };
    // %auto fields are filled in on insert
    let mut desc = desc;
    let auto = desc.auto.clone();
    desc.mandatory.retain(|m| !auto.contains(m));
    if desc.key.as_ref().is_some_and(|k| auto.contains(k)) {
        desc.key = None;
    }

    let mut errors = Vec::new();
    if check_record(&desc, record, None, true, &mut errors) > 0 {
        for error in &errors {
            eprintln!("{error}");
        }
        return Err("record violates the descriptor (use --force to insert anyway)".into());
    }
    Ok(())
}

fn print_records(rset: &RecordSet, with_descriptor: bool, format: &OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Rec => {
            let mut shown = rset.clone();
            if !with_descriptor {
                shown.set_descriptor(None);
            }
            let text = recdb::format::write_record_set(&shown);
            if !text.is_empty() {
                println!("{text}");
            }
            Ok(())
        }
        _ => print_output(&rset.to_json(), format),
    }
}

fn print_summary(action: &str, n: usize, format: &OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Rec => {
            println!("{n} record(s) {action}");
            Ok(())
        }
        _ => print_output(&serde_json::json!({ "ok": true, action: n }), format),
    }
}

fn print_output(value: &serde_json::Value, format: &OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
        OutputFormat::Rec => println!("{value}"),
    }
    Ok(())
}
