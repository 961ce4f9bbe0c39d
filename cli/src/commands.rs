use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, bail};
use clap::ArgMatches;
use jsonlite_core::{
    Config, Document, Duplicates, Filter, JsonLiteDb, JsonLiteError, OrderSpec, PathInput,
    PathSegment, Stats,
};
use serde_json::Value;

use crate::{Cli, Command, FileMode, FilterArgs, InsertSources, OutputFormat, StdinFormat};

/// How a command opens its database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    /// Created when missing.
    Create,
    /// Must exist, opened read-write.
    WriteExisting,
    ReadOnly,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Insert(_) => "insert",
            Command::Import(_) => "import",
            Command::Add(_) => "add",
            Command::Query(_) => "query",
            Command::Count { .. } => "count",
            Command::Delete { .. } => "delete",
            Command::Patch { .. } => "patch",
            Command::Dump { .. } => "dump",
            Command::Indexes { .. } => "indexes",
            Command::Stats { .. } => "stats",
            Command::CreateIndex { .. } => "create-index",
            Command::DropIndex { .. } => "drop-index",
        }
    }

    fn access(&self) -> Access {
        match self {
            Command::Insert(_) | Command::Import(_) | Command::Add(_) | Command::CreateIndex { .. } => {
                Access::Create
            }
            Command::Delete { .. } | Command::Patch { .. } | Command::DropIndex { .. } => {
                Access::WriteExisting
            }
            Command::Query(_)
            | Command::Count { .. }
            | Command::Dump { .. }
            | Command::Indexes { .. }
            | Command::Stats { .. } => Access::ReadOnly,
        }
    }

    fn dbpath(&self) -> &Path {
        match self {
            Command::Insert(args) | Command::Import(args) => &args.sources.dbpath,
            Command::Add(args) => &args.sources.dbpath,
            Command::Query(args) => &args.dbpath,
            Command::Count { dbpath, .. }
            | Command::Delete { dbpath, .. }
            | Command::Patch { dbpath, .. }
            | Command::Dump { dbpath, .. }
            | Command::Indexes { dbpath }
            | Command::Stats { dbpath }
            | Command::CreateIndex { dbpath, .. }
            | Command::DropIndex { dbpath, .. } => dbpath,
        }
    }
}

/// One insert input, in processing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    File(String),
    Json(String),
}

pub fn run(cli: Cli, matches: &ArgMatches) -> anyhow::Result<()> {
    let name = cli.command.name();
    let db = open_db(cli.command.dbpath(), &cli.table, cli.command.access(), name)?;
    tracing::debug!("Running {} on {}", name, db);
    let sub_matches = matches.subcommand().map(|(_, m)| m);

    match cli.command {
        Command::Insert(args) | Command::Import(args) => {
            let mut inputs = sub_matches
                .map(|m| flagged_inputs(&args.sources, m))
                .unwrap_or_default();
            inputs.extend(args.inputs.into_iter().map(|input| {
                if input == "-" {
                    InputSource::Stdin
                } else {
                    InputSource::File(input)
                }
            }));
            insert_inputs(&db, &args.sources, inputs, name)?;
        }
        Command::Add(args) => {
            let mut inputs = sub_matches
                .map(|m| flagged_inputs(&args.sources, m))
                .unwrap_or_default();
            inputs.extend(args.items.into_iter().map(InputSource::Json));
            insert_inputs(&db, &args.sources, inputs, name)?;
        }
        Command::Query(args) => {
            let (mut filter, _) = build_filter(&args.filter)?;
            if let Some(limit) = args.limit {
                filter = filter.limit(limit);
            }
            for item in &args.orderby {
                filter = filter.order_by(parse_order_spec(item)?);
            }
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            if args.format == OutputFormat::Count {
                writeln!(out, "{}", db.count(&filter)?)?;
            } else {
                let mut result = db.query(&filter)?;
                write_results(&mut out, result.iter()?, args.format)?;
            }
            out.flush()?;
        }
        Command::Count { filter, .. } => {
            let (filter, _) = build_filter(&filter)?;
            println!("{}", db.count(&filter)?);
        }
        Command::Delete {
            filter,
            allow_empty,
            ..
        } => {
            let (filter, terms) = build_filter(&filter)?;
            if terms == 0 && !allow_empty {
                bail!(
                    "refusing to delete all rows without filters.\n\
                     Add one or more filters (e.g. name=Paul) or use --allow-empty."
                );
            }
            let removed = db.remove(&filter)?;
            tracing::debug!("Deleted {} rows", removed);
        }
        Command::Patch { patch, filter, .. } => {
            let patch: Value = serde_json::from_str(&patch)?;
            if !patch.is_object() {
                bail!("--patch must decode to a JSON object");
            }
            let (filter, _) = build_filter(&filter)?;
            db.patch(&patch, &filter)
                .map_err(|e| integrity_error(e, name))?;
        }
        Command::Dump { output, mode, .. } => {
            if output == "-" {
                let stdout = io::stdout();
                db.dump_jsonl(BufWriter::new(stdout.lock()))?;
            } else {
                let file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .append(mode == FileMode::Append)
                    .truncate(mode == FileMode::Write)
                    .open(&output)?;
                db.dump_jsonl(BufWriter::new(file))?;
            }
        }
        Command::Indexes { .. } => {
            print!("{}", format_indexes(&db.indexes()?, ""));
        }
        Command::Stats { .. } => {
            print!("{}", format_stats(&db.stats()?));
        }
        Command::CreateIndex { paths, unique, .. } => {
            let paths = paths
                .iter()
                .map(|item| parse_index_path(item))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let index_name = db
                .create_index(paths, unique)
                .map_err(|e| integrity_error(e, name))?;
            tracing::debug!("Index {} ready", index_name);
        }
        Command::DropIndex {
            paths,
            name: names,
            unique,
            ..
        } => {
            if names.is_empty() && paths.is_empty() {
                bail!("drop-index requires --name and/or one or more paths");
            }
            for index_name in &names {
                db.drop_index_by_name(index_name)?;
            }
            if !paths.is_empty() {
                let paths = paths
                    .iter()
                    .map(|item| parse_index_path(item))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                db.drop_index(paths, unique)?;
            }
        }
    }

    db.close()?;
    Ok(())
}

fn open_db(dbpath: &Path, table: &str, access: Access, command: &str) -> anyhow::Result<JsonLiteDb> {
    let config = Config::default().with_table(table);
    let missing = |e: JsonLiteError| -> anyhow::Error {
        if is_missing_database(&e) {
            anyhow!(
                "database does not exist for '{}': {}\n\
                 Create it first with 'insert' or 'create-index'.",
                command,
                dbpath.display()
            )
        } else {
            e.into()
        }
    };

    match access {
        Access::Create => Ok(JsonLiteDb::open(dbpath, config)?),
        Access::ReadOnly => JsonLiteDb::read_only(dbpath, config).map_err(missing),
        Access::WriteExisting => {
            let existing = JsonLiteDb::read_only(dbpath, config.clone()).map_err(missing)?;
            existing.close()?;
            Ok(JsonLiteDb::open(dbpath, config)?)
        }
    }
}

fn is_missing_database(err: &JsonLiteError) -> bool {
    err.engine_message()
        .is_some_and(|msg| msg.to_lowercase().contains("unable to open database file"))
}

/// `--stdin`, `--file` and `--json` sources in the order they appeared on
/// the command line.
pub fn flagged_inputs(sources: &InsertSources, matches: &ArgMatches) -> Vec<InputSource> {
    let mut flagged: Vec<(usize, InputSource)> = Vec::new();
    if sources.stdin {
        flagged.push((matches.index_of("stdin").unwrap_or(0), InputSource::Stdin));
    }
    if let Some(indices) = matches.indices_of("file") {
        flagged.extend(
            indices
                .zip(&sources.file)
                .map(|(index, path)| (index, InputSource::File(path.clone()))),
        );
    }
    if let Some(indices) = matches.indices_of("json") {
        flagged.extend(
            indices
                .zip(&sources.json)
                .map(|(index, item)| (index, InputSource::Json(item.clone()))),
        );
    }
    flagged.sort_by_key(|(index, _)| *index);
    flagged.into_iter().map(|(_, source)| source).collect()
}

fn insert_inputs(
    db: &JsonLiteDb,
    sources: &InsertSources,
    mut inputs: Vec<InputSource>,
    command: &str,
) -> anyhow::Result<()> {
    let duplicates = sources.duplicates.map(Duplicates::from).unwrap_or_default();
    if inputs.is_empty() {
        inputs.push(InputSource::Stdin);
    }

    let mut read_stdin = false;
    let mut written = 0;
    for input in inputs {
        let res = match input {
            InputSource::Json(text) => {
                let value: Value = serde_json::from_str(&text)?;
                db.insert_value(value, duplicates)
            }
            InputSource::Stdin => {
                // stdin can only be consumed once
                if read_stdin {
                    continue;
                }
                read_stdin = true;
                let stdin = io::stdin();
                match sources.stdin_format {
                    StdinFormat::Json => {
                        let value: Value = serde_json::from_reader(stdin.lock())?;
                        db.insert_value(value, duplicates)
                    }
                    StdinFormat::Jsonlines => db.import_lines(stdin.lock(), duplicates),
                }
            }
            InputSource::File(path) => db.import_jsonl(&path, duplicates),
        };
        written += res.map_err(|e| integrity_error(e, command))?;
    }
    tracing::debug!("Inserted {} documents", written);
    Ok(())
}

/// Parse a filter value as JSON, falling back to the raw text.
pub fn parse_filter_value(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Build the equality filter of `key=value` pairs and `--json` objects.
/// Returns the filter and the number of equality terms given.
pub fn build_filter(args: &FilterArgs) -> anyhow::Result<(Filter, usize)> {
    let mut filter = Filter::new();
    let mut terms = 0;

    for item in &args.filters {
        let (key, value) = item
            .split_once('=')
            .ok_or_else(|| anyhow!("invalid filter {:?}; use key=value", item))?;
        filter = filter.eq(key.trim(), parse_filter_value(value.trim()));
        terms += 1;
    }

    for text in &args.json {
        let Value::Object(map) = serde_json::from_str::<Value>(text)? else {
            bail!("--json filters must decode to JSON objects");
        };
        filter = filter.eq_map(&map);
        terms += map.len();
    }

    Ok((filter, terms))
}

fn comma_segments(item: &str) -> Vec<PathSegment> {
    item.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(PathSegment::from)
        .collect()
}

/// `--orderby` value: a key or path, or comma-separated nested keys.
pub fn parse_order_spec(item: &str) -> anyhow::Result<OrderSpec> {
    let mut segments = comma_segments(item);
    match segments.len() {
        0 => bail!("invalid --orderby {:?}", item),
        1 => match segments.remove(0) {
            PathSegment::Key(key) => Ok(OrderSpec::from(key)),
            index => Ok(OrderSpec::from(vec![index])),
        },
        _ => Ok(OrderSpec::from(segments)),
    }
}

/// Index path argument: a key, a `$` path, or comma-separated nested keys.
pub fn parse_index_path(item: &str) -> anyhow::Result<PathInput> {
    if !item.contains(',') {
        return Ok(PathInput::from(item));
    }
    let segments = comma_segments(item);
    if segments.is_empty() {
        bail!("invalid index path: empty comma-separated item");
    }
    Ok(PathInput::from(segments))
}

pub fn write_results<W: Write>(
    out: &mut W,
    docs: impl IntoIterator<Item = jsonlite_core::JsonLiteResult<Document>>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        writeln!(out, "[")?;
    }
    let mut first = true;
    for doc in docs {
        let line = serde_json::to_string(&doc?)?;
        match format {
            OutputFormat::Json => {
                if !first {
                    writeln!(out, ",")?;
                }
                write!(out, "{}", line)?;
            }
            _ => writeln!(out, "{}", line)?,
        }
        first = false;
    }
    if format == OutputFormat::Json {
        write!(out, "\n]\n")?;
    }
    Ok(())
}

pub fn format_indexes(indexes: &std::collections::BTreeMap<String, Vec<String>>, indent: &str) -> String {
    let mut out = String::new();
    for (name, paths) in indexes {
        let suffix = if name.ends_with("_UNIQUE") { " [UNIQUE]" } else { "" };
        out.push_str(&format!("{}{}{}: {}\n", indent, name, suffix, paths.join(", ")));
    }
    if out.is_empty() && indent.is_empty() {
        out.push_str("No indexes\n");
    }
    out
}

pub fn format_stats(stats: &Stats) -> String {
    let mut out = format!(
        "Database: {}\nTable: {}\nRows: {}\nPage Size: {}\nPage Count: {}\n\
         Freelist Count: {}\nBytes: {}\n",
        stats.dbpath,
        stats.table,
        stats.rows,
        stats.page_size,
        stats.page_count,
        stats.freelist_count,
        stats.bytes
    );
    if stats.indexes.is_empty() {
        out.push_str("Indexes: none\n");
    } else {
        out.push_str("Indexes:\n");
        out.push_str(&format_indexes(&stats.indexes, "  - "));
    }
    out
}

/// Turn a constraint failure into text for the terminal. Other errors pass
/// through.
pub fn integrity_error(err: JsonLiteError, command: &str) -> anyhow::Error {
    if !err.is_constraint_violation() {
        return err.into();
    }
    let message = err.engine_message().unwrap_or_else(|| err.to_string());
    if !message.contains("UNIQUE constraint failed") {
        return anyhow!("integrity error: {}", message);
    }

    let mut lines = vec!["UNIQUE constraint violation.".to_string()];
    if let Some(index) = violated_index(&message) {
        lines.push(format!("Index: {}", index));
    }
    if matches!(command, "insert" | "import" | "add") {
        lines.push("Hint: use --duplicates ignore or --duplicates replace.".to_string());
    }
    lines.push(format!("SQLite: {}", message));
    anyhow!(lines.join("\n"))
}

fn violated_index(message: &str) -> Option<&str> {
    let start = message.find("index '")? + "index '".len();
    let rest = &message[start..];
    rest.find('\'').map(|end| &rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, FromArgMatches};
    use jsonlite_core::Direction;
    use jsonlite_core::query::compile_order;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse(args: &[&str]) -> (Cli, ArgMatches) {
        let matches = Cli::command().try_get_matches_from(args).unwrap();
        let cli = Cli::from_arg_matches(&matches).unwrap();
        (cli, matches)
    }

    fn run_args(args: &[&str]) -> anyhow::Result<()> {
        let (cli, matches) = parse(args);
        run(cli, &matches)
    }

    #[test]
    fn test_parse_filter_value() {
        assert_eq!(parse_filter_value("7"), json!(7));
        assert_eq!(parse_filter_value("true"), json!(true));
        assert_eq!(parse_filter_value("null"), Value::Null);
        assert_eq!(parse_filter_value("[\"a\",\"b\"]"), json!(["a", "b"]));
        assert_eq!(parse_filter_value("George"), json!("George"));
        assert_eq!(parse_filter_value("\"7\""), json!("7"));
    }

    #[test]
    fn test_build_filter() {
        let args = FilterArgs {
            filters: vec!["name = George".to_string(), "$.meta.rank=7".to_string()],
            json: vec!["{\"active\": true}".to_string()],
        };
        let (filter, terms) = build_filter(&args).unwrap();
        assert_eq!(terms, 3);

        let compiled = filter.compile().unwrap();
        assert_eq!(
            compiled.sql,
            "( ( ( JSON_EXTRACT(data, '$.\"name\"') = ? ) \
             AND ( JSON_EXTRACT(data, '$.meta.rank') = ? ) ) \
             AND ( JSON_EXTRACT(data, '$.\"active\"') = ? ) )"
        );
        assert_eq!(compiled.bindings.len(), 3);
    }

    #[test]
    fn test_build_filter_rejects() {
        let bad = FilterArgs {
            filters: vec!["no-equals".to_string()],
            json: vec![],
        };
        assert!(build_filter(&bad).is_err());

        let not_object = FilterArgs {
            filters: vec![],
            json: vec!["[1, 2]".to_string()],
        };
        assert!(build_filter(&not_object).is_err());

        let (_, terms) = build_filter(&FilterArgs::default()).unwrap();
        assert_eq!(terms, 0);
    }

    #[test]
    fn test_parse_order_spec() {
        let specs = vec![
            parse_order_spec("last").unwrap(),
            parse_order_spec("-born").unwrap(),
            parse_order_spec("-meta, rank").unwrap(),
        ];
        let terms = compile_order(&specs).unwrap();
        assert_eq!(terms.len(), 3);
        assert_eq!(terms[0].path, "$.\"last\"");
        assert_eq!(terms[0].direction, Direction::Asc);
        assert_eq!(terms[1].path, "$.\"born\"");
        assert_eq!(terms[1].direction, Direction::Desc);
        assert_eq!(terms[2].path, "$.\"meta\".\"rank\"");
        assert_eq!(terms[2].direction, Direction::Desc);

        assert!(parse_order_spec(" , ").is_err());
    }

    #[test]
    fn test_parse_index_path() {
        assert_eq!(parse_index_path("first").unwrap(), PathInput::from("first"));
        assert_eq!(
            parse_index_path("meta,rank").unwrap(),
            PathInput::from(vec![PathSegment::from("meta"), PathSegment::from("rank")])
        );
        assert!(parse_index_path(",").is_err());
    }

    #[test]
    fn test_flagged_inputs_keep_order() {
        let (cli, matches) = parse(&[
            "jsonlitedb", "add", "my.db", "--json", "{\"a\":1}", "--file", "x.jsonl", "--stdin",
            "--json", "{\"a\":2}", "{\"a\":3}",
        ]);
        let (_, sub) = matches.subcommand().unwrap();
        let Command::Add(args) = cli.command else {
            panic!("expected add");
        };
        assert_eq!(args.items, vec!["{\"a\":3}".to_string()]);
        assert_eq!(
            flagged_inputs(&args.sources, sub),
            vec![
                InputSource::Json("{\"a\":1}".to_string()),
                InputSource::File("x.jsonl".to_string()),
                InputSource::Stdin,
                InputSource::Json("{\"a\":2}".to_string()),
            ]
        );
    }

    #[test]
    fn test_write_results() {
        let docs = || {
            vec![
                Ok(Document::new(1, json!({"a": 1}))),
                Ok(Document::new(2, json!({"b": "é"}))),
            ]
        };
        let mut out = Vec::new();
        write_results(&mut out, docs(), OutputFormat::Jsonl).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\"a\":1}\n{\"b\":\"é\"}\n");

        let mut out = Vec::new();
        write_results(&mut out, docs(), OutputFormat::Json).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "[\n{\"a\":1},\n{\"b\":\"é\"}\n]\n");
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, json!([{"a": 1}, {"b": "é"}]));
    }

    #[test]
    fn test_format_indexes() {
        let mut indexes = std::collections::BTreeMap::new();
        assert_eq!(format_indexes(&indexes, ""), "No indexes\n");

        indexes.insert(
            "ix_items_250e4243_UNIQUE".to_string(),
            vec!["$.\"first\"".to_string(), "$.\"last\"".to_string()],
        );
        assert_eq!(
            format_indexes(&indexes, ""),
            "ix_items_250e4243_UNIQUE [UNIQUE]: $.\"first\", $.\"last\"\n"
        );
    }

    #[test]
    fn test_violated_index() {
        let message = "UNIQUE constraint failed: index 'ix_items_250e4243_UNIQUE'";
        assert_eq!(violated_index(message), Some("ix_items_250e4243_UNIQUE"));
        assert_eq!(violated_index("UNIQUE constraint failed: items.data"), None);
    }

    #[test]
    fn test_insert_and_maintain() {
        let dir = tempfile::tempdir().unwrap();
        let dbpath = dir.path().join("cli.db");
        let db_arg = dbpath.to_str().unwrap();

        run_args(&["jsonlitedb", "create-index", db_arg, "first,name", "--unique", "--table", "people"])
            .unwrap();
        run_args(&[
            "jsonlitedb", "add", db_arg, "--table", "people", "{\"first\":{\"name\":\"John\"}}",
            "[{\"first\":{\"name\":\"Paul\"}},{\"first\":{\"name\":\"Ringo\"}}]",
        ])
        .unwrap();

        let err = run_args(&[
            "jsonlitedb", "add", db_arg, "--table", "people", "{\"first\":{\"name\":\"John\"}}",
        ])
        .unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("UNIQUE constraint violation."), "{}", text);
        assert!(text.contains("--duplicates"), "{}", text);

        run_args(&[
            "jsonlitedb", "add", db_arg, "--table", "people", "--duplicates", "ignore",
            "{\"first\":{\"name\":\"John\"}}",
        ])
        .unwrap();

        let db = JsonLiteDb::read_only(&dbpath, Config::default().with_table("people")).unwrap();
        assert_eq!(db.len().unwrap(), 3);
        assert_eq!(db.indexes().unwrap().len(), 1);
        db.close().unwrap();

        assert!(run_args(&["jsonlitedb", "delete", db_arg, "--table", "people"]).is_err());
        run_args(&[
            "jsonlitedb", "delete", db_arg, "--table", "people", "--json", "{\"$.first.name\": \"Paul\"}",
        ])
        .unwrap();
        run_args(&[
            "jsonlitedb", "patch", db_arg, "--table", "people", "--patch", "{\"band\":\"Beatles\"}",
        ])
        .unwrap();
        run_args(&["jsonlitedb", "drop-index", db_arg, "--table", "people", "first,name", "--unique"])
            .unwrap();

        let db = JsonLiteDb::read_only(&dbpath, Config::default().with_table("people")).unwrap();
        assert_eq!(db.len().unwrap(), 2);
        assert_eq!(db.count(&Filter::new().eq("band", "Beatles")).unwrap(), 2);
        assert!(db.indexes().unwrap().is_empty());
    }

    #[test]
    fn test_dump_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let dbpath = dir.path().join("dump.db");
        let out = dir.path().join("out.jsonl");
        let db_arg = dbpath.to_str().unwrap();
        let out_arg = out.to_str().unwrap();

        run_args(&["jsonlitedb", "add", db_arg, "--table", "items", "{\"a\":1}", "{\"a\":2}"]).unwrap();
        run_args(&["jsonlitedb", "dump", db_arg, "--table", "items", "--output", out_arg]).unwrap();
        run_args(&[
            "jsonlitedb", "dump", db_arg, "--table", "items", "--output", out_arg, "--file-mode", "a",
        ])
        .unwrap();
        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            "{\"a\":1}\n{\"a\":2}\n{\"a\":1}\n{\"a\":2}\n"
        );

        let imported = dir.path().join("copy.db");
        run_args(&[
            "jsonlitedb", "import", imported.to_str().unwrap(), "--table", "items", out_arg,
        ])
        .unwrap();
        let db = JsonLiteDb::read_only(&imported, Config::default()).unwrap();
        assert_eq!(db.len().unwrap(), 4);
    }

    #[test]
    fn test_missing_database() {
        let dir = tempfile::tempdir().unwrap();
        let dbpath = dir.path().join("nope.db");
        let db_arg = dbpath.to_str().unwrap();

        for command in ["query", "count", "indexes", "stats", "dump"] {
            let err = run_args(&["jsonlitedb", command, db_arg, "--table", "items"]).unwrap_err();
            assert!(err.to_string().starts_with("database does not exist"), "{}", err);
        }
        let err = run_args(&["jsonlitedb", "delete", db_arg, "--table", "items", "--allow-empty"])
            .unwrap_err();
        assert!(err.to_string().starts_with("database does not exist"), "{}", err);
        assert!(!dbpath.exists());
    }

    #[test]
    fn test_format_stats() {
        let db = JsonLiteDb::memory(Config::default()).unwrap();
        db.insert(&json!({"first": "John"}), Duplicates::Reject).unwrap();
        db.create_index(["first"], false).unwrap();
        let text = format_stats(&db.stats().unwrap());
        assert!(text.starts_with("Database: :memory:\nTable: items\nRows: 1\n"), "{}", text);
        assert!(text.contains("Indexes:\n  - ix_items_367c1463: $.\"first\"\n"), "{}", text);
    }
}
