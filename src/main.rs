mod config;


use std::ffi::OsString;
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, error, info, instrument};
use valuemultimap::{AsciiCaseInsensitive, DefaultEquality, KeyEquality, ValueMultimap};

use crate::config::{CONFIG, Config, GroupingConfig, OutputFormat};


/// Table names compare exactly or, like unquoted SQL identifiers, ignoring case.
#[derive(Clone, Debug)]
enum TableEquality {
    Exact(DefaultEquality),
    IgnoreCase(AsciiCaseInsensitive),
}
impl TableEquality {
    fn from_config(grouping: &GroupingConfig) -> Self {
        if grouping.case_insensitive {
            Self::IgnoreCase(AsciiCaseInsensitive::new())
        } else {
            Self::Exact(DefaultEquality::new())
        }
    }
}
impl KeyEquality<String> for TableEquality {
    fn hash_key(&self, key: &String) -> u64 {
        match self {
            Self::Exact(e) => e.hash_key(key),
            Self::IgnoreCase(e) => e.hash_key(key),
        }
    }

    fn keys_equal(&self, left: &String, right: &String) -> bool {
        match self {
            Self::Exact(e) => e.keys_equal(left, right),
            Self::IgnoreCase(e) => e.keys_equal(left, right),
        }
    }
}

type TableMap = ValueMultimap<String, String, Vec<String>, TableEquality>;


#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
struct TableDocument {
    pub table: String,
    pub columns: Vec<String>,
    pub foreign_keys: Vec<String>,
}


fn group_by_table<I>(rows: I, equality: TableEquality, capacity: usize) -> valuemultimap::Result<TableMap>
        where I: IntoIterator<Item = (String, String)> {
    let mut map = TableMap::with_capacity_and_equality(capacity, equality);
    for (table, member) in rows {
        map.add(table, member)?;
    }
    Ok(map)
}

fn build_documents(columns: &TableMap, foreign_keys: &TableMap, table_filter: Option<&Regex>) -> Vec<TableDocument> {
    let foreign_key_lookup = foreign_keys.lookup();
    let mut documents = Vec::with_capacity(columns.len());
    for grouping in columns.lookup() {
        let table = grouping.key();
        if let Some(filter) = table_filter {
            if !filter.is_match(table) {
                debug!("skipping table {:?}", table);
                continue;
            }
        }
        documents.push(TableDocument {
            table: table.clone(),
            columns: grouping.iter().cloned().collect(),
            foreign_keys: foreign_key_lookup.get(table).cloned().collect(),
        });
    }
    documents.sort_by(|a, b| a.table.cmp(&b.table));
    documents
}

fn serialize_documents(documents: &[TableDocument], format: OutputFormat) -> Option<Vec<u8>> {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(documents) {
            Ok(text) => Some(text.into_bytes()),
            Err(e) => {
                error!("failed to serialize tables to JSON: {}", e);
                None
            },
        },
        OutputFormat::Cbor => {
            let mut buf = Vec::new();
            match ciborium::ser::into_writer(documents, &mut buf) {
                Ok(()) => Some(buf),
                Err(e) => {
                    error!("failed to serialize tables to CBOR: {}", e);
                    None
                },
            }
        },
    }
}


async fn db_connect() -> Option<tokio_postgres::Client> {
    let db_config = &CONFIG
        .get().expect("CONFIG not set?!")
        .db;
    let connect_res = tokio_postgres::Config::new()
        .host(&db_config.hostname)
        .user(&db_config.username)
        .password(&db_config.password)
        .dbname(&db_config.db_name)
        .port(db_config.port)
        .connect(tokio_postgres::NoTls).await;
    let (client, connection) = match connect_res {
        Ok(cc) => cc,
        Err(e) => {
            error!("failed to connect to database: {}", e);
            return None;
        },
    };
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("Postgres connection error: {}", e);
        }
    });
    Some(client)
}

#[instrument(skip_all)]
async fn obtain_columns(db_conn: &tokio_postgres::Client, schemas: &[String]) -> Option<Vec<(String, String)>> {
    let column_rows_res = db_conn.query(
        "
            SELECT
                table_schema::text || '.' || table_name::text,
                column_name::text
            FROM
                information_schema.columns
            WHERE
                table_schema = ANY($1)
            ORDER BY
                table_schema, table_name, ordinal_position
        ",
        &[&schemas],
    ).await;
    let column_rows = match column_rows_res {
        Ok(cr) => cr,
        Err(e) => {
            error!("failed to obtain columns: {}", e);
            return None;
        },
    };
    let mut columns = Vec::with_capacity(column_rows.len());
    for row in column_rows {
        let table: String = row.get(0);
        let column: String = row.get(1);
        columns.push((table, column));
    }
    Some(columns)
}

#[instrument(skip_all)]
async fn obtain_foreign_keys(db_conn: &tokio_postgres::Client, schemas: &[String]) -> Option<Vec<(String, String)>> {
    let fk_rows_res = db_conn.query(
        "
            SELECT
                tc.table_schema::text || '.' || tc.table_name::text,
                kcu.column_name::text,
                ccu.table_schema::text || '.' || ccu.table_name::text,
                ccu.column_name::text
            FROM
                information_schema.table_constraints tc
                INNER JOIN information_schema.key_column_usage kcu
                    ON kcu.constraint_schema = tc.constraint_schema
                    AND kcu.constraint_name = tc.constraint_name
                INNER JOIN information_schema.constraint_column_usage ccu
                    ON ccu.constraint_schema = tc.constraint_schema
                    AND ccu.constraint_name = tc.constraint_name
            WHERE
                tc.constraint_type = 'FOREIGN KEY'
                AND tc.table_schema = ANY($1)
            ORDER BY
                1, 2
        ",
        &[&schemas],
    ).await;
    let fk_rows = match fk_rows_res {
        Ok(fr) => fr,
        Err(e) => {
            error!("failed to obtain foreign keys: {}", e);
            return None;
        },
    };
    let mut foreign_keys = Vec::with_capacity(fk_rows.len());
    for row in fk_rows {
        let table: String = row.get(0);
        let column: String = row.get(1);
        let target_table: String = row.get(2);
        let target_column: String = row.get(3);
        foreign_keys.push((table, format!("{} -> {}.{}", column, target_table, target_column)));
    }
    Some(foreign_keys)
}


#[tokio::main]
async fn main() -> ExitCode {
    // enable tracing
    tracing_subscriber::fmt::init();

    // find config path
    let args: Vec<OsString> = std::env::args_os().collect();
    let config_path = if args.len() == 1 {
        PathBuf::from("config.toml")
    } else if args.len() == 2 {
        PathBuf::from(&args[1])
    } else {
        eprintln!("Usage: {:?} [CONFIG.TOML]", args[0]);
        return ExitCode::FAILURE;
    };

    // load config
    let config: Config = {
        let mut f = match File::open(&config_path) {
            Ok(f) => f,
            Err(e) => {
                error!("failed to open config file {:?}: {}", config_path, e);
                return ExitCode::FAILURE;
            },
        };
        let mut config_string = String::new();
        if let Err(e) = f.read_to_string(&mut config_string) {
            error!("failed to read config file {:?}: {}", config_path, e);
            return ExitCode::FAILURE;
        }
        match toml::from_str(&config_string) {
            Ok(c) => c,
            Err(e) => {
                error!("failed to parse config file {:?} as TOML: {}", config_path, e);
                return ExitCode::FAILURE;
            },
        }
    };
    CONFIG.set(config)
        .expect("CONFIG already set?!");
    let grouping = &CONFIG.get()
        .expect("CONFIG not set?!")
        .grouping;

    let table_filter = match grouping.table_filter.as_deref().map(Regex::new).transpose() {
        Ok(tf) => tf,
        Err(e) => {
            error!("invalid table filter: {}", e);
            return ExitCode::FAILURE;
        },
    };

    let db_conn = match db_connect().await {
        Some(dbc) => dbc,
        None => return ExitCode::FAILURE,
    };
    let schemas: Vec<String> = grouping.schemas.iter().cloned().collect();
    let column_rows = match obtain_columns(&db_conn, &schemas).await {
        Some(cr) => cr,
        None => return ExitCode::FAILURE,
    };
    let fk_rows = match obtain_foreign_keys(&db_conn, &schemas).await {
        Some(fr) => fr,
        None => return ExitCode::FAILURE,
    };

    // group members by table
    let equality = TableEquality::from_config(grouping);
    let grouped = group_by_table(column_rows, equality.clone(), grouping.capacity_hint)
        .and_then(|columns| {
            let foreign_keys = group_by_table(fk_rows, equality, grouping.capacity_hint)?;
            Ok((columns, foreign_keys))
        });
    let (columns, foreign_keys) = match grouped {
        Ok(cf) => cf,
        Err(e) => {
            error!("failed to group schema members: {}", e);
            return ExitCode::FAILURE;
        },
    };
    info!("found {} tables, {} with foreign keys", columns.len(), foreign_keys.len());

    let documents = build_documents(&columns, &foreign_keys, table_filter.as_ref());
    let data = match serialize_documents(&documents, grouping.format) {
        Some(d) => d,
        None => return ExitCode::FAILURE,
    };
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = stdout.write_all(&data).and_then(|()| stdout.flush()) {
        error!("failed to write output: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
