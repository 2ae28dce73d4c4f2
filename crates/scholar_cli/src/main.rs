//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `scholar_core` linkage.
//! - Optionally open a database and report row counts per entity kind.
//!
//! Usage: `scholar_cli [DB_PATH]`

use scholar_core::{
    open_db, EntityKind, EntityRepository, SchemaRegistry, SelectQuery, SqliteEntityRepository,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("scholar_core ping={}", scholar_core::ping());
    println!("scholar_core version={}", scholar_core::core_version());

    let schemas = match SchemaRegistry::builtin() {
        Ok(schemas) => schemas,
        Err(err) => {
            eprintln!("schemas status=error error={err}");
            return ExitCode::FAILURE;
        }
    };
    println!("schemas loaded={}", EntityKind::ALL.len());

    let Some(db_path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };
    match print_counts(&db_path, &schemas) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("db path={db_path} status=error error={err}");
            ExitCode::FAILURE
        }
    }
}

fn print_counts(db_path: &str, schemas: &SchemaRegistry) -> Result<(), Box<dyn std::error::Error>> {
    let conn = open_db(db_path)?;
    for kind in EntityKind::ALL {
        let repo = SqliteEntityRepository::try_new(&conn, schemas, kind)?;
        let table = repo.table();
        let count = repo.get_count(&SelectQuery::table(table.table, table.alias))?;
        println!("entity kind={kind} count={count}");
    }
    Ok(())
}
