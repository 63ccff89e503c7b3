//! CLI smoke entry point.
//!
//! Opens a database (file path argument, in-memory when omitted) and prints
//! the active row count of every entity.
//!
//! Set `TASKFORGE_LOG_DIR` to an absolute directory to enable file logging.

use log::{error, info};
use std::process::ExitCode;
use taskforge_core::model::ALL_ENTITIES;
use taskforge_core::{
    core_version, default_log_level, init_logging, open_db, open_db_in_memory,
    RecordRepository, SqliteRecordRepository,
};

fn main() -> ExitCode {
    if let Ok(log_dir) = std::env::var("TASKFORGE_LOG_DIR") {
        if let Err(err) = init_logging(default_log_level(), &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    let path = std::env::args().nth(1);
    let opened = match path.as_deref() {
        Some(path) => open_db(path),
        None => open_db_in_memory(),
    };
    let conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            error!("event=cli_open module=cli status=error");
            eprintln!("failed to open database: {err}");
            return ExitCode::FAILURE;
        }
    };

    println!("taskforge_core version={}", core_version());
    println!("database={}", path.as_deref().unwrap_or(":memory:"));
    for entity in ALL_ENTITIES {
        let count = SqliteRecordRepository::try_new(&conn, entity)
            .and_then(|repo| repo.count(&[]));
        match count {
            Ok(count) => println!("{}={count}", entity.table),
            Err(err) => {
                eprintln!("{}: {err}", entity.table);
                return ExitCode::FAILURE;
            }
        }
    }

    info!("event=cli_summary module=cli status=ok entities={}", ALL_ENTITIES.len());
    ExitCode::SUCCESS
}
