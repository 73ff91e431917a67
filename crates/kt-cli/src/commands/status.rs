//! Status command for showing where data lives and the latest recorded minute.

use std::io::Write;

use anyhow::Result;
use chrono::SecondsFormat;

use kt_db::bucket_instant;
use kt_engine::Engine;

use crate::Config;

pub fn run<W: Write>(writer: &mut W, engine: &Engine, config: &Config) -> Result<()> {
    let status = engine.status()?;

    writeln!(writer, "Keystroke statistics status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    writeln!(writer, "User: {}", status.user_id)?;

    let Some(latest) = status.latest else {
        writeln!(writer, "No keystrokes recorded.")?;
        return Ok(());
    };

    let minute = bucket_instant(latest.bucket_start)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| latest.bucket_start.to_string());
    writeln!(writer, "Lifetime keystrokes: {}", status.lifetime_total)?;
    writeln!(
        writer,
        "Latest minute: {minute} ({} keys)",
        latest.counters.total_keys
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{DateTime, Utc};
    use kt_core::{BucketAccumulator, KeyEvent, bucket_start_for};
    use kt_db::Database;
    use kt_engine::EngineConfig;

    use insta::assert_snapshot;

    fn config(db_path: std::path::PathBuf) -> Config {
        Config {
            database_path: db_path,
            ..Config::default()
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn status_command_outputs_latest_bucket() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("keytally.db");
        let mut db = Database::open(&db_path).unwrap();

        let ts = at("2025-01-01T00:00:00Z");
        let mut acc = BucketAccumulator::new(bucket_start_for(ts, &Utc));
        for _ in 0..3 {
            acc.record(ts, "A");
        }
        db.persist_bucket(&acc.into_flushed()).unwrap();
        drop(db);

        let config = config(db_path.clone());
        let engine = Engine::start_in(
            Database::open(&db_path).unwrap(),
            EngineConfig::default(),
            Utc,
            "UTC",
        )
        .unwrap();
        // Still pending in the worker when status is requested.
        engine.append(KeyEvent::new(at("2025-01-01T00:02:30Z"), "a"));
        engine.append(KeyEvent::new(at("2025-01-01T00:02:31Z"), "b"));

        let mut output = Vec::new();
        run(&mut output, &engine, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        let output = output.replace(&db_path.display().to_string(), "[TEMP]/keytally.db");
        assert_snapshot!(output);
    }

    #[test]
    fn status_command_handles_empty_database() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("keytally.db");
        let engine = Engine::open(&db_path, "local", EngineConfig::default()).unwrap();

        let mut output = Vec::new();
        run(&mut output, &engine, &config(db_path.clone())).unwrap();

        let output = String::from_utf8(output).unwrap();
        let output = output.replace(&db_path.display().to_string(), "[TEMP]/keytally.db");
        assert_eq!(
            output,
            "Keystroke statistics status\nDatabase: [TEMP]/keytally.db\nUser: local\nNo keystrokes recorded.\n"
        );
    }
}
