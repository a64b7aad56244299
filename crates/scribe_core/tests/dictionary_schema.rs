use rusqlite::Connection;
use scribe_core::dictionary::schema_version;
use scribe_core::{DictionaryError, PersonalDictionary, SqliteDictionary, SCHEMA_VERSION};

#[test]
fn fresh_database_gets_current_schema() {
    let dictionary = SqliteDictionary::open_in_memory().unwrap();
    let conn = dictionary.connection();

    assert_eq!(schema_version(conn).unwrap(), SCHEMA_VERSION);
    assert_eq!(
        table_columns(conn, "dictionary_words"),
        vec!["word", "display", "created_at"]
    );
}

#[test]
fn reopening_keeps_schema_and_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dictionary.db");

    let mut first = SqliteDictionary::open(&path).unwrap();
    first.add_word("Scribe").unwrap();
    drop(first);

    let second = SqliteDictionary::open(&path).unwrap();
    assert_eq!(schema_version(second.connection()).unwrap(), SCHEMA_VERSION);
    assert_eq!(second.all_words().unwrap(), vec!["Scribe".to_string()]);
}

#[test]
fn shared_connection_is_bootstrapped_in_place() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE host_settings (key TEXT PRIMARY KEY);")
        .unwrap();

    let mut dictionary = SqliteDictionary::from_connection(conn).unwrap();
    assert!(dictionary.add_word("kubectl").unwrap());
    assert_eq!(
        table_columns(dictionary.connection(), "host_settings"),
        vec!["key"]
    );
}

#[test]
fn database_from_newer_build_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match SqliteDictionary::open(&path) {
        Err(DictionaryError::SchemaTooNew { found, supported }) => {
            assert_eq!(found, 999);
            assert_eq!(supported, SCHEMA_VERSION);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("newer schema was accepted"),
    }
}

fn table_columns(conn: &Connection, table_name: &str) -> Vec<String> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table_name});"))
        .unwrap();
    stmt.query_map([], |row| row.get::<_, String>(1))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}
