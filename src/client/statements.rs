//! SQL statement builders for the test dataset.
//!
//! All object names and literals that originate from configuration or
//! generated credentials pass through [`quote_ident`] / [`quote_literal`]
//! before being embedded in a statement, so a hostile value in a configmap
//! cannot break out of its position.

/// Query returning the server version string.
pub const SERVER_VERSION: &str = "SELECT version()";

/// Quote an SQL identifier (database, schema, table, or role name).
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote an SQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Create the throwaway test role with a password.
pub fn create_role(user: &str, password: &str) -> String {
    format!(
        "CREATE USER {} WITH PASSWORD {}",
        quote_ident(user),
        quote_literal(password)
    )
}

/// Grant the test role the privileges it needs to own a database.
pub fn elevate_role(user: &str) -> String {
    format!("ALTER ROLE {} WITH SUPERUSER CREATEDB", quote_ident(user))
}

/// Switch the session's active role.
pub fn set_role(user: &str) -> String {
    format!("SET ROLE {}", quote_ident(user))
}

/// Create the test database.
pub fn create_database(dbname: &str) -> String {
    format!("CREATE DATABASE {}", quote_ident(dbname))
}

/// Grant the test role full access to the test database.
pub fn grant_database(dbname: &str, user: &str) -> String {
    format!(
        "GRANT ALL PRIVILEGES ON DATABASE {} TO {}",
        quote_ident(dbname),
        quote_ident(user)
    )
}

/// Create the test schema.
pub fn create_schema(schema: &str) -> String {
    format!("CREATE SCHEMA {}", quote_ident(schema))
}

/// Create the test table seeded with `rows` generated rows.
pub fn create_seeded_table(schema: &str, table: &str, rows: i64) -> String {
    format!(
        "CREATE TABLE {}.{} AS SELECT s, md5(random()::text) FROM generate_series(1,{}) s",
        quote_ident(schema),
        quote_ident(table),
        rows
    )
}

/// Count the rows in the test table.
pub fn count_rows(schema: &str, table: &str) -> String {
    format!(
        "SELECT COUNT(0) FROM {}.{}",
        quote_ident(schema),
        quote_ident(table)
    )
}

/// Drop the test table.
pub fn drop_table(schema: &str, table: &str) -> String {
    format!("DROP TABLE {}.{}", quote_ident(schema), quote_ident(table))
}

/// Drop the test schema.
pub fn drop_schema(schema: &str) -> String {
    format!("DROP SCHEMA {}", quote_ident(schema))
}

/// Drop the test database.
pub fn drop_database(dbname: &str) -> String {
    format!("DROP DATABASE {}", quote_ident(dbname))
}

/// Drop the test role.
pub fn drop_role(user: &str) -> String {
    format!("DROP ROLE {}", quote_ident(user))
}
