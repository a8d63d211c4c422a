//! Identifier safety for the history table name
//!
//! The table name is interpolated into SQL text, so it is validated up front
//! and double-quote escaped whenever it is written into a statement.

/// Characters allowed in SQL identifiers (alphanumeric, underscore, dollar)
const ALLOWED_IDENTIFIER_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_$";

/// Keywords rejected as table names
static SQL_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "FROM", "WHERE", "JOIN", "UNION", "DROP", "CREATE",
    "ALTER", "GRANT", "REVOKE", "TRUNCATE", "TABLE", "USER", "CURRENT_USER", "SESSION_USER",
];

/// Escape a SQL identifier for PostgreSQL
///
/// ```
/// use stepwise_migrator::security::escape_identifier;
///
/// assert_eq!(escape_identifier("migrations_history"), "\"migrations_history\"");
/// assert_eq!(escape_identifier("odd\"name"), "\"odd\"\"name\"");
/// ```
pub fn escape_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Validate that an identifier is safe to use as a table name
pub fn validate_identifier(identifier: &str) -> Result<(), String> {
    let Some(first) = identifier.chars().next() else {
        return Err("identifier cannot be empty".to_string());
    };

    // PostgreSQL NAMEDATALEN - 1
    if identifier.len() > 63 {
        return Err(format!(
            "identifier '{}' is too long (max 63 characters)",
            identifier
        ));
    }

    if let Some(c) = identifier.chars().find(|c| !ALLOWED_IDENTIFIER_CHARS.contains(*c)) {
        return Err(format!(
            "identifier '{}' contains invalid character '{}'",
            identifier, c
        ));
    }

    if first.is_ascii_digit() {
        return Err(format!("identifier '{}' cannot start with a number", identifier));
    }

    if SQL_KEYWORDS.contains(&identifier.to_uppercase().as_str()) {
        return Err(format!("identifier '{}' is a reserved SQL keyword", identifier));
    }

    Ok(())
}
