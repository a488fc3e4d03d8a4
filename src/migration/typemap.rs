// ABOUTME: SQLite declared type to PostgreSQL column type mapping
// ABOUTME: Follows SQLite affinity rules with refinements for common declared types

/// Map a SQLite declared column type to a PostgreSQL type
///
/// SQLite stores values by affinity rather than declared type, so the mapping
/// follows the affinity rules (INT first, then text, blob, real) and only
/// refines the NUMERIC affinity into BOOLEAN, DATE, TIMESTAMP and NUMERIC(p,s).
pub fn postgres_type(declared_type: &str) -> String {
    let upper = declared_type.trim().to_uppercase();

    if upper.is_empty() {
        return "TEXT".to_string();
    }
    if upper.contains("INT") {
        return "BIGINT".to_string();
    }
    if upper == "BOOL" || upper == "BOOLEAN" {
        return "BOOLEAN".to_string();
    }
    if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
        return "TEXT".to_string();
    }
    if upper.contains("BLOB") {
        return "BYTEA".to_string();
    }
    if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
        return "DOUBLE PRECISION".to_string();
    }

    let base = upper.split('(').next().unwrap_or("").trim();
    match base {
        "DATETIME" | "TIMESTAMP" => "TIMESTAMP".to_string(),
        "DATE" => "DATE".to_string(),
        "DECIMAL" | "NUMERIC" => match precision_scale(&upper) {
            Some((p, Some(s))) => format!("NUMERIC({},{})", p, s),
            Some((p, None)) => format!("NUMERIC({})", p),
            None => "NUMERIC".to_string(),
        },
        _ => "NUMERIC".to_string(),
    }
}

/// Parse "(p)" or "(p,s)" from a declared type
fn precision_scale(declared: &str) -> Option<(u32, Option<u32>)> {
    let open = declared.find('(')?;
    let close = declared[open..].find(')')? + open;
    let mut parts = declared[open + 1..close].split(',');

    let precision: u32 = parts.next()?.trim().parse().ok()?;
    // PostgreSQL caps NUMERIC precision at 1000
    if precision == 0 || precision > 1000 {
        return None;
    }
    let scale = match parts.next() {
        Some(s) => Some(s.trim().parse::<u32>().ok()?),
        None => None,
    };
    if let Some(s) = scale {
        if s > precision {
            return None;
        }
    }

    Some((precision, scale))
}
