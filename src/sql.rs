use once_cell::sync::Lazy;
use regex::Regex;

static SELECT_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)(select\s.+)").expect("SELECT_CLAUSE pattern is valid")
});

const CODE_FENCE: &str = "\n```";

/// Pulls the SQL statement out of free-form model output.
///
/// Takes everything from the first `select` followed by whitespace through the
/// end of the text and cuts it at a closing code fence. Text without a match
/// is returned trimmed. This is a heuristic, not a parser: a "select" inside
/// prose is extracted as well.
pub fn extract_sql_from_response(response: &str) -> String {
    match SELECT_CLAUSE.captures(response).and_then(|c| c.get(1)) {
        Some(m) => {
            let sql = m.as_str();
            let sql = sql.split(CODE_FENCE).next().unwrap_or(sql);
            sql.trim().to_string()
        }
        None => response.trim().to_string(),
    }
}
