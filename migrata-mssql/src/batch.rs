//! `GO` batch separators.

/// Split script text on lines holding only `GO` (any case).
///
/// `GO` is a client-side separator, the server never sees it. Blank
/// batches are dropped.
pub fn split_go_batches(sql: &str) -> Vec<String> {
    let mut batches = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        if is_separator(line) {
            push_batch(&mut batches, &mut current);
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    push_batch(&mut batches, &mut current);

    batches
}

fn is_separator(line: &str) -> bool {
    let line = line.trim();
    let line = line.strip_suffix(';').unwrap_or(line).trim_end();
    line.eq_ignore_ascii_case("go")
}

fn push_batch(batches: &mut Vec<String>, current: &mut String) {
    let batch = std::mem::take(current);
    if !batch.trim().is_empty() {
        batches.push(batch.trim_end().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_on_go() {
        let sql = "CREATE TABLE a (id INT);\nGO\ncreate view v as select id from a\n  go  \n";
        assert_eq!(
            split_go_batches(sql),
            vec![
                "CREATE TABLE a (id INT);".to_string(),
                "create view v as select id from a".to_string(),
            ]
        );
    }

    #[test]
    fn test_go_inside_identifiers_is_kept() {
        let sql = "SELECT 1 AS go_live\r\nGOTO done\r\nGO;\r\n";
        assert_eq!(split_go_batches(sql), vec!["SELECT 1 AS go_live\nGOTO done"]);
    }

    #[test]
    fn test_blank_batches_dropped() {
        assert!(split_go_batches("GO\n\nGO\n").is_empty());
        assert!(split_go_batches("").is_empty());
    }
}
