/// Discord rejects messages longer than this many characters.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// `1234567` -> `1,234,567`
pub fn add_delimiter(number: i64) -> String {
    let digits = number.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if number < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn format_count(value: Option<i64>) -> String {
    value.map(add_delimiter).unwrap_or_else(|| "N/A".to_string())
}

/// Whole values print like integers; anything else keeps two decimals.
pub fn format_amount(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => add_delimiter(v as i64),
        Some(v) => {
            let text = format!("{:.2}", v);
            let Some((whole, frac)) = text.split_once('.') else { return text };
            match whole.parse::<i64>() {
                Ok(0) if whole.starts_with('-') => format!("-0.{}", frac),
                Ok(n) => format!("{}.{}", add_delimiter(n), frac),
                Err(_) => text,
            }
        }
        None => "N/A".to_string(),
    }
}

/// Splits a reply on line boundaries so each piece fits in one Discord message.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        let needed = if current.is_empty() { line.chars().count() } else { current.chars().count() + 1 + line.chars().count() };
        if needed > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        if line.chars().count() > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_groups_thousands() {
        assert_eq!(add_delimiter(0), "0");
        assert_eq!(add_delimiter(999), "999");
        assert_eq!(add_delimiter(1000), "1,000");
        assert_eq!(add_delimiter(55_123_456), "55,123,456");
        assert_eq!(add_delimiter(-1_234), "-1,234");
    }

    #[test]
    fn amounts_and_missing_values() {
        assert_eq!(format_amount(Some(1_500_000.0)), "1,500,000");
        assert_eq!(format_amount(Some(1234.5)), "1,234.50");
        assert_eq!(format_amount(None), "N/A");
        assert_eq!(format_count(None), "N/A");
    }

    #[test]
    fn split_keeps_lines_together() {
        let text = "aaaa\nbbbb\ncccc";
        assert_eq!(split_message(text, 9), vec!["aaaa\nbbbb", "cccc"]);
        assert_eq!(split_message(text, 100), vec![text]);
    }

    #[test]
    fn split_breaks_overlong_lines() {
        let chunks = split_message(&"x".repeat(25), 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() <= 10));
    }
}
