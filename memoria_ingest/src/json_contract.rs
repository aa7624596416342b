//! Tolerant-then-strict JSON parsing for LLM sub-step responses (§4.D.2).

use serde::de::DeserializeOwned;

/// Parses `raw` as `T`, falling back to scanning for a fenced ` ```json `
/// block or the first balanced `{...}`/`[...]` span if the direct parse
/// fails. Returns `None` if both attempts fail — the caller treats that as
/// a step failure, never a panic.
pub fn parse_llm_json<T: DeserializeOwned>(raw: &str) -> Option<T> {
    if let Ok(value) = serde_json::from_str::<T>(raw) {
        return Some(value);
    }
    if let Some(block) = extract_fenced_block(raw) {
        if let Ok(value) = serde_json::from_str::<T>(&block) {
            return Some(value);
        }
    }
    if let Some(span) = extract_balanced_span(raw) {
        if let Ok(value) = serde_json::from_str::<T>(&span) {
            return Some(value);
        }
    }
    None
}

fn extract_fenced_block(raw: &str) -> Option<String> {
    let start = raw.find("```json").map(|i| i + "```json".len())?;
    let rest = &raw[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim().to_string())
}

/// Scans for the first top-level `{...}` or `[...]` span, tracking bracket
/// depth so a nested object inside the target doesn't end the scan early.
fn extract_balanced_span(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let start = bytes.iter().position(|&b| b == b'{' || b == b'[')?;
    let opening = bytes[start];
    let closing = if opening == b'{' { b'}' } else { b']' };

    let mut depth = 0_i32;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        if b == opening {
            depth += 1;
        } else if b == closing {
            depth -= 1;
            if depth == 0 {
                return Some(raw[start..=start + offset].to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, PartialEq, Debug)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn parses_direct_json() {
        let parsed: Option<Point> = parse_llm_json(r#"{"x": 1, "y": 2}"#);
        assert_eq!(parsed, Some(Point { x: 1, y: 2 }));
    }

    #[test]
    fn parses_fenced_block() {
        let raw = "Here is the result:\n```json\n{\"x\": 3, \"y\": 4}\n```\nThanks.";
        let parsed: Option<Point> = parse_llm_json(raw);
        assert_eq!(parsed, Some(Point { x: 3, y: 4 }));
    }

    #[test]
    fn parses_balanced_span_amid_prose() {
        let raw = "Sure, the point is {\"x\": 5, \"y\": 6} as requested.";
        let parsed: Option<Point> = parse_llm_json(raw);
        assert_eq!(parsed, Some(Point { x: 5, y: 6 }));
    }

    #[test]
    fn returns_none_on_garbage() {
        let parsed: Option<Point> = parse_llm_json("not json at all");
        assert_eq!(parsed, None);
    }
}
