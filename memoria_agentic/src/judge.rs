//! Judge-response parsing (§4.H.1): the donor's `sufficiency.rs` tag-based
//! contract, generalized from a boolean `needs_more` to the richer
//! `{is_sufficient, reasoning, refined_queries}` shape.

/// Parsed verdict from the round-1 sufficiency judge call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgeDecision {
    pub is_sufficient: bool,
    pub reasoning: String,
    pub refined_queries: Vec<String>,
}

impl JudgeDecision {
    /// §4.H.1 "an empty round-1 hit list short-circuits to
    /// `is_sufficient=false` with the original query as the sole refined
    /// query" — no LLM call needed.
    #[must_use]
    pub fn empty_round1(original_query: &str) -> Self {
        Self {
            is_sufficient: false,
            reasoning: "round 1 returned no hits".to_string(),
            refined_queries: vec![original_query.to_string()],
        }
    }

    /// Used when the judge LLM call itself fails (§4.H "terminate with
    /// round-1 results and set `metadata.judge_failed=true`").
    #[must_use]
    pub fn judge_failed() -> Self {
        Self {
            is_sufficient: true,
            reasoning: "judge call failed; treating round 1 as final".to_string(),
            refined_queries: Vec::new(),
        }
    }
}

/// Parses a judge LLM response. Tries the `<decision>`/`<refined_queries>`
/// tag contract first; falls back to a keyword scan checking
/// `"insufficient"`/`"not sufficient"` before bare `"sufficient"` (mirroring
/// the donor's `"no_retrieve"`-before-`"retrieve"` ordering to dodge a
/// substring false-positive). If the judge says insufficient but no
/// `<refined_queries>` block is present, `original_query` is used as the
/// sole refined query, same as the empty-round-1 short-circuit.
#[must_use]
pub fn parse_judge_response(raw: &str, original_query: &str, refined_query_cap: usize) -> JudgeDecision {
    let is_sufficient = parse_decision_tag(raw).unwrap_or_else(|| fallback_keyword_scan(raw));
    let mut refined_queries = parse_refined_queries(raw, refined_query_cap);
    if !is_sufficient && refined_queries.is_empty() {
        refined_queries.push(original_query.to_string());
    }

    JudgeDecision {
        is_sufficient,
        reasoning: raw.trim().to_string(),
        refined_queries,
    }
}

fn extract_tag<'a>(raw: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = raw.to_lowercase().find(&open.to_lowercase())? + open.len();
    let rest = &raw[start..];
    let end = rest.to_lowercase().find(&close.to_lowercase())?;
    Some(&rest[..end])
}

fn parse_decision_tag(raw: &str) -> Option<bool> {
    let tag = extract_tag(raw, "decision")?;
    let upper = tag.trim().to_uppercase();
    if upper.contains("INSUFFICIENT") {
        Some(false)
    } else if upper.contains("SUFFICIENT") {
        Some(true)
    } else {
        None
    }
}

/// Default is conservative: ambiguous text is treated as insufficient,
/// which at worst spends the second (and final, per §8 property 8) round.
fn fallback_keyword_scan(raw: &str) -> bool {
    let lower = raw.to_lowercase();
    if lower.contains("insufficient") || lower.contains("not sufficient") {
        false
    } else {
        lower.contains("sufficient")
    }
}

fn parse_refined_queries(raw: &str, cap: usize) -> Vec<String> {
    let Some(block) = extract_tag(raw, "refined_queries") else {
        return Vec::new();
    };
    block
        .lines()
        .map(str::trim)
        .map(|line| line.trim_start_matches(['-', '*', '•']).trim())
        .filter(|line| !line.is_empty())
        .take(cap)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sufficient_tag_short_circuits() {
        let raw = "<decision>SUFFICIENT</decision>\nreasoning here";
        let decision = parse_judge_response(raw, "q", 3);
        assert!(decision.is_sufficient);
        assert!(decision.refined_queries.is_empty());
    }

    #[test]
    fn insufficient_tag_parses_refined_queries_capped() {
        let raw = "<decision>INSUFFICIENT</decision>\n<refined_queries>\nwhere did alice go\nwhat did bob say\nwhen was the trip\nextra one\n</refined_queries>";
        let decision = parse_judge_response(raw, "q", 3);
        assert!(!decision.is_sufficient);
        assert_eq!(decision.refined_queries.len(), 3);
        assert_eq!(decision.refined_queries[0], "where did alice go");
    }

    #[test]
    fn insufficient_without_refined_queries_falls_back_to_original() {
        let raw = "<decision>INSUFFICIENT</decision>";
        let decision = parse_judge_response(raw, "original query", 3);
        assert_eq!(decision.refined_queries, vec!["original query".to_string()]);
    }

    #[test]
    fn keyword_fallback_prefers_insufficient_substring() {
        // "sufficient" is a substring of "insufficient" — must not match first.
        let raw = "the results are insufficient for a confident answer";
        let decision = parse_judge_response(raw, "q", 3);
        assert!(!decision.is_sufficient);
    }

    #[test]
    fn keyword_fallback_bare_sufficient() {
        let raw = "these results look sufficient to answer the question";
        let decision = parse_judge_response(raw, "q", 3);
        assert!(decision.is_sufficient);
    }

    #[test]
    fn empty_round1_short_circuit_has_no_llm_involvement() {
        let decision = JudgeDecision::empty_round1("what did alice say");
        assert!(!decision.is_sufficient);
        assert_eq!(decision.refined_queries, vec!["what did alice say".to_string()]);
    }
}
