//! The multi-signal lexical search used by [`crate::ToolStore::search`].
//!
//! Tokenization follows the same shape used for transcript search
//! elsewhere in this codebase: lowercase, split on non-alphanumeric
//! boundaries, drop single-character tokens. Scoring combines eight
//! independent signals as a weighted sum plus a popularity boost, all
//! configurable via [`forge_domain::config::SearchConfig`].

use std::collections::HashSet;

use forge_domain::config::SearchConfig;
use forge_domain::Tool;

/// Lowercases, strips punctuation and collapses runs of non-alphanumeric
/// characters into token boundaries; tokens shorter than 2 characters are
/// dropped as noise.
pub fn tokenize(s: &str) -> Vec<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|tok| tok.len() >= 2)
        .map(|tok| tok.to_string())
        .collect()
}

fn normalize(s: &str) -> String {
    s.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Longest common subsequence length, used by [`fuzzy_name_score`].
fn lcs_len(a: &[u8], b: &[u8]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb { prev[j] + 1 } else { prev[j + 1].max(cur[j]) };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

fn fuzzy_name_score(query: &str, name: &str) -> f64 {
    let longest = query.len().max(name.len());
    if longest == 0 {
        return 0.0;
    }
    lcs_len(query.as_bytes(), name.as_bytes()) as f64 / longest as f64
}

fn expand_synonyms(tokens: &HashSet<String>, synonyms: &std::collections::HashMap<String, Vec<String>>) -> HashSet<String> {
    let mut expanded = tokens.clone();
    for tok in tokens {
        if let Some(alts) = synonyms.get(tok) {
            expanded.extend(alts.iter().cloned());
        }
    }
    expanded
}

/// A search hit: the tool's id, name (for display without a second lookup)
/// and its combined score.
#[derive(Debug, Clone)]
pub struct Hit {
    pub id: uuid::Uuid,
    pub name: String,
    pub score: f64,
}

/// Scores a single tool against a raw (not yet tokenized) query, using the
/// weights and synonym table in `cfg`.
pub fn score_tool(query: &str, tool: &Tool, cfg: &SearchConfig) -> f64 {
    let w = &cfg.weights;
    let norm_query = normalize(query);
    let norm_name = normalize(&tool.name);

    let exact_name = if norm_query == norm_name { 1.0 } else { 0.0 };

    let name_substring = if !norm_query.is_empty()
        && (norm_name.contains(&norm_query) || norm_query.contains(&norm_name))
    {
        1.0
    } else {
        0.0
    };

    let query_tokens: HashSet<String> = tokenize(query).into_iter().collect();
    let mut corpus = String::new();
    corpus.push_str(&tool.name);
    corpus.push(' ');
    corpus.push_str(&tool.description);
    corpus.push(' ');
    for t in &tool.tags {
        corpus.push(' ');
        corpus.push_str(t);
    }
    let corpus_tokens: HashSet<String> = tokenize(&corpus).into_iter().collect();
    let token_jaccard = jaccard(&query_tokens, &corpus_tokens);

    let fuzzy_name = fuzzy_name_score(&norm_query, &norm_name);

    let desc_lower = tool.description.to_lowercase();
    let description_hit = if query_tokens.iter().any(|t| desc_lower.contains(t.as_str())) { 1.0 } else { 0.0 };

    let tag_hit = if query_tokens.is_empty() || tool.tags.is_empty() {
        0.0
    } else {
        let tags_lower: HashSet<String> = tool.tags.iter().map(|t| t.to_lowercase()).collect();
        let hits = query_tokens.iter().filter(|t| tags_lower.contains(t.as_str())).count();
        hits as f64 / query_tokens.len() as f64
    };

    let category_hit = match &tool.category {
        Some(cat) => {
            let cat_lower = cat.to_lowercase();
            if query_tokens.iter().any(|t| *t == cat_lower) { 1.0 } else { 0.0 }
        }
        None => 0.0,
    };

    let expanded = expand_synonyms(&query_tokens, &cfg.synonyms);
    let synonym_expansion = if expanded.len() > query_tokens.len() { jaccard(&expanded, &corpus_tokens) } else { 0.0 };

    let signal_total = w.exact_name * exact_name
        + w.name_substring * name_substring
        + w.token_jaccard * token_jaccard
        + w.fuzzy_name * fuzzy_name
        + w.description_hit * description_hit
        + w.tag_hit * tag_hit
        + w.category_hit * category_hit
        + w.synonym_expansion * synonym_expansion;

    let popularity = (1.0 + tool.execution_count as f64).ln() / 101f64.ln();
    let popularity_boost = w.popularity_boost * popularity.min(1.0);

    signal_total + popularity_boost
}

/// Ranks `candidates` against `query`, dropping anything below
/// `cfg.threshold`, sorting by score descending with ties broken by
/// higher `execution_count` then newer `updated_at`, truncated to `limit`.
pub fn rank<'a>(query: &str, candidates: impl Iterator<Item = &'a Tool>, cfg: &SearchConfig, limit: usize) -> Vec<Hit> {
    let mut scored: Vec<(&Tool, f64)> = candidates
        .map(|t| (t, score_tool(query, t, cfg)))
        .filter(|(_, score)| *score >= cfg.threshold)
        .collect();

    scored.sort_by(|(ta, sa), (tb, sb)| {
        sb.partial_cmp(sa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| tb.execution_count.cmp(&ta.execution_count))
            .then_with(|| tb.updated_at.cmp(&ta.updated_at))
    });

    scored
        .into_iter()
        .take(limit)
        .map(|(t, score)| Hit { id: t.id, name: t.name.clone(), score })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_domain::tool::ToolSpec;
    use std::collections::BTreeSet;

    fn tool(name: &str, description: &str, tags: &[&str], category: Option<&str>) -> Tool {
        let mut t = Tool::new(ToolSpec {
            name: name.into(),
            description: description.into(),
            category: category.map(|s| s.to_string()),
            tags: tags.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            parameters: vec![],
            code: "fn run() {}".into(),
        });
        t.id = uuid::Uuid::new_v4();
        t
    }

    #[test]
    fn tokenize_drops_single_chars_and_punctuation() {
        assert_eq!(tokenize("add, two! numbers."), vec!["add", "two", "numbers"]);
        assert_eq!(tokenize("a b cd"), vec!["cd"]);
    }

    #[test]
    fn exact_name_scores_highest() {
        let cfg = SearchConfig::default();
        let exact = tool("add", "adds two numbers", &[], Some("math"));
        let unrelated = tool("subtract", "subtracts two numbers", &[], Some("math"));
        let s1 = score_tool("add", &exact, &cfg);
        let s2 = score_tool("add", &unrelated, &cfg);
        assert!(s1 > s2, "{s1} should exceed {s2}");
    }

    #[test]
    fn rank_excludes_scores_below_threshold() {
        let mut cfg = SearchConfig::default();
        cfg.threshold = 0.9;
        let t = tool("weather_lookup", "looks up the weather", &[], None);
        let hits = rank("completely unrelated phrase", std::iter::once(&t), &cfg, 10);
        assert!(hits.is_empty());
    }

    #[test]
    fn rank_is_monotone_in_popularity() {
        let cfg = SearchConfig::default();
        let mut popular = tool("add", "adds two numbers", &[], Some("math"));
        let mut rare = tool("add", "adds two numbers", &[], Some("math"));
        popular.execution_count = 50;
        rare.execution_count = 0;
        let score_popular = score_tool("add", &popular, &cfg);
        let score_rare = score_tool("add", &rare, &cfg);
        assert!(score_popular >= score_rare);
    }

    #[test]
    fn rank_sorts_descending_by_score() {
        let cfg = SearchConfig::default();
        let best = tool("add", "adds two numbers", &[], Some("math"));
        let worse = tool("string_concat", "joins two strings", &[], Some("text"));
        let hits = rank("add", vec![&worse, &best].into_iter(), &cfg, 10);
        assert_eq!(hits[0].name, "add");
    }

    #[test]
    fn tag_hit_rewards_matching_tags() {
        let cfg = SearchConfig::default();
        let tagged = tool("calc", "generic calculator", &["arithmetic"], None);
        let untagged = tool("calc2", "generic calculator", &[], None);
        let s1 = score_tool("arithmetic", &tagged, &cfg);
        let s2 = score_tool("arithmetic", &untagged, &cfg);
        assert!(s1 > s2);
    }
}
