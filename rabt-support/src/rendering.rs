//! Text rendering for diagnostics.
//!
//! Error messages in Rabt name contracts by their Rust type. Full type paths
//! (`alloc::sync::Arc<dyn my_app::Logger>`) are noisy, so these helpers
//! shorten them and lay resolution chains out on one line.

/// Separator used between links of a resolution chain.
pub const CHAIN_ARROW: &str = " → ";

/// Renders a resolution chain as a single line.
///
/// # Examples
/// ```
/// use rabt_support::rendering::render_chain;
///
/// let chain = ["OrderService", "PaymentGateway", "OrderService"];
/// assert_eq!(render_chain(&chain), "OrderService → PaymentGateway → OrderService");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    let mut out = String::new();
    for (i, link) in chain.iter().enumerate() {
        if i > 0 {
            out.push_str(CHAIN_ARROW);
        }
        out.push_str(link.as_ref());
    }
    out
}

/// Strips module paths from every path segment of a type name.
///
/// Generic arguments and trait objects keep their structure, only the
/// `a::b::` prefixes are removed.
///
/// ```
/// use rabt_support::rendering::shorten_type_name;
///
/// assert_eq!(shorten_type_name("billing::invoice::InvoiceStore"), "InvoiceStore");
/// assert_eq!(
///     shorten_type_name("alloc::sync::Arc<dyn billing::Clock + Send>"),
///     "Arc<dyn Clock + Send>"
/// );
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut out = String::with_capacity(full_name.len());
    let mut segment_start = 0;

    for (idx, ch) in full_name.char_indices() {
        if matches!(ch, '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&') {
            out.push_str(last_path_segment(&full_name[segment_start..idx]));
            out.push(ch);
            segment_start = idx + ch.len_utf8();
        }
    }
    out.push_str(last_path_segment(&full_name[segment_start..]));
    out
}

fn last_path_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Picks registered names that look like the requested one.
///
/// Scoring favours full-name containment, then short-name containment,
/// then a shared prefix of at least three characters. Results are ordered
/// best first and capped at `max_suggestions`.
pub fn suggest_similar(requested: &str, available: &[&str], max_suggestions: usize) -> Vec<String> {
    let wanted_full = requested.to_lowercase();
    let wanted_short = shorten_type_name(requested).to_lowercase();

    let mut scored: Vec<(usize, &str)> = available
        .iter()
        .filter(|name| !name.eq_ignore_ascii_case(requested))
        .filter_map(|&name| {
            let full = name.to_lowercase();
            let short = shorten_type_name(name).to_lowercase();

            let score = if full.contains(&wanted_full) || wanted_full.contains(&full) {
                100
            } else if short.contains(&wanted_short) || wanted_short.contains(&short) {
                80
            } else {
                let shared = short
                    .chars()
                    .zip(wanted_short.chars())
                    .take_while(|(a, b)| a == b)
                    .count();
                if shared < 3 {
                    return None;
                }
                shared * 10
            };
            Some((score, name))
        })
        .collect();

    // stable sort keeps registration order among equal scores
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(_, name)| name.to_string())
        .collect()
}
