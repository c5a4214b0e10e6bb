// src/format/text.rs
use once_cell::sync::OnceCell;
use regex::Regex;

/// Drop tracking query strings from bilibili links; other URLs are kept as is.
pub fn purge_link(url: &str) -> String {
    if !is_bili_url(url) {
        return url.to_string();
    }
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].to_string()
}

/// `purge_link` applied to every URL inside free text.
pub fn purge_links_in_text(text: &str) -> String {
    static RE_URL: OnceCell<Regex> = OnceCell::new();
    let re = RE_URL.get_or_init(|| Regex::new(r"https?://[^\s\]\[]+").unwrap());
    re.replace_all(text, |caps: &regex::Captures| purge_link(&caps[0]))
        .into_owned()
}

fn is_bili_url(url: &str) -> bool {
    static RE_BILI: OnceCell<Regex> = OnceCell::new();
    let re = RE_BILI.get_or_init(|| {
        Regex::new(r"(?i)^https?://([\w-]+\.)*(bilibili\.com|b23\.tv|acg\.tv)(/|$|\?)").unwrap()
    });
    re.is_match(url)
}

/// Compact count: 12345 → "1.2万", 123456789 → "1.2亿".
pub fn human_num(n: u64) -> String {
    if n >= 100_000_000 {
        format!("{:.1}亿", n as f64 / 100_000_000.0)
    } else if n >= 10_000 {
        format!("{:.1}万", n as f64 / 10_000.0)
    } else {
        n.to_string()
    }
}
