//! Format selection strings such as `best[height<=720]/best`
//!
//! Alternatives are separated by `/` and tried left to right. A `+` merge
//! request (`bestvideo+bestaudio`) degrades to its first component since
//! formats are never muxed here.

use crate::extractor::models::Format;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Any,
    Video,
    Audio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq)]
struct Filter {
    key: String,
    op: Op,
    value: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Term {
    Best(Kind, Vec<Filter>),
    Worst(Kind, Vec<Filter>),
    Id(String),
}

/// Ascending ordering: preference, then tier quality, then bitrate and height
pub fn compare_formats(a: &Format, b: &Format) -> Ordering {
    a.preference
        .unwrap_or(0)
        .cmp(&b.preference.unwrap_or(0))
        .then(a.quality.unwrap_or(-1).cmp(&b.quality.unwrap_or(-1)))
        .then(a.tbr.unwrap_or(0.0).total_cmp(&b.tbr.unwrap_or(0.0)))
        .then(a.height.unwrap_or(0).cmp(&b.height.unwrap_or(0)))
}

/// Formats sorted best first
pub fn sort_formats(formats: &[Format]) -> Vec<&Format> {
    let mut sorted: Vec<&Format> = formats.iter().collect();
    sorted.sort_by(|a, b| compare_formats(b, a));
    sorted
}

/// Pick one format for `selector`; `None` when no alternative matches
pub fn select_format<'a>(formats: &'a [Format], selector: &str) -> Option<&'a Format> {
    selector
        .split('/')
        .map(str::trim)
        .filter(|alt| !alt.is_empty())
        .find_map(|alt| {
            let first = alt.split('+').next().unwrap_or(alt).trim();
            apply(formats, &parse_term(first))
        })
}

fn apply<'a>(formats: &'a [Format], term: &Term) -> Option<&'a Format> {
    match term {
        Term::Best(kind, filters) => candidates(formats, *kind, filters)
            .into_iter()
            .max_by(|a, b| compare_formats(a, b)),
        Term::Worst(kind, filters) => candidates(formats, *kind, filters)
            .into_iter()
            .min_by(|a, b| compare_formats(a, b)),
        Term::Id(id) => formats
            .iter()
            .filter(|f| f.format_id == *id)
            .max_by(|a, b| compare_formats(a, b)),
    }
}

fn candidates<'a>(formats: &'a [Format], kind: Kind, filters: &[Filter]) -> Vec<&'a Format> {
    formats
        .iter()
        .filter(|f| match kind {
            Kind::Any => true,
            Kind::Video => f.has_video(),
            Kind::Audio => f.is_audio_only(),
        })
        .filter(|f| filters.iter().all(|filter| matches_filter(f, filter)))
        .collect()
}

fn parse_term(raw: &str) -> Term {
    let (name, rest) = match raw.find('[') {
        Some(idx) => (&raw[..idx], &raw[idx..]),
        None => (raw, ""),
    };

    let kind_of = |suffix: &str| match suffix {
        "" => Some(Kind::Any),
        "video" | "v" => Some(Kind::Video),
        "audio" | "a" => Some(Kind::Audio),
        _ => None,
    };

    let filters = parse_filters(rest);
    if let Some(suffix) = name.strip_prefix("best") {
        if let (Some(kind), Some(filters)) = (kind_of(suffix), filters.clone()) {
            return Term::Best(kind, filters);
        }
    }
    if let Some(suffix) = name.strip_prefix("worst") {
        if let (Some(kind), Some(filters)) = (kind_of(suffix), filters) {
            return Term::Worst(kind, filters);
        }
    }
    Term::Id(raw.to_string())
}

/// `[height<=720][ext=mp4]`; `None` on malformed input
fn parse_filters(mut rest: &str) -> Option<Vec<Filter>> {
    let mut filters = Vec::new();
    while !rest.is_empty() {
        let body = rest.strip_prefix('[')?;
        let end = body.find(']')?;
        filters.push(parse_filter(&body[..end])?);
        rest = &body[end + 1..];
    }
    Some(filters)
}

fn parse_filter(body: &str) -> Option<Filter> {
    const OPS: [(&str, Op); 6] = [
        ("<=", Op::Le),
        (">=", Op::Ge),
        ("!=", Op::Ne),
        ("<", Op::Lt),
        (">", Op::Gt),
        ("=", Op::Eq),
    ];

    OPS.iter().find_map(|(token, op)| {
        let (key, value) = body.split_once(token)?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some(Filter {
            key: key.to_string(),
            op: *op,
            value: value.trim().to_string(),
        })
    })
}

fn matches_filter(format: &Format, filter: &Filter) -> bool {
    let numeric = match filter.key.as_str() {
        "height" => Some(format.height.map(f64::from)),
        "width" => Some(format.width.map(f64::from)),
        "tbr" => Some(format.tbr.map(f64::from)),
        "fps" => Some(format.fps.map(f64::from)),
        _ => None,
    };

    if let Some(actual) = numeric {
        let (Some(actual), Ok(expected)) = (actual, filter.value.parse::<f64>()) else {
            return false;
        };
        return match filter.op {
            Op::Lt => actual < expected,
            Op::Le => actual <= expected,
            Op::Gt => actual > expected,
            Op::Ge => actual >= expected,
            Op::Eq => actual == expected,
            Op::Ne => actual != expected,
        };
    }

    let actual = match filter.key.as_str() {
        "ext" => Some(format.ext.as_str()),
        "format_id" => Some(format.format_id.as_str()),
        "vcodec" => format.vcodec.as_deref(),
        "acodec" => format.acodec.as_deref(),
        _ => return false,
    };
    match filter.op {
        Op::Eq => actual == Some(filter.value.as_str()),
        Op::Ne => actual != Some(filter.value.as_str()),
        _ => false,
    }
}
