//! Intent parser: raw query text to [`StructuredQuery`].
//!
//! The parser is a pure function of the query string and the supplied
//! [`Dictionaries`]. It tokenizes on whitespace and runs a fixed sequence
//! of recognition passes. Each pass may claim tokens; a claimed token is
//! never looked at again, and whatever is left over becomes the query's
//! free text.
//!
//! # Pass order
//!
//! 1. Explicit filters: `company:acme`, `source:referral`, `#tag`, ...
//! 2. Connector phrases: `owned by X`, `named X`, `tagged X`.
//! 3. Time phrases, longest first: `last week`, `this month`, `stale`, ...
//! 4. Warmth words: `cold`, `warm`, `hot`, `champion`.
//! 5. Known sources (exact, multi-word allowed).
//! 6. Known organizations (longest span first, word-aligned containment).
//! 7. Deal context: with `deal`/`deals` present, status and sector words
//!    describe deals rather than organizations.
//! 8. Sector, organization-kind, and role vocabularies.
//!
//! Filler words (`at`, `from`, `the`, ...) are dropped from the free text
//! once at least one intent has been recognized.
//!
//! # Example
//!
//! ```rust
//! use contact_search_core::models::{Dictionaries, IntentKind};
//! use contact_search_core::parse::parse;
//!
//! let dicts = Dictionaries::new(["Acme Corp"], ["Referral"]);
//! let q = parse("hot investors at acme", &dicts);
//! let kinds: Vec<IntentKind> = q.intents.iter().map(|i| i.kind).collect();
//! assert_eq!(kinds, vec![IntentKind::Warmth, IntentKind::Company, IntentKind::Role]);
//! assert_eq!(q.free_text, "");
//! ```

use crate::models::{Dictionaries, Intent, IntentKind, StructuredQuery, TimeWindow};

/// Shortest organization span (in characters) the parser will try to
/// resolve against the dictionary.
const MIN_ORG_SPAN_CHARS: usize = 3;
/// Longest organization span (in tokens).
const MAX_ORG_SPAN_TOKENS: usize = 4;
/// A trailing partial word must be at least this long to prefix-match an
/// organization word (`"glob"` claims `"Globex"`).
const MIN_PREFIX_CHARS: usize = 4;

/// Time phrases, longest first.
const TIME_PHRASES: &[(&str, TimeWindow, &str)] = &[
    ("this quarter", TimeWindow::Within { days: 90 }, "This quarter"),
    ("last month", TimeWindow::Within { days: 60 }, "Last month"),
    ("this month", TimeWindow::Within { days: 30 }, "This month"),
    ("past month", TimeWindow::Within { days: 30 }, "Past month"),
    ("last week", TimeWindow::Within { days: 14 }, "Last week"),
    ("this week", TimeWindow::Within { days: 7 }, "This week"),
    ("past week", TimeWindow::Within { days: 7 }, "Past week"),
    ("last year", TimeWindow::Within { days: 730 }, "Last year"),
    ("this year", TimeWindow::Within { days: 365 }, "This year"),
    ("today", TimeWindow::Within { days: 1 }, "Today"),
    ("yesterday", TimeWindow::Within { days: 2 }, "Yesterday"),
    ("recently", TimeWindow::Within { days: 30 }, "Recently"),
    ("recent", TimeWindow::Within { days: 30 }, "Recently"),
    ("stale", TimeWindow::Before { days: 90 }, "Stale"),
];

/// `(word, value, label)` vocabularies.
type Vocabulary = &'static [(&'static str, &'static str, &'static str)];

const WARMTH_WORDS: Vocabulary = &[
    ("cold", "0", "Cold"),
    ("warm", "1", "Warm"),
    ("hot", "2", "Hot"),
    ("champion", "3", "Champion"),
    ("champions", "3", "Champion"),
];

const SECTOR_WORDS: Vocabulary = &[
    ("fintech", "fintech", "Fintech"),
    ("healthtech", "healthtech", "Healthtech"),
    ("biotech", "biotech", "Biotech"),
    ("saas", "saas", "SaaS"),
    ("ai", "ai", "AI"),
    ("climate", "climate", "Climate"),
    ("crypto", "crypto", "Crypto"),
    ("edtech", "edtech", "Edtech"),
    ("ecommerce", "ecommerce", "E-commerce"),
    ("proptech", "proptech", "Proptech"),
    ("gaming", "gaming", "Gaming"),
    ("hardware", "hardware", "Hardware"),
    ("robotics", "robotics", "Robotics"),
    ("media", "media", "Media"),
];

const ORG_KIND_WORDS: Vocabulary = &[
    ("startup", "startup", "Startup"),
    ("startups", "startup", "Startup"),
    ("fund", "fund", "Fund"),
    ("funds", "fund", "Fund"),
    ("vc", "vc", "VC"),
    ("vcs", "vc", "VC"),
    ("agency", "agency", "Agency"),
    ("agencies", "agency", "Agency"),
    ("nonprofit", "nonprofit", "Nonprofit"),
    ("nonprofits", "nonprofit", "Nonprofit"),
    ("accelerator", "accelerator", "Accelerator"),
    ("accelerators", "accelerator", "Accelerator"),
    ("corporate", "corporate", "Corporate"),
];

const ROLE_WORDS: Vocabulary = &[
    ("investor", "investor", "Investor"),
    ("investors", "investor", "Investor"),
    ("founder", "founder", "Founder"),
    ("founders", "founder", "Founder"),
    ("ceo", "ceo", "CEO"),
    ("ceos", "ceo", "CEO"),
    ("cto", "cto", "CTO"),
    ("cfo", "cfo", "CFO"),
    ("coo", "coo", "COO"),
    ("partner", "partner", "Partner"),
    ("partners", "partner", "Partner"),
    ("engineer", "engineer", "Engineer"),
    ("engineers", "engineer", "Engineer"),
    ("advisor", "advisor", "Advisor"),
    ("advisors", "advisor", "Advisor"),
    ("angel", "angel", "Angel"),
    ("angels", "angel", "Angel"),
    ("recruiter", "recruiter", "Recruiter"),
    ("recruiters", "recruiter", "Recruiter"),
    ("designer", "designer", "Designer"),
    ("designers", "designer", "Designer"),
    ("director", "director", "Director"),
    ("directors", "director", "Director"),
    ("analyst", "analyst", "Analyst"),
    ("analysts", "analyst", "Analyst"),
    ("principal", "principal", "Principal"),
    ("principals", "principal", "Principal"),
];

const DEAL_STATUS_WORDS: Vocabulary = &[
    ("open", "open", "Open"),
    ("active", "active", "Active"),
    ("closed", "closed", "Closed"),
    ("won", "won", "Won"),
    ("lost", "lost", "Lost"),
    ("pending", "pending", "Pending"),
];

const DEAL_WORDS: &[&str] = &["deal", "deals"];

const CONNECTOR_PHRASES: &[(&str, IntentKind)] = &[
    ("owned by", IntentKind::Owner),
    ("with tag", IntentKind::Tag),
    ("named", IntentKind::Name),
    ("called", IntentKind::Name),
    ("tagged", IntentKind::Tag),
];

const FILLER_WORDS: &[&str] = &[
    "a", "an", "the", "at", "in", "from", "of", "with", "who", "whose", "and", "or", "my", "our",
    "all", "any", "people", "contacts", "contact", "show", "find", "me", "for", "to", "on", "are",
    "is", "that", "by",
];

/// Parse a raw query into a [`StructuredQuery`].
///
/// Deterministic: the same `(raw, dictionaries)` always produces the same
/// output, intent order included. Never fails; anything unrecognized ends
/// up in [`StructuredQuery::free_text`].
pub fn parse(raw: &str, dictionaries: &Dictionaries) -> StructuredQuery {
    let mut parser = Parser::new(raw, dictionaries);
    parser.explicit_filters();
    parser.connector_phrases();
    parser.time_phrases();
    parser.vocabulary(IntentKind::Warmth, WARMTH_WORDS);
    parser.known_sources();
    parser.known_organizations();
    parser.deal_context();
    parser.vocabulary(IntentKind::OrgSector, SECTOR_WORDS);
    parser.vocabulary(IntentKind::OrgKind, ORG_KIND_WORDS);
    parser.vocabulary(IntentKind::Role, ROLE_WORDS);
    parser.finish()
}

/// Look up a warmth level (`0..=3`) from a word or digit.
pub fn warmth_level(word: &str) -> Option<u8> {
    let word = normalize_word(word);
    if let Ok(level) = word.parse::<u8>() {
        return (level <= 3).then_some(level);
    }
    WARMTH_WORDS
        .iter()
        .find(|(w, _, _)| *w == word)
        .and_then(|(_, value, _)| value.parse().ok())
}

/// Resolve a time phrase such as `"last week"` to its window.
pub fn time_window(phrase: &str) -> Option<TimeWindow> {
    let phrase = phrase
        .split_whitespace()
        .map(normalize_word)
        .collect::<Vec<_>>()
        .join(" ");
    TIME_PHRASES
        .iter()
        .find(|(p, _, _)| *p == phrase)
        .map(|(_, window, _)| *window)
        .or_else(|| TimeWindow::from_value(&phrase))
}

/// Lowercase a word and strip surrounding punctuation.
pub(crate) fn normalize_word(word: &str) -> String {
    trim_punctuation(word).to_lowercase()
}

fn trim_punctuation(word: &str) -> &str {
    word.trim_matches(|c: char| {
        matches!(
            c,
            ',' | '.' | ';' | '!' | '?' | '"' | '\'' | '(' | ')' | '[' | ']' | '{' | '}'
        )
    })
}

struct Token {
    text: String,
    norm: String,
    claimed: bool,
}

struct Parser<'a> {
    tokens: Vec<Token>,
    query: StructuredQuery,
    dictionaries: &'a Dictionaries,
}

impl<'a> Parser<'a> {
    fn new(raw: &str, dictionaries: &'a Dictionaries) -> Self {
        let tokens = raw
            .split_whitespace()
            .map(trim_punctuation)
            .filter(|t| !t.is_empty())
            .map(|t| Token {
                text: t.to_string(),
                norm: t.to_lowercase(),
                claimed: false,
            })
            .collect();
        Self {
            tokens,
            query: StructuredQuery {
                raw: raw.to_string(),
                ..Default::default()
            },
            dictionaries,
        }
    }

    /// First position where `words` appear as consecutive unclaimed tokens.
    fn find_span(&self, words: &[&str]) -> Option<usize> {
        if words.is_empty() || words.len() > self.tokens.len() {
            return None;
        }
        (0..=self.tokens.len() - words.len()).find(|&i| {
            self.tokens[i..i + words.len()]
                .iter()
                .zip(words)
                .all(|(t, w)| !t.claimed && t.norm == *w)
        })
    }

    fn span_free(&self, start: usize, len: usize) -> bool {
        start + len <= self.tokens.len() && self.tokens[start..start + len].iter().all(|t| !t.claimed)
    }

    fn claim(&mut self, start: usize, len: usize) {
        for t in &mut self.tokens[start..start + len] {
            t.claimed = true;
        }
    }

    fn join_span(&self, start: usize, len: usize, normalized: bool) -> String {
        self.tokens[start..start + len]
            .iter()
            .map(|t| if normalized { t.norm.as_str() } else { t.text.as_str() })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn explicit_filters(&mut self) {
        for i in 0..self.tokens.len() {
            if self.tokens[i].claimed {
                continue;
            }
            let text = self.tokens[i].text.clone();

            if let Some(tag) = text.strip_prefix('#') {
                if !tag.is_empty() {
                    self.query
                        .push_intent(Intent::new(IntentKind::Tag, tag.to_lowercase(), text.clone()));
                    self.claim(i, 1);
                }
                continue;
            }

            let Some((key, value)) = text.split_once(':') else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            let intent = match explicit_kind(&key.to_lowercase()) {
                Some(IntentKind::Warmth) => match warmth_level(value) {
                    Some(level) => Intent::new(IntentKind::Warmth, level.to_string(), value),
                    None => continue,
                },
                Some(IntentKind::Company) => {
                    let span = value.to_lowercase();
                    match self.match_organization(&span) {
                        Some((v, label)) => Intent::new(IntentKind::Company, v, label),
                        None => Intent::new(IntentKind::Company, span, value),
                    }
                }
                Some(kind) => Intent::new(kind, value.to_lowercase(), value),
                None => continue,
            };
            self.query.push_intent(intent);
            self.claim(i, 1);
        }
    }

    fn connector_phrases(&mut self) {
        for (phrase, kind) in CONNECTOR_PHRASES {
            let words: Vec<&str> = phrase.split(' ').collect();
            while let Some(i) = self.find_span(&words) {
                let j = i + words.len();
                if !self.span_free(j, 1) {
                    break;
                }
                let intent = Intent::new(*kind, self.tokens[j].norm.clone(), self.tokens[j].text.clone());
                self.query.push_intent(intent);
                self.claim(i, words.len() + 1);
            }
        }
    }

    fn time_phrases(&mut self) {
        for (phrase, window, label) in TIME_PHRASES {
            let words: Vec<&str> = phrase.split(' ').collect();
            while let Some(i) = self.find_span(&words) {
                self.query
                    .push_intent(Intent::new(IntentKind::Time, window.to_value(), *label));
                self.claim(i, words.len());
            }
        }
    }

    fn vocabulary(&mut self, kind: IntentKind, words: Vocabulary) {
        for i in 0..self.tokens.len() {
            if self.tokens[i].claimed {
                continue;
            }
            if let Some((_, value, label)) = words.iter().find(|(w, _, _)| *w == self.tokens[i].norm) {
                self.query.push_intent(Intent::new(kind, *value, *label));
                self.claim(i, 1);
            }
        }
    }

    fn known_sources(&mut self) {
        let dictionaries = self.dictionaries;
        let mut sources: Vec<(Vec<String>, &String)> = dictionaries
            .sources
            .iter()
            .map(|s| (s.split_whitespace().map(normalize_word).collect(), s))
            .collect();
        // Longest first so "warm intro" wins over "intro".
        sources.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        for (words, canonical) in sources {
            let words: Vec<&str> = words.iter().map(String::as_str).collect();
            while let Some(i) = self.find_span(&words) {
                self.query.push_intent(Intent::new(
                    IntentKind::Source,
                    words.join(" "),
                    canonical.clone(),
                ));
                self.claim(i, words.len());
            }
        }
    }

    fn known_organizations(&mut self) {
        let mut i = 0;
        while i < self.tokens.len() {
            let mut advanced = false;
            for len in (1..=MAX_ORG_SPAN_TOKENS).rev() {
                if !self.span_free(i, len) {
                    continue;
                }
                let span = self.join_span(i, len, true);
                if span.chars().count() < MIN_ORG_SPAN_CHARS {
                    continue;
                }
                if let Some((value, label)) = self.match_organization(&span) {
                    let label = if label == span {
                        self.join_span(i, len, false)
                    } else {
                        label
                    };
                    self.query
                        .push_intent(Intent::new(IntentKind::Company, value, label));
                    self.claim(i, len);
                    i += len;
                    advanced = true;
                    break;
                }
            }
            if !advanced {
                i += 1;
            }
        }
    }

    /// Resolve a normalized span against the known organizations.
    ///
    /// Returns `(value, label)`: the canonical organization when exactly one
    /// matches (or one matches exactly), otherwise the span itself so the
    /// matcher can do containment over all of them.
    fn match_organization(&self, span: &str) -> Option<(String, String)> {
        let hits: Vec<&String> = self
            .dictionaries
            .organizations
            .iter()
            .filter(|org| org_contains(org, span))
            .collect();

        if let Some(exact) = hits
            .iter()
            .find(|org| normalized_words(org).join(" ") == span)
        {
            return Some((span.to_string(), (*exact).clone()));
        }
        match hits.as_slice() {
            [] => None,
            [only] => Some((normalized_words(only).join(" "), (*only).clone())),
            _ => Some((span.to_string(), span.to_string())),
        }
    }

    fn deal_context(&mut self) {
        let deal_positions: Vec<usize> = (0..self.tokens.len())
            .filter(|&i| !self.tokens[i].claimed && DEAL_WORDS.contains(&self.tokens[i].norm.as_str()))
            .collect();
        if deal_positions.is_empty() {
            return;
        }

        let before = self.query.intents.len();
        self.vocabulary(IntentKind::DealStatus, DEAL_STATUS_WORDS);
        self.vocabulary(IntentKind::DealSector, SECTOR_WORDS);
        if self.query.intents.len() > before {
            for i in deal_positions {
                self.claim(i, 1);
            }
        }
    }

    fn finish(self) -> StructuredQuery {
        let mut query = self.query;
        let has_intents = !query.intents.is_empty();
        query.free_text = self
            .tokens
            .iter()
            .filter(|t| !t.claimed)
            .filter(|t| !(has_intents && FILLER_WORDS.contains(&t.norm.as_str())))
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        query
    }
}

fn explicit_kind(key: &str) -> Option<IntentKind> {
    let kind = match key {
        "company" | "org" | "organization" => IntentKind::Company,
        "source" => IntentKind::Source,
        "owner" => IntentKind::Owner,
        "role" | "title" => IntentKind::Role,
        "tag" => IntentKind::Tag,
        "name" => IntentKind::Name,
        "deal" => IntentKind::DealName,
        "sector" => IntentKind::OrgSector,
        "kind" => IntentKind::OrgKind,
        "status" => IntentKind::DealStatus,
        "warmth" => IntentKind::Warmth,
        _ => return None,
    };
    Some(kind)
}

fn normalized_words(s: &str) -> Vec<String> {
    s.split_whitespace()
        .map(normalize_word)
        .filter(|w| !w.is_empty())
        .collect()
}

/// Word-aligned containment of `span` in `org`.
///
/// Every span word must equal consecutive organization words, except the
/// last, which may be a prefix of at least [`MIN_PREFIX_CHARS`] characters.
fn org_contains(org: &str, span: &str) -> bool {
    let org_words = normalized_words(org);
    let span_words: Vec<&str> = span.split(' ').collect();
    let Some((last, head)) = span_words.split_last() else {
        return false;
    };

    (0..org_words.len()).any(|start| {
        let window = &org_words[start..];
        if window.len() < span_words.len() {
            return false;
        }
        let head_ok = head.iter().zip(window).all(|(s, o)| *s == o.as_str());
        let candidate = &window[head.len()];
        head_ok
            && (candidate.as_str() == *last
                || (last.chars().count() >= MIN_PREFIX_CHARS && candidate.starts_with(*last)))
    })
}
