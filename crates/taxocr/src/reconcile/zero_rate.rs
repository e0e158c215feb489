//! Deterministic recovery of the two zero-rate sales amounts from OCR text.
//!
//! The model regularly swaps or drops the domestic (non-customs) and export
//! (customs) zero-rate figures. This pass reads them straight from the OCR
//! text by position relative to the form's labels. It never calls the model.
//!
//! Section location:
//! 1. Collapse whitespace.
//! 2. Start at the non-customs label. If line code `16` follows, end before
//!    the first amount in the next 100 characters, or at the first end marker
//!    found there. Without code `16`, end after the nearest section-end marker.
//! 3. Without the label, fall back to the zero-rate or exempt headings and
//!    end at the next section-end marker.
//!
//! Assignment:
//! - no amounts: both zero
//! - one amount (or one value repeated): whichever label it sits closer to
//! - several: split at the customs label and take the first distinct values

use std::sync::LazyLock;

use regex::Regex;

use crate::document::{Amount, SalesReturn};

const NON_CUSTOMS_LABEL: &str = "非經海關";
const CUSTOMS_LABEL: &str = "經海關";

/// Characters scanned after line code 16 for the end of the section.
const WINDOW_CHARS: usize = 100;

/// Amounts at or below this are line codes, not money.
const MIN_AMOUNT: i64 = 30;

static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static RE_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{1,3}(?:,[0-9]{3})+|[0-9]{4,}").unwrap());
static RE_CODE_16: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b16\b").unwrap());
static RE_ZERO_RATE_HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"零.*?稅率.*?銷.*?售.*?額.*?免稅.*?銷售額").unwrap());
static RE_EXEMPT_HEAD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"免稅.*?銷售額").unwrap());
static RE_SECTION_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"稅額.*?計算|銷售額.*?總.*?計|代號.*?項.*?目|本期.*?月.*?銷項稅額").unwrap()
});

static SECTION_END_MARKERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"稅額.*?計算",
        r"銷售額.*?總.*?計",
        r"代號.*?項.*?目",
        r"本期.*?月.*?銷項稅額",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Section-end markers plus the line codes that follow the zero-rate block.
static WINDOW_END_MARKERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"稅額.*?計算",
        r"銷售額.*?總.*?計",
        r"代號.*?項.*?目",
        r"本期.*?月.*?銷項稅額",
        r"\b19\b",
        r"\b20\b",
        r"\b23\b",
        r"\b24\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZeroRateAmounts {
    pub non_customs: i64,
    pub customs: i64,
}

impl ZeroRateAmounts {
    fn new(non_customs: i64, customs: i64) -> Self {
        Self {
            non_customs,
            customs,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Token {
    value: i64,
    /// Character offset within the section.
    pos: usize,
}

/// Reads the two zero-rate amounts from OCR text. `None` when the text has
/// no recognisable zero-rate section.
pub fn extract(ocr_text: &str) -> Option<ZeroRateAmounts> {
    let cleaned = RE_WHITESPACE.replace_all(ocr_text.trim(), " ");
    let section = locate_section(&cleaned)?;

    let tokens = amount_tokens(section);
    let non_customs_pos = section
        .find(NON_CUSTOMS_LABEL)
        .map(|b| char_pos(section, b));
    let customs_pos = standalone_customs_label(section).map(|b| char_pos(section, b));

    let amounts = match tokens.as_slice() {
        [] => ZeroRateAmounts::new(0, 0),
        [only] => assign_single(*only, non_customs_pos, customs_pos),
        [first, rest @ ..] if rest.iter().all(|t| t.value == first.value) => {
            assign_single(*first, non_customs_pos, customs_pos)
        }
        _ => assign_many(&tokens, customs_pos),
    };

    tracing::debug!(
        section_chars = section.chars().count(),
        amounts_found = tokens.len(),
        non_customs = amounts.non_customs,
        customs = amounts.customs,
        "Zero-rate fallback extraction"
    );

    Some(amounts)
}

/// Overwrites the zero-rate amounts where the OCR reading disagrees with the
/// model, then recomputes the sales total and net total from the corrected
/// figures. Returns whether anything changed.
pub fn apply(doc: &mut SalesReturn, ocr_text: &str) -> bool {
    let Some(found) = extract(ocr_text) else {
        return false;
    };

    let zero = &mut doc.sales.general.zero_rate;
    let mut corrected = false;
    if zero.non_customs != Amount(found.non_customs) {
        tracing::info!(
            model = zero.non_customs.value(),
            ocr = found.non_customs,
            "Correcting non-customs zero-rate sales"
        );
        zero.non_customs = Amount(found.non_customs);
        corrected = true;
    }
    if zero.customs != Amount(found.customs) {
        tracing::info!(
            model = zero.customs.value(),
            ocr = found.customs,
            "Correcting customs zero-rate sales"
        );
        zero.customs = Amount(found.customs);
        corrected = true;
    }

    if corrected {
        let sales = &mut doc.sales;
        let taxable = &sales.general.taxable;
        let zero = &sales.general.zero_rate;
        let sales_total = taxable.triple_form_invoices
            + taxable.register_invoices
            + taxable.two_form
            + zero.non_customs
            + zero.customs;
        sales.sales_total = Some(sales_total);
        sales.net_total = Some(sales_total - sales.sales_returns);
    }

    corrected
}

fn locate_section(text: &str) -> Option<&str> {
    if let Some(start) = text.find(NON_CUSTOMS_LABEL) {
        let tail = &text[start..];
        let end = match RE_CODE_16.find(tail) {
            Some(code) => {
                let search_start = start + code.end();
                let window = char_window(text, search_start, WINDOW_CHARS);
                let offset = match RE_AMOUNT.find(window) {
                    Some(amount) => amount.start(),
                    None => WINDOW_END_MARKERS
                        .iter()
                        .find_map(|re| re.find(window))
                        .map_or(window.len(), |m| m.start()),
                };
                search_start + offset
            }
            None => SECTION_END_MARKERS
                .iter()
                .filter_map(|re| re.find(tail))
                .map(|m| start + m.end())
                .min()
                .unwrap_or(text.len()),
        };
        return Some(&text[start..end]);
    }

    [&*RE_ZERO_RATE_HEAD, &*RE_EXEMPT_HEAD]
        .into_iter()
        .find_map(|head| head.find(text))
        .map(|head| {
            let end = RE_SECTION_END
                .find_at(text, head.end())
                .map_or(text.len(), |m| m.start());
            &text[head.start()..end]
        })
}

fn amount_tokens(section: &str) -> Vec<Token> {
    RE_AMOUNT
        .find_iter(section)
        .filter_map(|m| {
            let value: i64 = m.as_str().replace(',', "").parse().ok()?;
            (value > MIN_AMOUNT).then(|| Token {
                value,
                pos: char_pos(section, m.start()),
            })
        })
        .collect()
}

/// The customs label that is not the tail of the non-customs label.
fn standalone_customs_label(section: &str) -> Option<usize> {
    section
        .match_indices(CUSTOMS_LABEL)
        .map(|(i, _)| i)
        .find(|&i| !section[..i].ends_with('非'))
}

fn assign_single(
    token: Token,
    non_customs_pos: Option<usize>,
    customs_pos: Option<usize>,
) -> ZeroRateAmounts {
    match (non_customs_pos, customs_pos) {
        (Some(non_customs), Some(customs)) => {
            if token.pos.abs_diff(non_customs) < token.pos.abs_diff(customs) {
                ZeroRateAmounts::new(token.value, 0)
            } else {
                ZeroRateAmounts::new(0, token.value)
            }
        }
        (None, Some(_)) => ZeroRateAmounts::new(0, token.value),
        _ => ZeroRateAmounts::new(token.value, 0),
    }
}

fn assign_many(tokens: &[Token], customs_pos: Option<usize>) -> ZeroRateAmounts {
    let Some(customs_pos) = customs_pos else {
        return first_two_distinct(tokens);
    };

    let before: Vec<Token> = tokens.iter().copied().filter(|t| t.pos < customs_pos).collect();
    let after: Vec<Token> = tokens.iter().copied().filter(|t| t.pos >= customs_pos).collect();
    let after_distinct = distinct_values(&after);

    match (after_distinct.as_slice(), before.first()) {
        ([first, second, ..], _) => ZeroRateAmounts::new(*first, *second),
        ([only], Some(b)) => ZeroRateAmounts::new(b.value, *only),
        ([only], None) => ZeroRateAmounts::new(0, *only),
        ([], _) => first_two_distinct(tokens),
    }
}

fn first_two_distinct(tokens: &[Token]) -> ZeroRateAmounts {
    let values = distinct_values(tokens);
    ZeroRateAmounts::new(
        values.first().copied().unwrap_or(0),
        values.get(1).copied().unwrap_or(0),
    )
}

fn distinct_values(tokens: &[Token]) -> Vec<i64> {
    let mut values: Vec<i64> = Vec::new();
    for token in tokens {
        if !values.contains(&token.value) {
            values.push(token.value);
        }
    }
    values
}

fn char_pos(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

/// Up to `chars` characters of `text` starting at byte offset `start`.
fn char_window(text: &str, start: usize, chars: usize) -> &str {
    let rest = &text[start..];
    let end = rest.char_indices().nth(chars).map_or(rest.len(), |(i, _)| i);
    &rest[..end]
}
