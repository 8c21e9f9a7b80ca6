use std::future::Future;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NON_ALNUM: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
}

/// Maps common Latin letters with diacritics onto ASCII.
fn fold(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

/// Lowercase, ASCII, dash-separated form of `input`. Empty when nothing usable remains.
pub fn slugify(input: &str) -> String {
    let folded: String = input.to_lowercase().chars().map(fold).collect();
    NON_ALNUM
        .replace_all(&folded, "-")
        .trim_matches('-')
        .to_string()
}

/// The `n`th candidate for `base`: `base`, `base-2`, `base-3`, ...
pub fn candidate(base: &str, n: u32) -> String {
    if n <= 1 {
        base.to_string()
    } else {
        format!("{base}-{n}")
    }
}

/// Returns the first candidate for `source` that `exists` reports as free.
///
/// Takes no lock: two concurrent callers can settle on the same candidate and
/// the unique index rejects the later insert.
pub async fn resolve_unique<F, Fut, E>(source: &str, fallback: &str, mut exists: F) -> Result<String, E>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    let mut base = slugify(source);
    if base.is_empty() {
        base = fallback.to_string();
    }
    let mut n = 1;
    loop {
        let slug = candidate(&base, n);
        if !exists(slug.clone()).await? {
            return Ok(slug);
        }
        n += 1;
    }
}
