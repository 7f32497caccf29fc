use tracing::warn;

use super::error::LotLogError;

const SISTER_SEPARATOR: char = '-';

/// Resolves a raw `ChargenNr` value into the numeric lot id.
///
/// Sister lots run as one physical unit are written `NUM-SUFFIX`; their id is
/// the textual concatenation of both digit runs, so `1234-5` becomes `12345`.
pub fn resolve_lot_id(raw: &str) -> Result<i64, LotLogError> {
    let trimmed = raw.trim();

    let Some((base, suffix)) = trimmed.split_once(SISTER_SEPARATOR) else {
        return parse_digits(trimmed, raw);
    };

    let base = base.trim();
    let suffix = suffix.trim();
    if base.is_empty() || suffix.is_empty() || suffix.contains(SISTER_SEPARATOR) {
        return Err(LotLogError::MalformedLotId(raw.to_string()));
    }

    let resolved = parse_digits(&format!("{base}{suffix}"), raw)?;
    warn!(original = %trimmed, resolved, "amending sister lot");

    Ok(resolved)
}

fn parse_digits(digits: &str, raw: &str) -> Result<i64, LotLogError> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LotLogError::MalformedLotId(raw.to_string()));
    }

    digits
        .parse::<i64>()
        .map_err(|_| LotLogError::MalformedLotId(raw.to_string()))
}
