//! RUT (national tax ID) normalization.
//!
//! Raw exports carry RUTs in several shapes: `12345678-5`, `12.345.678-5`,
//! sometimes without the dash or with stray whitespace. Normalization strips
//! everything down to digits plus the K check character and rebuilds the
//! display form. No checksum verification is performed, formatting only.

/// Normalize a raw RUT into display form, e.g. `"12345678-5"` → `"12.345.678-5"`.
///
/// Returns `None` when fewer than two usable characters remain (no body or no
/// check digit to work with).
pub fn normalize_rut(raw: &str) -> Option<String> {
    let clean: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == 'K' || *c == 'k')
        .collect();
    if clean.len() < 2 {
        return None;
    }

    let (body, dv) = clean.split_at(clean.len() - 1);
    let dv = dv.to_ascii_uppercase();

    Some(format!("{}-{}", group_thousands(body), dv))
}

/// Insert `.` separators every three digits from the right.
fn group_thousands(body: &str) -> String {
    let digits: Vec<char> = body.chars().collect();
    let mut out = String::with_capacity(body.len() + body.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        let remaining = digits.len() - i;
        if i > 0 && remaining % 3 == 0 {
            out.push('.');
        }
        out.push(*c);
    }
    out
}

/// Shape check for validation-only mode. Accepts the typical `12345678-9`
/// form (dots tolerated in the body, K tolerated as check char) and, as the
/// exports sometimes do, a dashless value of at least two characters.
pub fn plausible_rut(raw: &str) -> bool {
    let rut = raw.trim();
    if rut.is_empty() {
        return false;
    }

    if !rut.contains('-') {
        return rut.len() >= 2;
    }

    let mut parts = rut.splitn(3, '-');
    let (Some(body), Some(dv), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };

    let body_ok = !body.is_empty()
        && body.chars().all(|c| c.is_ascii_digit() || c == '.');
    let dv_ok = dv.len() == 1
        && dv.chars().all(|c| c.is_ascii_digit() || c.eq_ignore_ascii_case(&'K'));

    body_ok && dv_ok
}
