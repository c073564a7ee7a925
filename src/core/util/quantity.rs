use std::collections::BTreeMap;

use crate::core::client::kube_resources::Quantity;

/// Decomposed Kubernetes quantity: `value * 2^bin_exp * 10^dec_exp`.
struct Scaled {
    value: f64,
    bin_exp: i32,
    dec_exp: i32,
}

fn scale(raw: &str) -> Option<Scaled> {
    let s = raw.trim();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+' || c == '-'))
        .unwrap_or(s.len());
    let (number, suffix) = s.split_at(split);
    let value: f64 = number.parse().ok()?;

    let (bin_exp, dec_exp) = match suffix {
        "" => (0, 0),
        "n" => (0, -9),
        "u" => (0, -6),
        "m" => (0, -3),
        "k" => (0, 3),
        "M" => (0, 6),
        "G" => (0, 9),
        "T" => (0, 12),
        "P" => (0, 15),
        "E" => (0, 18),
        "Ki" => (10, 0),
        "Mi" => (20, 0),
        "Gi" => (30, 0),
        "Ti" => (40, 0),
        "Pi" => (50, 0),
        "Ei" => (60, 0),
        exp if exp.starts_with('e') || exp.starts_with('E') => (0, exp[1..].parse().ok()?),
        _ => return None,
    };

    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(Scaled {
        value,
        bin_exp,
        dec_exp,
    })
}

/// Evaluate at `10^shift` units, rounding up like `Quantity.MilliValue()`.
fn evaluate(scaled: Scaled, shift: i32) -> u64 {
    let dec = scaled.dec_exp + shift;
    let mut x = scaled.value * 2f64.powi(scaled.bin_exp);
    // divide for negative exponents so exact inputs stay exact
    x = if dec >= 0 {
        x * 10f64.powi(dec)
    } else {
        x / 10f64.powi(-dec)
    };

    let nearest = x.round();
    let rounded = if (x - nearest).abs() < 1e-6 {
        nearest
    } else {
        x.ceil()
    };
    if rounded >= u64::MAX as f64 {
        u64::MAX
    } else {
        rounded as u64
    }
}

/// Parse a CPU quantity ("250m", "2", "1500000n") into millicores.
pub fn parse_cpu_millis(raw: &str) -> Option<u64> {
    scale(raw).map(|s| evaluate(s, 3))
}

/// Parse a memory/storage quantity ("64Mi", "1G", "129e6") into bytes.
pub fn parse_bytes(raw: &str) -> Option<u64> {
    scale(raw).map(|s| evaluate(s, 0))
}

/// Millicores of an optional quantity; missing or unparseable is zero.
#[inline]
pub fn cpu_millis_of(q: Option<&Quantity>) -> u64 {
    q.and_then(|q| parse_cpu_millis(&q.0)).unwrap_or(0)
}

/// Bytes of an optional quantity; missing or unparseable is zero.
#[inline]
pub fn bytes_of(q: Option<&Quantity>) -> u64 {
    q.and_then(|q| parse_bytes(&q.0)).unwrap_or(0)
}

/// CPU and memory from a resource list such as `allocatable` or `requests`.
pub fn cpu_and_memory(list: Option<&BTreeMap<String, Quantity>>) -> (u64, u64) {
    match list {
        Some(map) => (cpu_millis_of(map.get("cpu")), bytes_of(map.get("memory"))),
        None => (0, 0),
    }
}

/// `used / total`, zero when there is nothing to divide by.
#[inline]
pub fn ratio(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_quantities_convert_to_millicores() {
        assert_eq!(parse_cpu_millis("250m"), Some(250));
        assert_eq!(parse_cpu_millis("2"), Some(2000));
        assert_eq!(parse_cpu_millis("0.5"), Some(500));
        assert_eq!(parse_cpu_millis("1500000n"), Some(2));
        assert_eq!(parse_cpu_millis("100u"), Some(1));
    }

    #[test]
    fn memory_quantities_convert_to_bytes() {
        assert_eq!(parse_bytes("64Mi"), Some(64 * 1024 * 1024));
        assert_eq!(parse_bytes("1Gi"), Some(1 << 30));
        assert_eq!(parse_bytes("1G"), Some(1_000_000_000));
        assert_eq!(parse_bytes("16254356Ki"), Some(16_254_356 * 1024));
        assert_eq!(parse_bytes("129e6"), Some(129_000_000));
        assert_eq!(parse_bytes("1E"), Some(1_000_000_000_000_000_000));
        assert_eq!(parse_bytes("12345"), Some(12345));
    }

    #[test]
    fn negative_or_garbage_quantities_are_rejected() {
        assert_eq!(parse_bytes("-1Gi"), None);
        assert_eq!(parse_cpu_millis(""), None);
        assert_eq!(parse_cpu_millis("abc"), None);
        assert_eq!(parse_bytes("10Qi"), None);
        assert_eq!(cpu_millis_of(Some(&Quantity("bogus".into()))), 0);
        assert_eq!(bytes_of(None), 0);
    }

    #[test]
    fn ratio_of_empty_total_is_zero() {
        assert_eq!(ratio(5, 0), 0.0);
        assert_eq!(ratio(1000, 4000), 0.25);
    }
}
