// Utilitários para manipulação de valores monetários

/// Parses a decimal reais string ("64,73" or "64.73") into cents.
pub fn parse_reais_to_cents(value: &str) -> Option<i64> {
    let cleaned = value.trim().replace("R$", "").replace(' ', "").replace(',', ".");
    let reais: f64 = cleaned.parse().ok()?;
    if !reais.is_finite() {
        return None;
    }
    Some((reais * 100.0).round() as i64)
}

pub fn format_brl(cents: i64) -> String {
    format!("R${:.2}", cents as f64 / 100.0).replace('.', ",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reais_to_cents() {
        assert_eq!(parse_reais_to_cents("64,73"), Some(6473));
        assert_eq!(parse_reais_to_cents("64.73"), Some(6473));
        assert_eq!(parse_reais_to_cents("R$ 10,00"), Some(1000));
        assert_eq!(parse_reais_to_cents("abc"), None);
    }

    #[test]
    fn test_format_brl() {
        assert_eq!(format_brl(1000), "R$10,00");
        assert_eq!(format_brl(6473), "R$64,73");
    }
}
