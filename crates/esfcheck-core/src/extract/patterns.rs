//! Common regex patterns for ESF field extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Digit groups joined by single separators, e.g. `2206 2980 2621`.
    pub static ref DIGIT_GROUP_RUN: Regex =
        Regex::new(r"[0-9]+(?:[ '.\-][0-9]+)*").unwrap();

    /// Plain digit run.
    pub static ref DIGIT_RUN: Regex = Regex::new(r"[0-9]+").unwrap();

    /// A tax-identifier token in running text.
    pub static ref TAX_ID_TOKEN: Regex =
        Regex::new(r"(?i)\b(?:иин|бин|iin|bin)\b").unwrap();

    /// Supplier tax-ID labels.
    pub static ref SUPPLIER_TAX_ID_LABEL: Regex = Regex::new(
        r"(?i)(?:(?:иин/бин|бин/иин|бин|иин)\s*(?:поставщика|продавца|отправителя)|(?:поставщик|продавец)[^0-9\n]{0,40}?(?:бин|иин)|(?:supplier|seller)(?:'s)?\s*(?:bin|iin)|(?:bin|iin)\s*(?:of\s+)?(?:the\s+)?(?:supplier|seller))"
    )
    .unwrap();

    /// Buyer tax-ID labels.
    pub static ref BUYER_TAX_ID_LABEL: Regex = Regex::new(
        r"(?i)(?:(?:иин/бин|бин/иин|бин|иин)\s*(?:покупателя|получателя|заказчика)|(?:покупатель|получатель|заказчик)[^0-9\n]{0,40}?(?:бин|иин)|(?:buyer|customer|recipient)(?:'s)?\s*(?:bin|iin)|(?:bin|iin)\s*(?:of\s+)?(?:the\s+)?(?:buyer|customer|recipient))"
    )
    .unwrap();

    /// `YYYY-MM-DD` with `.`, `/` or `-` separators.
    pub static ref DATE_YMD: Regex =
        Regex::new(r"([0-9]{4}) ?[./\-] ?([0-9]{1,2}) ?[./\-] ?([0-9]{1,2})").unwrap();

    /// `DD.MM.YYYY` with `.`, `/` or `-` separators.
    pub static ref DATE_DMY: Regex =
        Regex::new(r"([0-9]{1,2}) ?[./\-] ?([0-9]{1,2}) ?[./\-] ?([0-9]{4})").unwrap();

    /// `«22» сентября 2025 г.`, optionally preceded by `от`.
    pub static ref DATE_LONG: Regex = Regex::new(
        r#"(?i)(?:\bот[ \t]+)?[«"“„']?([0-9]{1,2})[»"”']?[ \t]+(января|февраля|марта|апреля|мая|июня|июля|августа|сентября|октября|ноября|декабря)[ \t]+([0-9]{4})(?:[ \t]*г(?:ода|\.)?)?"#
    )
    .unwrap();

    /// Explicit issue-date labels.
    pub static ref ISSUE_DATE_LABEL: Regex = Regex::new(
        r"(?i)(?:дата[ \t]*(?:выписки|выставления|составления|формирования)(?:[ \t]*(?:эсф|документа|счета[ \t\-]*фактуры))?|date[ \t]+of[ \t]+issue|issue[ \t]+date|invoice[ \t]+date)[ \t]*[:\-–]?"
    )
    .unwrap();

    /// Explicit turnover-date labels.
    pub static ref TURNOVER_DATE_LABEL: Regex = Regex::new(
        r"(?i)(?:дата[ \t]*(?:совершения[ \t]*)?оборота|turnover[ \t]+date|date[ \t]+of[ \t]+(?:supply|turnover))[ \t]*[:\-–]?"
    )
    .unwrap();

    /// Invoice title followed by `от` / `from` on the same line.
    pub static ref INVOICE_HEADER_FROM: Regex = Regex::new(
        r"(?i)(?:сч[её]т[ \t\-]*фактур[аы]|электронн\w*[ \t]+сч[её]т|\bэсф\b|(?:electronic[ \t]+)?(?:tax[ \t]+)?invoice)[^\n]{0,80}?(?:\bот\b|\bfrom\b|\bdated\b)[ \t]*"
    )
    .unwrap();

    /// Total labels grouped by category. Alternatives sharing a start
    /// position resolve in group order, so specific labels precede generic ones.
    pub static ref TOTAL_LABEL: Regex = Regex::new(concat!(
        r"(?i)\b(?:",
        r"(?P<gross>итого\s*с\s*ндс|всего\s*с\s*ндс|всего\s*к\s*оплате|всего\s*стоимость\s*реализации|стоимость\s*с\s*ндс|total\s*(?:with|incl\.?|including)\s*vat|gross\s*total)",
        r"|(?P<net>итого\s*без\s*ндс|всего\s*без\s*ндс|стоимость\s*без\s*ндс|сумма\s*без\s*ндс|net\s*total|total\s*net)",
        r"|(?P<vat>сумма\s*ндс|итого\s*ндс|в\s*т\.?\s*ч\.?\s*ндс|ндс|vat\s*amount|total\s*vat|vat)",
        r"|(?P<amount>итого\s*к\s*оплате|к\s*оплате|сумма\s*документа|общая\s*сумма|итого|всего|итог|amount\s*due|grand\s*total|total)",
        r")"
    ))
    .unwrap();

    /// Labels that outrank every other total label.
    pub static ref PRIORITY_TOTAL_LABEL: Regex = Regex::new(
        r"(?i)^(?:всего\s*к\s*оплате|итого\s*с\s*ндс|всего\s*стоимость\s*реализации)"
    )
    .unwrap();

    /// Number-shaped token: grouped thousands (`1 234 567,89`, `1,234.56`)
    /// or a plain number (`150000.00`).
    pub static ref AMOUNT_TOKEN: Regex = Regex::new(
        r"-?[0-9]{1,3}(?:[ '.,][0-9]{3})+(?:[.,][0-9]{1,2})?|-?[0-9]+(?:[.,][0-9]+)?"
    )
    .unwrap();

    /// Plain amount, e.g. `150000.00`.
    pub static ref PLAIN_AMOUNT: Regex = Regex::new(r"-?[0-9]+(?:[.,][0-9]+)?").unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_label_prefers_specific_category() {
        let caps = TOTAL_LABEL.captures("Итого с НДС: 1 000").unwrap();
        assert!(caps.name("gross").is_some());

        let caps = TOTAL_LABEL.captures("Итого без НДС: 1 000").unwrap();
        assert!(caps.name("net").is_some());

        let caps = TOTAL_LABEL.captures("Итого: 1 000").unwrap();
        assert!(caps.name("amount").is_some());
    }

    #[test]
    fn test_tax_id_labels() {
        assert!(SUPPLIER_TAX_ID_LABEL.is_match("ИИН/БИН поставщика: 220629802621"));
        assert!(SUPPLIER_TAX_ID_LABEL.is_match("Поставщик: ТОО «Ромашка», БИН 220629802621"));
        assert!(BUYER_TAX_ID_LABEL.is_match("БИН получателя 123456789013"));
        assert!(!BUYER_TAX_ID_LABEL.is_match("БИН поставщика 220629802621"));
    }

    #[test]
    fn test_date_patterns() {
        assert!(DATE_YMD.is_match("2025-09-23"));
        assert!(DATE_DMY.is_match("23.09.2025"));
        assert!(DATE_DMY.is_match("23/09/2025"));
        let caps = DATE_LONG.captures("от «23» сентября 2025 г.").unwrap();
        assert_eq!(&caps[1], "23");
        assert_eq!(&caps[2], "сентября");
    }
}
