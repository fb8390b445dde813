//! User-facing texts per rule code, with the configured checklist overlay.

use crate::models::config::Config;
use crate::models::finding::{Finding, Level};

/// Code of the synthesized "all checks passed" finding.
pub const ALL_PASSED: &str = "SYS001";

struct RuleText {
    title: &'static str,
    description: &'static str,
    recommendation: &'static str,
    ok_title: &'static str,
}

const FALLBACK: RuleText = RuleText {
    title: "Проверка не пройдена",
    description: "",
    recommendation: "",
    ok_title: "Проверка пройдена",
};

fn builtin(code: &str) -> &'static RuleText {
    match code {
        "BIN001" => &RuleText {
            title: "БИН поставщика отсутствует или имеет неверный формат",
            description: "ИИН/БИН поставщика должен состоять из 12 цифр",
            recommendation: "Проверьте ИИН/БИН поставщика в документе",
            ok_title: "БИН поставщика распознан",
        },
        "BIN002" => &RuleText {
            title: "БИН покупателя отсутствует или имеет неверный формат",
            description: "ИИН/БИН покупателя должен состоять из 12 цифр",
            recommendation: "Проверьте ИИН/БИН покупателя в документе",
            ok_title: "БИН покупателя распознан",
        },
        "BIN007" => &RuleText {
            title: "БИНы поставщика и покупателя совпадают",
            description: "Поставщик и покупатель указаны с одинаковым ИИН/БИН",
            recommendation: "Убедитесь, что стороны документа указаны верно",
            ok_title: "БИНы различаются",
        },
        "BIN012" => &RuleText {
            title: "Ошибка контрольной суммы БИН",
            description: "Контрольный разряд ИИН/БИН не совпадает с рассчитанным",
            recommendation: "Сверьте ИИН/БИН с регистрационными данными",
            ok_title: "Контрольная сумма БИН: ОК",
        },
        "D000" => &RuleText {
            title: "Дата выписки отсутствует или не распознана",
            description: "Не удалось определить дату выписки документа",
            recommendation: "Укажите дату в формате ДД.ММ.ГГГГ или ГГГГ-ММ-ДД",
            ok_title: "Дата распознана",
        },
        "D001" => &RuleText {
            title: "Дата ЭСФ не может быть в будущем",
            description: "Дата выписки позже текущей даты",
            recommendation: "Проверьте дату выписки",
            ok_title: "Дата не в будущем",
        },
        "TOT001" => &RuleText {
            title: "Итоговая сумма не совпадает с суммой строк",
            description: "Сумма по строкам отличается от итога документа",
            recommendation: "Пересчитайте строки и итог",
            ok_title: "Сумма строк совпадает с итогом",
        },
        "NEG001" => &RuleText {
            title: "Итоговая сумма отрицательная",
            description: "Итог документа не может быть меньше нуля",
            recommendation: "Проверьте знак итоговой суммы",
            ok_title: "Итоговая сумма неотрицательная",
        },
        "TOT002" => &RuleText {
            title: "Итоговая сумма имеет некорректное значение",
            description: "Итог документа должен быть положительным числом",
            recommendation: "Проверьте итоговую сумму документа",
            ok_title: "Итоговая сумма указана корректно",
        },
        ALL_PASSED => &RuleText {
            title: "Все проверки пройдены",
            description: "",
            recommendation: "",
            ok_title: "Все проверки пройдены",
        },
        _ => &FALLBACK,
    }
}

/// Finding for a failed check, texts taken from the checklist when configured.
pub fn failure(config: &Config, code: &str, level: Level) -> Finding {
    let text = builtin(code);
    let entry = config.checklist_for(code);
    let pick = |overlay: Option<&String>, default: &str| overlay.cloned().unwrap_or_else(|| default.to_string());

    Finding::new(code, level, pick(entry.and_then(|e| e.title.as_ref()), text.title))
        .with_description(pick(entry.and_then(|e| e.description.as_ref()), text.description))
        .with_recommendation(pick(entry.and_then(|e| e.recommendation.as_ref()), text.recommendation))
}

/// Finding for a passed check at the given level (OK or INFO).
pub fn success(config: &Config, code: &str, level: Level) -> Finding {
    let title = config
        .checklist_for(code)
        .and_then(|e| e.ok_title.clone())
        .unwrap_or_else(|| builtin(code).ok_title.to_string());
    Finding::new(code, level, title)
}

/// Finding for a rule that faulted instead of producing a result.
pub fn fault(rule: &str, reason: &str) -> Finding {
    Finding::new(rule, Level::Error, "Внутренняя ошибка правила")
        .with_description(format!("{}: {}", rule, reason))
        .with_recommendation("Сообщите разработчику")
}

/// The single informational finding for a document with nothing to report.
pub fn all_passed(config: &Config) -> Finding {
    success(config, ALL_PASSED, Level::Info)
}
