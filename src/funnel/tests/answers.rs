use super::common::*;
use crate::funnel::answers::{extract_contact, AnswerAggregator, AnswerValue};

#[test]
fn record_is_last_write_wins() {
    let mut answers = AnswerAggregator::new();
    answers.record("q1", AnswerValue::text("primeira"));
    answers.record("q1", AnswerValue::text("segunda"));

    assert_eq!(answers.raw().len(), 1);
    assert_eq!(
        answers.get("q1"),
        Some(&AnswerValue::text("segunda"))
    );
}

#[test]
fn mapped_view_substitutes_question_titles() {
    let definition = two_step_funnel();
    let mut answers = AnswerAggregator::new();
    answers.record("q1", AnswerValue::text("Fui demitido"));
    answers.record("email", AnswerValue::text("ana@example.com"));

    let mapped = answers.mapped_view(&definition);
    assert_eq!(
        mapped.get("Qual sua situação?"),
        Some(&AnswerValue::text("Fui demitido"))
    );
    // Form field names are assumed human-readable and pass through.
    assert_eq!(
        mapped.get("email"),
        Some(&AnswerValue::text("ana@example.com"))
    );
    assert!(!mapped.contains_key("q1"));
}

#[test]
fn mapped_view_collisions_collapse_to_one_entry() {
    let definition = funnel(
        vec![
            question_step("q1", "Como prefere contato?", &["Email"]),
            question_step("q2", "Como prefere contato?", &["Telefone"]),
        ],
        vec![],
    );
    let mut answers = AnswerAggregator::new();
    answers.record("q1", AnswerValue::text("Email"));
    answers.record("q2", AnswerValue::text("Telefone"));

    let mapped = answers.mapped_view(&definition);
    assert_eq!(mapped.len(), 1);
    // Last write during iteration wins; accepted, not defended against.
    assert_eq!(
        mapped.get("Como prefere contato?"),
        Some(&AnswerValue::text("Telefone"))
    );
}

#[test]
fn contact_extraction_handles_portuguese_labels() {
    let mut answers = AnswerAggregator::new();
    answers.record("Nome", AnswerValue::text("Ana"));
    answers.record("Telefone/WhatsApp", AnswerValue::text("+55 11 99999-0000"));
    answers.record("Email", AnswerValue::text("ana@example.com"));

    let contact = extract_contact(answers.raw(), answers.raw());
    assert_eq!(contact.name, "Ana");
    assert_eq!(contact.phone, "+55 11 99999-0000");
    assert_eq!(contact.email, "ana@example.com");
}

#[test]
fn contact_extraction_folds_accents() {
    let mut answers = AnswerAggregator::new();
    answers.record("Seu nomé completo", AnswerValue::text("Bruno"));
    answers.record("E-mail", AnswerValue::text("bruno@example.com"));

    let contact = extract_contact(answers.raw(), answers.raw());
    assert_eq!(contact.name, "Bruno");
    assert_eq!(contact.email, "bruno@example.com");
    assert_eq!(contact.phone, "");
}

#[test]
fn contact_extraction_falls_back_to_mapped_labels() {
    // Raw keys are opaque step ids; only the mapped view carries the
    // human-readable label the heuristic can latch onto.
    let definition = funnel(
        vec![question_step("step-7", "Qual seu telefone?", &[])],
        vec![],
    );
    let mut answers = AnswerAggregator::new();
    answers.record("step-7", AnswerValue::text("+55 31 98888-0000"));

    let mapped = answers.mapped_view(&definition);
    let contact = extract_contact(answers.raw(), &mapped);
    assert_eq!(contact.phone, "+55 31 98888-0000");
}

#[test]
fn contact_extraction_returns_empty_for_no_match() {
    let mut answers = AnswerAggregator::new();
    answers.record("favorite_color", AnswerValue::text("azul"));

    let contact = extract_contact(answers.raw(), answers.raw());
    assert_eq!(contact.name, "");
    assert_eq!(contact.email, "");
    assert_eq!(contact.phone, "");
}

#[test]
fn blank_values_do_not_satisfy_a_variant() {
    let mut answers = AnswerAggregator::new();
    answers.record("email", AnswerValue::text("   "));
    answers.record("e-mail corporativo", AnswerValue::text("dir@firma.adv.br"));

    let contact = extract_contact(answers.raw(), answers.raw());
    assert_eq!(contact.email, "dir@firma.adv.br");
}

#[test]
fn flag_answers_render_as_booleans() {
    let mut answers = AnswerAggregator::new();
    answers.record("aceito_termos", AnswerValue::Flag(true));

    assert_eq!(
        answers.get("aceito_termos").map(|value| value.as_text()),
        Some("true".to_string())
    );
    assert!(!answers.get("aceito_termos").unwrap().is_blank());
}
