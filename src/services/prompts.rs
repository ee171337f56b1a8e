//! 提示词构建
//!
//! 每个提示词由系统消息和用户消息两部分组成，用户消息用 XML 标签分层：
//! 评审标准 → 规则分析结果 → 题目（或素材片段）。

use serde::Serialize;

use crate::models::assessment::DeterministicResult;
use crate::models::chunk::Chunk;
use crate::models::generation::GenerationSpec;
use crate::models::question::{ParsedQuestion, QuestionOption, StoredQuestion};
use crate::services::completeness::ValidationReport;

pub const SYSTEM_PROMPT_VALIDATION: &str = "Je bent een expert in toetsdidactiek en MC-vraaganalyse \
voor het Nederlandse hoger onderwijs. Je beoordeelt MC-vragen op drie dimensies: \
betrouwbaarheid, technische kwaliteit en validiteit.";

pub const SYSTEM_PROMPT_GENERATION: &str = "Je bent een expert in het maken van multiple-choice toetsvragen \
voor het Nederlands hoger onderwijs.

Je taak is om hoogwaardige MC-vragen te genereren op basis van het aangeleverde bronmateriaal. \
Elke vraag moet:
- Direct gebaseerd zijn op de aangeleverde bronchunks
- Het gevraagde Bloom-niveau hebben
- Technisch correct zijn (duidelijke stam, plausibele afleiders)
- In het Nederlands geschreven zijn

Gebruik de kwaliteitsregels als leidraad voor het maken van goede vragen.";

pub const SYSTEM_PROMPT_REPAIR: &str = "Je bent een expert in toetsdidactiek voor het Nederlands hoger onderwijs. \
Je helpt docenten bij het aanvullen van ontbrekende metadata bij MC-vragen. \
Je analyseert de vraagstam en antwoordopties om te bepalen welk onderwerp of categorie de vraag behandelt, \
welk Bloom-niveau de vraag meet, en welk leerdoel erbij past. \
Geef altijd een korte toelichting in het Nederlands bij je voorstel.";

const CRITERIA_BETROUWBAARHEID: &str = "\
- Discriminatie: onderscheidt de vraag goed voorbereide van minder goed voorbereide studenten? (hoog, gemiddeld, laag, geen)
- Ambiguïteit: is er precies één verdedigbaar correct antwoord? (geen, licht, hoog)
- Score 1-5 met korte toelichting.";

const CRITERIA_TECHNISCH: &str = "\
- Stam: helder, volledig, positief geformuleerd; een ontkenning staat in HOOFDLETTERS of **vet**.
- Afleiders: plausibel, homogeen in lengte en vorm, geen absolute termen zoals 'altijd' of 'nooit'.
- Het correcte antwoord valt niet op door lengte.
- Scores 1-5 voor stam, afleiders en totaal; noem concrete problemen.";

const CRITERIA_VALIDITEIT: &str = "\
- Bepaal het cognitieve niveau volgens Bloom: onthouden, begrijpen, toepassen, analyseren.
- Past de vraag bij het opgegeven leerdoel?
- Score 1-5 met korte toelichting.";

const VALIDATION_SCHEMA: &str = r#"{
  "bet_discriminatie": "hoog|gemiddeld|laag|geen",
  "bet_ambiguiteit": "geen|licht|hoog",
  "bet_score": 1,
  "bet_toelichting": "",
  "tech_kwal_stam_score": 1,
  "tech_kwal_afleiders_score": 1,
  "tech_kwal_score": 1,
  "tech_problemen": [""],
  "tech_toelichting": "",
  "val_cognitief_niveau": "onthouden|begrijpen|toepassen|analyseren",
  "val_score": 1,
  "val_toelichting": "",
  "improvement_suggestions": [{"dimensie": "betrouwbaarheid|technisch|validiteit", "suggestie": ""}]
}"#;

const GENERATION_SCHEMA: &str = r#"{
  "questions": [{
    "stem": "",
    "options": [{"text": "", "position": 0, "is_correct": true}],
    "bloom_level": "onthouden|begrijpen|toepassen|analyseren",
    "chunk_ids": ["0"]
  }]
}"#;

const REPAIR_SCHEMA: &str = r#"{
  "proposals": [{
    "question_index": 0,
    "field": "category|bloom_level|learning_goal",
    "current_value": null,
    "proposed_value": "",
    "explanation": ""
  }],
  "summary": ""
}"#;

/// 发送给模型评审的题目
#[derive(Debug, Clone, Serialize)]
pub struct QuestionPayload {
    pub stam: String,
    pub opties: Vec<OptionPayload>,
    pub leerdoel: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionPayload {
    pub positie: usize,
    pub tekst: String,
    pub is_correct: bool,
}

impl QuestionPayload {
    pub fn new(stem: &str, options: &[QuestionOption], learning_goal: &str) -> Self {
        Self {
            stam: stem.to_string(),
            opties: options
                .iter()
                .map(|o| OptionPayload {
                    positie: o.position,
                    tekst: o.text.clone(),
                    is_correct: o.is_correct,
                })
                .collect(),
            leerdoel: learning_goal.to_string(),
        }
    }
}

impl From<&StoredQuestion> for QuestionPayload {
    fn from(q: &StoredQuestion) -> Self {
        QuestionPayload::new(&q.stem, &q.options, &q.learning_goal)
    }
}

fn reply_instruction(schema: &str) -> String {
    format!(
        "Antwoord uitsluitend met één JSON-object volgens dit schema, zonder extra tekst:\n{}",
        schema
    )
}

/// 构建评审提示词，返回 (system, user)
pub fn build_validation_prompt(
    question: &QuestionPayload,
    deterministic: &DeterministicResult,
) -> (String, String) {
    let deterministic_json = serde_json::to_string_pretty(deterministic).unwrap_or_default();
    let question_json = serde_json::to_string_pretty(question).unwrap_or_default();

    let user = format!(
        "<criteria_betrouwbaarheid>\n{}\n</criteria_betrouwbaarheid>\n\n\
         <criteria_technisch>\n{}\n</criteria_technisch>\n\n\
         <criteria_validiteit>\n{}\n</criteria_validiteit>\n\n\
         <deterministic_results>\n{}\n</deterministic_results>\n\n\
         <question>\n{}\n</question>\n\n{}",
        CRITERIA_BETROUWBAARHEID,
        CRITERIA_TECHNISCH,
        CRITERIA_VALIDITEIT,
        deterministic_json,
        question_json,
        reply_instruction(VALIDATION_SCHEMA)
    );

    (SYSTEM_PROMPT_VALIDATION.to_string(), user)
}

/// 构建出题提示词，片段编号即其在 `chunks` 中的下标
pub fn build_generation_prompt(spec: &GenerationSpec, chunks: &[Chunk]) -> (String, String) {
    let spec_xml = format!(
        "<specification>\n<count>{}</count>\n<bloom_level>{}</bloom_level>\n\
         <learning_goal>{}</learning_goal>\n<num_options>{}</num_options>\n</specification>",
        spec.count, spec.bloom_level, spec.learning_goal, spec.num_options
    );

    let mut source = vec!["<source_material>".to_string()];
    for (i, chunk) in chunks.iter().enumerate() {
        let page_attr = chunk
            .page
            .map(|p| format!(" page=\"{}\"", p))
            .unwrap_or_default();
        source.push(format!("<chunk id=\"{}\"{}>\n{}\n</chunk>", i, page_attr, chunk.text));
    }
    source.push("</source_material>".to_string());

    let user = format!(
        "{}\n\n{}\n\n<quality_rules>\n{}\n\n{}\n\n{}\n</quality_rules>\n\n\
         Genereer exact {} MC-vragen op Bloom-niveau \"{}\" over het leerdoel: \"{}\".\n\n\
         Elke vraag moet {} antwoordopties hebben, waarvan precies 1 correct is.\n\
         Verwijs in chunk_ids naar de chunk id's waarop de vraag is gebaseerd.\n\n{}",
        spec_xml,
        source.join("\n"),
        CRITERIA_TECHNISCH,
        CRITERIA_BETROUWBAARHEID,
        CRITERIA_VALIDITEIT,
        spec.count,
        spec.bloom_level,
        spec.learning_goal,
        spec.num_options,
        reply_instruction(GENERATION_SCHEMA)
    );

    (SYSTEM_PROMPT_GENERATION.to_string(), user)
}

#[derive(Serialize)]
struct RepairItem<'a> {
    question_index: usize,
    question_id: &'a str,
    stem: &'a str,
    options: &'a [QuestionOption],
    current_category: Option<&'a str>,
    current_bloom_level: Option<&'a str>,
    current_learning_goal: Option<&'a str>,
    missing_fields: Vec<&'a str>,
    error_messages: Vec<&'a str>,
}

/// 构建补全提示词，只包含未通过完整性校验的题目
pub fn build_repair_prompt(questions: &[ParsedQuestion], report: &ValidationReport) -> (String, String) {
    let items: Vec<RepairItem> = report
        .invalid()
        .filter_map(|r| {
            let q = questions.get(r.question_index)?;
            Some(RepairItem {
                question_index: r.question_index,
                question_id: &r.question_id,
                stem: &q.stem,
                options: &q.options,
                current_category: q.category.as_deref(),
                current_bloom_level: q.bloom_level.as_ref().map(|b| b.as_str()),
                current_learning_goal: q.learning_goal.as_deref(),
                missing_fields: r.errors.iter().map(|e| e.field.as_str()).collect(),
                error_messages: r.errors.iter().map(|e| e.message.as_str()).collect(),
            })
        })
        .collect();

    let items_json = serde_json::to_string_pretty(&items).unwrap_or_default();
    let user = format!(
        "<instructie>\n\
         Analyseer de onderstaande MC-vragen en genereer voorstellen om de ontbrekende velden aan te vullen. \
         Focus op de velden die als 'missing' zijn gemarkeerd. Gebruik de vraagstam en antwoordopties \
         om het onderwerp, Bloom-niveau en leerdoel af te leiden.\n\n\
         Bloom-niveaus: onthouden, begrijpen, toepassen, analyseren\n\
         </instructie>\n\n\
         <questions_needing_repair>\n{}\n</questions_needing_repair>\n\n{}",
        items_json,
        reply_instruction(REPAIR_SCHEMA)
    );

    (SYSTEM_PROMPT_REPAIR.to_string(), user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;
    use crate::models::question::Question;
    use crate::services::completeness::validate_questions;
    use std::sync::Arc;

    fn options() -> Vec<QuestionOption> {
        vec![
            QuestionOption {
                text: "Mitochondrion".into(),
                position: 0,
                is_correct: true,
            },
            QuestionOption {
                text: "Ribosoom".into(),
                position: 1,
                is_correct: false,
            },
        ]
    }

    #[test]
    fn test_validation_prompt_layers() {
        let payload = QuestionPayload::new("Welk organel maakt ATP?", &options(), "Celbiologie");
        let det = analyze(&Question::new(
            "Welk organel maakt ATP?",
            vec!["Mitochondrion".into(), "Ribosoom".into()],
            0,
        ));
        let (system, user) = build_validation_prompt(&payload, &det);

        assert!(system.contains("betrouwbaarheid"));
        let criteria = user.find("<criteria_betrouwbaarheid>").unwrap();
        let det_pos = user.find("<deterministic_results>").unwrap();
        let question_pos = user.find("<question>").unwrap();
        assert!(criteria < det_pos && det_pos < question_pos);
        assert!(user.contains("\"stam\": \"Welk organel maakt ATP?\""));
        assert!(user.contains("tech_kwant_flags"));
    }

    #[test]
    fn test_generation_prompt_numbers_chunks() {
        let metadata = Arc::new(Default::default());
        let chunks = vec![
            Chunk {
                text: "Eerste passage".into(),
                position: 0,
                page: Some(3),
                metadata: Arc::clone(&metadata),
            },
            Chunk {
                text: "Tweede passage".into(),
                position: 1,
                page: None,
                metadata,
            },
        ];
        let spec = GenerationSpec {
            learning_goal: "Fotosynthese".into(),
            ..Default::default()
        };
        let (_, user) = build_generation_prompt(&spec, &chunks);

        assert!(user.contains("<chunk id=\"0\" page=\"3\">\nEerste passage\n</chunk>"));
        assert!(user.contains("<chunk id=\"1\">\nTweede passage\n</chunk>"));
        assert!(user.contains("Genereer exact 5 MC-vragen op Bloom-niveau \"begrijpen\""));
        assert!(user.contains("4 antwoordopties"));
    }

    #[test]
    fn test_repair_prompt_only_lists_invalid_questions() {
        let valid = ParsedQuestion {
            stem: "Geldig".into(),
            options: options(),
            category: Some("Bio".into()),
            ..Default::default()
        };
        let missing_category = ParsedQuestion {
            stem: "Zonder categorie".into(),
            options: options(),
            ..Default::default()
        };
        let questions = vec![valid, missing_category];
        let report = validate_questions(&questions);
        let (_, user) = build_repair_prompt(&questions, &report);

        assert!(user.contains("Zonder categorie"));
        assert!(!user.contains("\"Geldig\""));
        assert!(user.contains("\"missing_fields\": [\n      \"category\"\n    ]"));
    }
}
