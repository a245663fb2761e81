//! Prompt text and response schemas for the Gemini backend.

use serde_json::{json, Value};

use lexiflow_core::model::{CefrLevel, Word};
use lexiflow_core::traits::VocabularyRequest;

/// Terms requested per pool column.
pub(crate) const BATCH_SIZE: usize = 10;

/// Topic used when topic suggestion yields nothing.
pub(crate) const FALLBACK_TOPIC: &str = "General Knowledge";

const GRAMMAR_KEYWORDS: [&str; 4] = ["grammar", "structure", "connector", "preposition"];

/// What the fifth pool column asks for, depending on the topic.
pub(crate) fn fifth_column_label(topic: &str) -> &'static str {
    let topic = topic.to_lowercase();
    if GRAMMAR_KEYWORDS.iter().any(|k| topic.contains(k)) {
        "Function Words (Conjunctions, Prepositions, etc.)"
    } else {
        "Idioms & Fixed Expressions"
    }
}

pub(crate) fn topic_prompt(level: CefrLevel) -> String {
    format!(
        "Suggest ONE specific, interesting topic for English vocabulary learning at CEFR Level \
         {level}. (e.g., \"Space Travel\", \"Digital Privacy\", \"Renaissance Art\"). \
         Output JSON: {{ \"topic\": \"string\" }}"
    )
}

pub(crate) fn batch_prompt(level: CefrLevel, topic: &str, label: &str, count: usize) -> String {
    format!(
        r#"Generate a list of EXACTLY {count} distinct English **{label}** suitable for CEFR Level {level}.
Topic: "{topic}".

Rules:
1. Provide ONLY the English term.
2. Ensure all words are valid {label}.
3. Do NOT provide definitions or translations. Just the words."#
    )
}

pub(crate) fn batch_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "items": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": { "term": { "type": "STRING" } },
                    "required": ["term"]
                }
            }
        },
        "required": ["items"]
    })
}

pub(crate) fn vocabulary_prompt(request: &VocabularyRequest) -> String {
    let mut prompt = format!(
        "Generate a list of {} English vocabulary words suitable for CEFR Level {}.",
        request.count, request.level
    );
    match &request.topic {
        Some(topic) => prompt.push_str(&format!(" related to the topic: \"{topic}\".")),
        None => prompt.push_str(" related to a RANDOMLY CHOSEN specific topic."),
    }
    if !request.target_words.is_empty() {
        prompt.push_str(&format!(
            " specifically using these words: {}.",
            request.target_words.join(", ")
        ));
    }
    prompt.push_str(
        r#" Include meaning, IPA pronunciation, part of speech, and 3 distinct example sentences for each word.

IMPORTANT Rules:
1. **Meaning**: Explain the definition using VERY SIMPLE vocabulary (A1-B1 level).
2. **Examples**:
   - Provide exactly 3 sentences.
   - Each sentence should demonstrate a different **collocation** or usage context.
   - **Highlighting**: In each example, wrap the specific collocation phrase containing the target word in **double asterisks**.
   - Example: for 'decision', use "He **made a decision** yesterday."
3. **Translations**: Provide accurate Vietnamese translations for Meaning and all 3 Examples."#,
    );
    prompt
}

fn word_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "term": { "type": "STRING" },
            "partOfSpeech": { "type": "STRING", "description": "e.g. noun, verb, adj" },
            "meaning": {
                "type": "STRING",
                "description": "Clear definition using simple A1-B1 level vocabulary only"
            },
            "pronunciation": { "type": "STRING", "description": "IPA format" },
            "examples": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Exactly 3 example sentences. Each sentence must use the target word in a different common collocation or context. Wrap the collocation phrase in **double asterisks**."
            },
            "termVi": { "type": "STRING", "description": "Vietnamese translation of the term" },
            "meaningVi": { "type": "STRING", "description": "Vietnamese translation of the meaning" },
            "examplesVi": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Vietnamese translations of the 3 example sentences, matching order."
            }
        },
        "required": [
            "term", "partOfSpeech", "meaning", "pronunciation",
            "examples", "termVi", "meaningVi", "examplesVi"
        ]
    })
}

pub(crate) fn vocabulary_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "topic": { "type": "STRING", "description": "The specific topic chosen for this list" },
            "words": { "type": "ARRAY", "items": word_schema() }
        },
        "required": ["topic", "words"]
    })
}

pub(crate) fn test_prompt(level: CefrLevel, words: &[Word]) -> String {
    let context: Vec<Value> = words
        .iter()
        .map(|w| json!({ "term": w.term, "examples": w.examples }))
        .collect();
    let context = Value::Array(context);

    format!(
        r#"Create a vocabulary test.

CONTEXT (What the user has learned):
{context}

CRITICAL RULE: While the target words are Level {level}, ALL instructions, contexts, explanations, and model answers must be in **SIMPLE ENGLISH (A1-B1)**.

Structure the test with the following specific requirements:

1. **Level 1 (Remember)**: Test meaning. (1 question per word)
   - Question/Options: Simple English.
   - 3 options (1 correct).
   - **STRICT RULE**: All 3 options MUST have **EXACTLY THE SAME WORD COUNT**.

2. **Level 2 (Understand)**: Contextual Usage. (1 question per word)
   - Question: "Select the sentence that uses the word '[WORD]' correctly."
   - Options: **EXACTLY 3** full sentences.
   - **Constraint**: Only 1 sentence uses the word correctly in context. The other 2 should use it incorrectly.
   - **STRICT RULE**: All 3 sentence options MUST have **EXACTLY THE SAME WORD COUNT**.

3. **Level 3 (Apply)**: Matching Exercise. (ONE single question object for the whole level)
   - Create ONE question object with `level: "Apply"`.
   - `questionText`: "Match the words to the correct sentences."
   - `matchingPairs`: An array containing one pair for EACH target word.
     - `questionText`: A simple sentence with a gap marked **EXACTLY** as `[[GAP]]`.
     - `correctAnswer`: The exact target word.
     - Do NOT create separate question objects for each word.

4. **Level 4 (Analyse)**: Test collocations. (1 question per word)
   - `questionText`: "Select the sentence that uses the word '[WORD]' correctly."
   - `options`: 3 sentences.
     - **Option A (Correct)**: You MUST use one of the **EXACT** example sentences from the "CONTEXT" JSON provided above for that specific word.
     - **Option B & C (Incorrect)**: Create 2 sentences where the target word is used with an **INCORRECT** collocation or is **INCOMPATIBLE** with the context.
       - Keep the sentence structure similar to the correct option but swap the collocate (e.g. change the verb "make" to "do" if the target is "decision").
     - **STRICT RULE**: All 3 sentences MUST have **similar word counts**.
     - **HIGHLIGHTING**: Wrap the collocation phrase in **double asterisks** in ALL options.
     - `correctOption`: The full sentence string that is correct.

5. **Explanations**:
   - `explanation`: Must be written in VERY SIMPLE English (A1-B1).

6. **Translations (REQUIRED)**:
   - Provide accurate Vietnamese translations for ALL text fields.
   - For Level 4 (Analyse), if the English option uses **bolding**, the Vietnamese translation MUST ALSO use **bolding** for the corresponding phrase.

Output a JSON array of Question objects."#
    )
}

pub(crate) fn question_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "id": { "type": "STRING" },
                "wordTerm": { "type": "STRING" },
                "level": {
                    "type": "STRING",
                    "enum": ["Remember", "Understand", "Apply", "Analyse"]
                },
                "questionText": { "type": "STRING" },
                "questionTextVi": {
                    "type": "STRING",
                    "description": "Vietnamese translation of questionText"
                },
                "options": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "description": "Choices for multiple choice questions"
                },
                "optionsVi": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "description": "Vietnamese translations of options"
                },
                "correctOption": {
                    "type": "STRING",
                    "description": "Correct answer for single select"
                },
                "matchingPairs": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "id": { "type": "STRING" },
                            "questionText": {
                                "type": "STRING",
                                "description": "The sentence with the gap marked as [[GAP]]"
                            },
                            "questionTextVi": {
                                "type": "STRING",
                                "description": "Vietnamese translation of the sentence"
                            },
                            "correctAnswer": {
                                "type": "STRING",
                                "description": "The target word that fits"
                            }
                        },
                        "required": ["id", "questionText", "correctAnswer"]
                    }
                },
                "explanation": { "type": "STRING", "description": "Why the answer is correct" },
                "explanationVi": {
                    "type": "STRING",
                    "description": "Vietnamese translation of explanation"
                }
            },
            "required": ["id", "level", "questionText", "questionTextVi"]
        }
    })
}
