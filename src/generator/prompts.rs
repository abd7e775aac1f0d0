//! Prompt templates for dataset generation.
//!
//! Every format shares one template; only the record-shape instruction
//! differs. Templates are rendered with tera so the document text is
//! inserted verbatim (autoescape off).

use tera::{Context, Tera};

use super::DatasetFormat;
use crate::error::GenerationError;

const GENERATION_TEMPLATE: &str = r#"Generate {{ count }} unique and diverse synthetic {{ format }} examples based on the following content.
Each example should be distinct and cover different aspects of the content. Avoid repeating similar questions or topics.

Content:
{{ content }}

Important guidelines:
1. Each example must be unique and different from others
2. Cover a wide range of topics and aspects from the content
3. Vary the complexity and depth of the examples
4. Ensure every example is accurate and grounded in the provided content
5. Format the output as a JSON array of objects
6. Do not include any markdown formatting or code block markers
7. Return only the JSON array, no additional text

{{ shape }}"#;

/// The record-shape instruction appended for `format`.
pub fn shape_instruction(format: DatasetFormat) -> &'static str {
    match format {
        DatasetFormat::Qa => {
            "Format as a JSON array of question-answer pairs with 'question' and 'answer' fields."
        }
        DatasetFormat::Instruction => {
            "Format as a JSON array of instruction-response pairs with 'instruction' and 'response' fields."
        }
        DatasetFormat::Conversation => {
            "Format as a JSON array of conversations with a 'messages' field containing an array of message objects with 'role' and 'content'."
        }
        DatasetFormat::Classification => {
            "Format as a JSON array of classification examples with 'text' and 'label' fields."
        }
        DatasetFormat::Text => "Format as a JSON array of objects with a 'text' field.",
    }
}

/// Renders the prompt asking for `count` examples of `format` grounded in `content`.
pub fn render_generation_prompt(
    format: DatasetFormat,
    count: usize,
    content: &str,
) -> Result<String, GenerationError> {
    let mut context = Context::new();
    context.insert("count", &count);
    context.insert("format", format.as_str());
    context.insert("content", content);
    context.insert("shape", shape_instruction(format));
    Ok(Tera::one_off(GENERATION_TEMPLATE, &context, false)?)
}
