//! Classification prompt construction

use crate::{constants::prompt::RESPONSE_SEPARATOR, taxonomy::Taxonomy};
use serde::{Deserialize, Serialize};

/// JSON layout the model is asked to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    /// One classification object per response, in input order
    #[default]
    Flat,
    /// `{response, classification}` pairs, which survive partial recovery
    Paired,
}

impl ResponseShape {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "flat" => Some(Self::Flat),
            "paired" => Some(Self::Paired),
            _ => None,
        }
    }
}

/// System and user prompt for one batch
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationPrompt {
    pub system: String,
    pub user: String,
}

/// Builds prompts embedding the taxonomy and the batch
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system: String,
    shape: ResponseShape,
}

impl PromptBuilder {
    pub fn new(taxonomy: &Taxonomy, shape: ResponseShape) -> Self {
        let system = format!(
            "You classify student experience survey responses.\n\
             For each response decide which category it fits best, the most appropriate \
             subcategory, and the most appropriate type.\n\
             You must use a category, subcategory and type from the reference below only; \
             choose what fits the case the most.\n\
             The output must be in Arabic and must be valid JSON only, with no markdown \
             and no commentary.\n\
             The keys are: category, subcategory, type, explanation.\n\n\
             {}",
            taxonomy.render_reference()
        );
        Self { system, shape }
    }

    pub fn shape(&self) -> ResponseShape {
        self.shape
    }

    pub fn system_prompt(&self) -> &str {
        &self.system
    }

    /// Prompt for one batch of responses
    pub fn build(&self, batch: &[String]) -> ClassificationPrompt {
        let batch_text = batch
            .iter()
            .enumerate()
            .map(|(i, r)| format!("Response {}: {}", i + 1, r.trim()))
            .collect::<Vec<_>>()
            .join(RESPONSE_SEPARATOR);

        let example = match self.shape {
            ResponseShape::Flat => {
                "Return a JSON array with exactly one object per response, in the same order. \
                 Example format:\n\
                 [\n  {\n    \"category\": \"example_category\",\n    \
                 \"subcategory\": \"example_subcategory\",\n    \
                 \"type\": \"example_type\",\n    \
                 \"explanation\": \"example_explanation\"\n  }\n]"
            }
            ResponseShape::Paired => {
                "Return a JSON array with exactly one object per response. Each object holds \
                 the original response text and its classification. Example format:\n\
                 [\n  {\n    \"response\": \"original response text\",\n    \
                 \"classification\": {\n      \"category\": \"example_category\",\n      \
                 \"subcategory\": \"example_subcategory\",\n      \
                 \"type\": \"example_type\",\n      \
                 \"explanation\": \"example_explanation\"\n    }\n  }\n]"
            }
        };

        let user = format!(
            "Please classify these {} responses. For each response, determine:\n\
             1. Category (التصنيف)\n\
             2. Subcategory (التصنيف_فرعي)\n\
             3. Type (نوع), one of the allowed types\n\
             4. Explanation (تفسير)\n\n\
             {example}\n\n\
             Here are the responses to classify:\n\n\
             {batch_text}",
            batch.len()
        );

        ClassificationPrompt {
            system: self.system.clone(),
            user,
        }
    }
}
