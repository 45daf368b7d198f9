//! Natural-language instructions for the three generative-text calls.
//!
//! The JSON contract lives in `schema`; the extraction prompt embeds its shape
//! example instead of restating field names.

use super::schema::ExtractionSchema;
use crate::llm::ToolSpec;

/// Words appended to the topic to steer the search toward reference material
pub const SEARCH_DOMAIN_HINTS: &str = "artigos pesquisa estudos informações";

/// Name of the forced search tool
pub const SEARCH_TOOL_NAME: &str = "web_search";

/// Argument carrying the refined search term
pub const SEARCH_TERM_ARG: &str = "search_term";

pub const DELEGATE_SYSTEM_PROMPT: &str = "Você é um assistente que encontra conteúdo relevante na web \
sobre qualquer assunto. Use a ferramenta de busca para localizar artigos, vídeos, tutoriais, \
documentação e outros recursos úteis. Priorize fontes confiáveis e com informações de qualidade.";

pub const RESULTS_SYSTEM_PROMPT: &str = "Você é um assistente de pesquisa. Para a consulta recebida, \
liste resultados reais com título, autor ou fonte, site de origem e URL completa. \
Nunca invente URLs, não use exemplos genéricos (example.com) e não use URLs de placeholder. \
Se não souber o endereço exato de um conteúdo, omita o resultado.";

/// Forced-tool definition for the search stage
pub fn search_tool() -> ToolSpec {
    ToolSpec {
        name: SEARCH_TOOL_NAME.to_string(),
        description: "Realiza uma busca na web por conteúdo relevante sobre o assunto".to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                SEARCH_TERM_ARG: {
                    "type": "string",
                    "description": "Termo de busca refinado para encontrar conteúdo relevante"
                }
            },
            "required": [SEARCH_TERM_ARG]
        }),
    }
}

pub fn delegate_user_prompt(topic: &str, augmented_query: &str) -> String {
    format!(
        "Encontre conteúdo relevante sobre '{}'. Consulta sugerida: {}",
        topic, augmented_query
    )
}

pub fn results_user_prompt(search_term: &str) -> String {
    format!(
        "Forneça resultados de pesquisa para '{}'. Inclua apenas conteúdos cujo endereço você conheça com certeza.",
        search_term
    )
}

pub fn extraction_system_prompt(schema: &ExtractionSchema) -> String {
    format!(
        "Você é um especialista em organizar informações sobre conteúdos encontrados na web.\n\
         Extraia as fontes presentes nos resultados de pesquisa e responda somente com um objeto JSON \
         neste formato:\n{}\n\n\
         Regras:\n\
         - Inclua apenas fontes com URL real, completa e direta (http:// ou https://)\n\
         - Não invente URLs nem use URLs genéricas ou de placeholder\n\
         - Se não conseguir extrair um link válido, omita o resultado\n\
         - Use null para o ano quando ele não for conhecido\n\
         - Liste no máximo {} fontes, priorizando as mais relevantes",
        schema.shape_example(),
        schema.max_items
    )
}

pub fn extraction_user_prompt(topic: &str, raw_results: &str) -> String {
    format!(
        "Analise os resultados de pesquisa sobre '{}' e extraia as fontes.\n\nResultados:\n{}",
        topic, raw_results
    )
}
