use handlebars::Handlebars;
use lousa_domain::FileType;
use serde::Serialize;

/// Placeholder values available to every template.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateParams {
    pub prompt: String,
    pub context: String,
    pub project_name: String,
    pub subject: String,
    pub base_content: String,
}

const STUDY_GUIDE: &str = "\
Você é um professor experiente preparando material para a disciplina {{subject}} \
do projeto {{projectName}}.

Crie um guia de estudos completo em Markdown sobre: {{prompt}}

{{#if context}}Baseie-se no conteúdo dos documentos do projeto:
{{context}}

{{/if}}\
Estruture o guia com títulos (#, ##), listas e destaques em **negrito** para os \
conceitos centrais. Inclua objetivos de aprendizagem, os conceitos principais com \
explicações, exemplos práticos e uma seção final de revisão.";

const QUIZ: &str = "\
Você é um professor experiente elaborando uma avaliação para a disciplina \
{{subject}} do projeto {{projectName}}.

Crie um questionário de múltipla escolha em Markdown sobre: {{prompt}}

{{#if context}}Baseie as questões no conteúdo dos documentos do projeto:
{{context}}

{{/if}}\
A saída DEVE seguir exatamente esta estrutura:

## Instruções
(uma ou duas linhas de instruções para os alunos)

## Questões
### Questão 1
(enunciado)
A. (alternativa)
B. (alternativa)
C. (alternativa)
D. (alternativa)

(repita o formato para no mínimo 10 questões)

## Gabarito
1. (letra correta)
2. (letra correta)
(uma linha por questão)";

const SUMMARY: &str = "\
Você é um professor experiente da disciplina {{subject}} do projeto {{projectName}}.

Escreva um resumo didático em Markdown sobre: {{prompt}}

{{#if context}}Use o conteúdo dos documentos do projeto como fonte:
{{context}}

{{/if}}\
Organize o resumo com títulos e parágrafos curtos, destacando em **negrito** os \
termos essenciais.";

const LESSON_PLAN: &str = "\
Você é um professor experiente planejando uma aula da disciplina {{subject}} do \
projeto {{projectName}}.

Crie um plano de aula em Markdown sobre: {{prompt}}

{{#if context}}Considere o conteúdo dos documentos do projeto:
{{context}}

{{/if}}\
O plano deve conter objetivos, duração sugerida, materiais, desenvolvimento passo \
a passo e avaliação.";

const CUSTOM: &str = "\
Você é um assistente educacional do projeto {{projectName}} ({{subject}}).

Atenda ao pedido a seguir produzindo Markdown bem estruturado: {{prompt}}

{{#if context}}Conteúdo dos documentos do projeto para referência:
{{context}}
{{/if}}";

const EDIT: &str = "\
Você é um assistente educacional do projeto {{projectName}} ({{subject}}).

Revise o documento abaixo aplicando esta alteração: {{prompt}}

Documento atual:
{{baseContent}}

{{#if context}}Conteúdo dos documentos do projeto para referência:
{{context}}

{{/if}}\
Produza a nova versão completa do documento em Markdown, preservando a estrutura \
original onde a alteração não se aplica.";

/// Registry of the file-generation prompt templates (Portuguese, one per file
/// type plus the edit variant).
pub struct PromptTemplates {
    registry: Handlebars<'static>,
}

impl PromptTemplates {
    pub fn new() -> anyhow::Result<Self> {
        let mut registry = Handlebars::new();
        registry.register_template_string("study-guide", STUDY_GUIDE)?;
        registry.register_template_string("quiz", QUIZ)?;
        registry.register_template_string("summary", SUMMARY)?;
        registry.register_template_string("lesson-plan", LESSON_PLAN)?;
        registry.register_template_string("custom", CUSTOM)?;
        registry.register_template_string("edit", EDIT)?;
        Ok(Self { registry })
    }

    /// Fresh-generation prompt for the given file type.
    pub fn render(&self, file_type: FileType, params: &TemplateParams) -> anyhow::Result<String> {
        Ok(self.registry.render(file_type.as_str(), params)?)
    }

    /// Edit prompt used when the base version's content is available.
    pub fn render_edit(&self, params: &TemplateParams) -> anyhow::Result<String> {
        Ok(self.registry.render("edit", params)?)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn params() -> TemplateParams {
        TemplateParams {
            prompt: "fotossíntese".to_string(),
            context: String::new(),
            project_name: "Biologia 101".to_string(),
            subject: "Biologia".to_string(),
            base_content: String::new(),
        }
    }

    #[test]
    fn quiz_template_mandates_the_parser_shape() {
        let templates = PromptTemplates::new().unwrap();

        let actual = templates.render(FileType::Quiz, &params()).unwrap();
        assert!(actual.contains("## Instruções"));
        assert!(actual.contains("### Questão 1"));
        assert!(actual.contains("## Gabarito"));
        assert!(actual.contains("fotossíntese"));
    }

    #[test]
    fn context_block_is_omitted_when_empty() {
        let templates = PromptTemplates::new().unwrap();

        let actual = templates.render(FileType::Summary, &params()).unwrap();
        assert_eq!(actual.contains("documentos do projeto como fonte"), false);
    }

    #[test]
    fn context_block_is_included_when_present() {
        let templates = PromptTemplates::new().unwrap();
        let mut fixture = params();
        fixture.context = "trecho recuperado".to_string();

        let actual = templates.render(FileType::Summary, &fixture).unwrap();
        assert!(actual.contains("trecho recuperado"));
    }

    #[test]
    fn edit_template_embeds_the_base_document() {
        let templates = PromptTemplates::new().unwrap();
        let mut fixture = params();
        fixture.base_content = "# Versão antiga".to_string();

        let actual = templates.render_edit(&fixture).unwrap();
        assert!(actual.contains("# Versão antiga"));
    }
}
