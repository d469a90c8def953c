use lousa_domain::{InlineSpan, PdfBlock};

/// Splits a line on `**…**` markers into plain and bold spans.
pub fn parse_inline(text: &str) -> Vec<InlineSpan> {
    let mut spans = Vec::new();
    for (i, part) in text.split("**").enumerate() {
        if part.is_empty() {
            continue;
        }
        if i % 2 == 0 {
            spans.push(InlineSpan::plain(part));
        } else {
            spans.push(InlineSpan::bold(part));
        }
    }
    if spans.is_empty() {
        spans.push(InlineSpan::plain(""));
    }
    spans
}

fn heading_level(line: &str) -> Option<(u8, &str)> {
    for level in (1..=3u8).rev() {
        let marker = "#".repeat(level as usize);
        if let Some(rest) = line.strip_prefix(&format!("{marker} ")) {
            return Some((level, rest.trim()));
        }
    }
    None
}

fn bullet_item(line: &str) -> Option<&str> {
    line.strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .map(str::trim)
}

fn numbered_item(line: &str) -> Option<&str> {
    let (number, rest) = line.split_once(". ")?;
    if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) {
        Some(rest.trim())
    } else {
        None
    }
}

/// Parses markdown-ish model output into layout blocks: `#`/`##`/`###`
/// headings, bullet and numbered lists, paragraphs, inline bold.
pub fn parse_blocks(markdown: &str) -> Vec<PdfBlock> {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<String> = Vec::new();
    let mut bullets: Vec<Vec<InlineSpan>> = Vec::new();
    let mut numbered: Vec<Vec<InlineSpan>> = Vec::new();

    let flush_paragraph = |paragraph: &mut Vec<String>, blocks: &mut Vec<PdfBlock>| {
        if !paragraph.is_empty() {
            let text = paragraph.join(" ");
            blocks.push(PdfBlock::Paragraph { spans: parse_inline(&text) });
            paragraph.clear();
        }
    };
    let flush_bullets = |bullets: &mut Vec<Vec<InlineSpan>>, blocks: &mut Vec<PdfBlock>| {
        if !bullets.is_empty() {
            blocks.push(PdfBlock::Bullets { items: std::mem::take(bullets) });
        }
    };
    let flush_numbered = |numbered: &mut Vec<Vec<InlineSpan>>, blocks: &mut Vec<PdfBlock>| {
        if !numbered.is_empty() {
            blocks.push(PdfBlock::Numbered { items: std::mem::take(numbered) });
        }
    };

    for raw_line in markdown.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            flush_paragraph(&mut paragraph, &mut blocks);
            flush_bullets(&mut bullets, &mut blocks);
            flush_numbered(&mut numbered, &mut blocks);
        } else if let Some((level, text)) = heading_level(line) {
            flush_paragraph(&mut paragraph, &mut blocks);
            flush_bullets(&mut bullets, &mut blocks);
            flush_numbered(&mut numbered, &mut blocks);
            blocks.push(PdfBlock::Heading { level, text: text.to_string() });
        } else if let Some(item) = bullet_item(line) {
            flush_paragraph(&mut paragraph, &mut blocks);
            flush_numbered(&mut numbered, &mut blocks);
            bullets.push(parse_inline(item));
        } else if let Some(item) = numbered_item(line) {
            flush_paragraph(&mut paragraph, &mut blocks);
            flush_bullets(&mut bullets, &mut blocks);
            numbered.push(parse_inline(item));
        } else {
            flush_bullets(&mut bullets, &mut blocks);
            flush_numbered(&mut numbered, &mut blocks);
            paragraph.push(line.to_string());
        }
    }
    flush_paragraph(&mut paragraph, &mut blocks);
    flush_bullets(&mut bullets, &mut blocks);
    flush_numbered(&mut numbered, &mut blocks);
    blocks
}

/// One parsed quiz question with its lettered options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    pub number: u32,
    pub text: String,
    pub options: Vec<String>,
}

/// The structured sections of a generated quiz.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuizDocument {
    pub instructions: Vec<String>,
    pub questions: Vec<QuizQuestion>,
    pub answer_key: Vec<String>,
}

fn is_section(line: &str, names: &[&str]) -> bool {
    line.strip_prefix("## ")
        .map(|title| {
            let title = title.trim().to_lowercase();
            names.iter().any(|name| title.starts_with(name))
        })
        .unwrap_or(false)
}

fn question_header(line: &str) -> Option<u32> {
    let rest = line.strip_prefix("### ")?;
    let rest = rest
        .trim()
        .strip_prefix("Questão ")
        .or_else(|| rest.trim().strip_prefix("Question "))?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn option_line(line: &str) -> Option<String> {
    let mut chars = line.chars();
    let letter = chars.next()?;
    if !('A'..='E').contains(&letter) {
        return None;
    }
    let rest = chars.as_str();
    let rest = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") "))?;
    Some(format!("{letter}. {}", rest.trim()))
}

/// Recognizes the mandated quiz shape ("## Instruções", "## Questões" with
/// "### Questão N" and lettered options, "## Gabarito"). Returns `None` when
/// the output does not follow it.
pub fn parse_quiz(markdown: &str) -> Option<QuizDocument> {
    #[derive(PartialEq)]
    enum Section {
        Preamble,
        Instructions,
        Questions,
        AnswerKey,
    }

    let mut section = Section::Preamble;
    let mut quiz = QuizDocument::default();

    for raw_line in markdown.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if is_section(line, &["instruções", "instrucoes", "instructions"]) {
            section = Section::Instructions;
        } else if is_section(line, &["questões", "questoes", "questions"]) {
            section = Section::Questions;
        } else if is_section(line, &["gabarito", "answer key"]) {
            section = Section::AnswerKey;
        } else {
            match section {
                Section::Preamble => {}
                Section::Instructions => quiz.instructions.push(line.to_string()),
                Section::Questions => {
                    if let Some(number) = question_header(line) {
                        quiz.questions.push(QuizQuestion {
                            number,
                            text: String::new(),
                            options: Vec::new(),
                        });
                    } else if let Some(question) = quiz.questions.last_mut() {
                        if let Some(option) = option_line(line) {
                            question.options.push(option);
                        } else if question.options.is_empty() {
                            if !question.text.is_empty() {
                                question.text.push(' ');
                            }
                            question.text.push_str(line);
                        }
                    }
                }
                Section::AnswerKey => quiz.answer_key.push(line.to_string()),
            }
        }
    }

    if quiz.questions.is_empty() || quiz.answer_key.is_empty() {
        return None;
    }
    Some(quiz)
}

/// Layout blocks for a parsed quiz, with a page break before the answer key.
pub fn quiz_blocks(quiz: &QuizDocument) -> Vec<PdfBlock> {
    let mut blocks = Vec::new();

    if !quiz.instructions.is_empty() {
        blocks.push(PdfBlock::Heading { level: 2, text: "Instruções".to_string() });
        for line in &quiz.instructions {
            blocks.push(PdfBlock::Paragraph { spans: parse_inline(line) });
        }
    }

    blocks.push(PdfBlock::Heading { level: 2, text: "Questões".to_string() });
    for question in &quiz.questions {
        blocks.push(PdfBlock::Heading {
            level: 3,
            text: format!("Questão {}", question.number),
        });
        blocks.push(PdfBlock::Paragraph { spans: parse_inline(&question.text) });
        blocks.push(PdfBlock::Bullets {
            items: question.options.iter().map(|o| parse_inline(o)).collect(),
        });
    }

    blocks.push(PdfBlock::PageBreak);
    blocks.push(PdfBlock::Heading { level: 2, text: "Gabarito".to_string() });
    for line in &quiz.answer_key {
        blocks.push(PdfBlock::Paragraph { spans: parse_inline(line) });
    }

    blocks
}
