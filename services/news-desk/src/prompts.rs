//! Prompt templates for Gujarati news generation
//!
//! Every generation path builds a `[system, user]` conversation here. Format
//! templates carry exact item counts; the structured system prompt tells the
//! model to honour them.

use std::sync::LazyLock;

use generation::ChatMessage;
use regex::{Captures, Regex};
use serde::Deserialize;

/// Title used when the caller supplies none.
pub const DEFAULT_TITLE: &str = "સમાચાર રિપોર્ટ";

const ARTICLE_SYSTEM_PROMPT: &str = "You are a professional Gujarati broadcast news anchor and editor. Write complete, factual news reports strictly in Gujarati language with a neutral, formal anchor-style tone. Use markdown with headings and short paragraphs. Avoid sensationalism. If facts are missing, clearly state assumptions.";

const REWRITE_SYSTEM_PROMPT: &str = "You are a professional Gujarati broadcast news anchor and editor. Rewrite or edit the provided news article per the user's instructions strictly in Gujarati language, maintaining a neutral, formal anchor-style tone. Use markdown format, preserve key facts; if adding, mark as assumptions.";

const STRUCTURED_SYSTEM_PROMPT: &str = "You are a professional Gujarati broadcast news anchor and editor. Write output strictly in Gujarati with a neutral, formal anchor-style tone. Use markdown. Avoid sensationalism. If facts are missing, clearly state assumptions. CRITICAL: Obey the requested structure EXACTLY. For every section that specifies a count (e.g., Top Band, VO Script, Express lines, Rundown stories), output EXACTLY that many items\u{2014}no more, no less. Do NOT add extra bullets, do NOT omit any. Do NOT leave any numbered item blank; each item must contain a complete, meaningful sentence in Gujarati. Do NOT reorder any pre-listed, numbered, or topic-tagged lines provided in the template.";

const DEFAULT_REWRITE_INSTRUCTIONS: &str = "Revise and improve clarity keeping the same facts.";

/// Sentence written into numbered AV lines the model left empty.
pub const AV_LINE_FILLER: &str = "આજના મુખ્ય મુદ્દા પર એક સંક્ષિપ્ત, સ્પષ્ટ વાક્ય.";

const DEFAULT_TOPICS: &[&str] = &["Accident", "Rain", "Political", "Sports", "Crime"];

const BULLETIN_MINUTES: u32 = 26;
const BULLETIN_BREAKS: u32 = 4;
const BREAK_SECS: u32 = 90;
const BULLETIN_SLOTS: u32 = 30;

/// Seconds per rundown story in a 26-minute bulletin with four breaks.
pub const SECS_PER_STORY: u32 =
    (BULLETIN_MINUTES * 60 - BULLETIN_BREAKS * BREAK_SECS) / BULLETIN_SLOTS;

static BLANK_NUMBERED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mR)^([^\S\r\n]*\d+\)[^\S\r\n]*)$").expect("hardcoded regex")
});

static FIRST_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#[ \t]+(.+)$").expect("hardcoded regex"));

/// Broadcast output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum NewsFormat {
    #[serde(rename = "AV")]
    Av,
    #[serde(rename = "PKG")]
    Pkg,
    #[serde(rename = "AV_GFX")]
    AvGfx,
    #[serde(rename = "EXPRESS")]
    Express,
    #[serde(rename = "BULLETIN_26M")]
    Bulletin26m,
    #[serde(rename = "SPECIAL")]
    Special,
}

/// Optional per-format knobs. Out-of-range counts are clamped, not rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatOptions {
    pub vo_count: Option<i64>,
    pub top_band_count: Option<i64>,
    pub story_count: Option<i64>,
    pub topics: Option<Vec<String>>,
}

/// Descriptive fields shared by every prompt.
#[derive(Debug, Clone, Copy)]
pub struct StoryBrief<'a> {
    pub title: &'a str,
    pub category: Option<&'a str>,
    pub location: Option<&'a str>,
    pub brief: Option<&'a str>,
}

impl StoryBrief<'_> {
    fn category(&self) -> &str {
        self.category.unwrap_or("General")
    }

    fn location(&self) -> &str {
        self.location.unwrap_or("N/A")
    }

    fn brief(&self) -> &str {
        self.brief.unwrap_or("")
    }
}

/// Item counts after defaults and clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatCounts {
    pub top_bands: usize,
    pub vo_sections: usize,
    pub stories: usize,
}

impl FormatCounts {
    pub fn resolve(format: Option<NewsFormat>, options: &FormatOptions) -> Self {
        let special = format == Some(NewsFormat::Special);
        let section_default = if special { 10 } else { 5 };

        let mut counts = Self {
            top_bands: clamp(options.top_band_count, section_default, 1, 10),
            vo_sections: clamp(options.vo_count, section_default, 1, 12),
            stories: clamp(options.story_count, 30, 5, 40),
        };

        // AV has a fixed shape regardless of options.
        if format == Some(NewsFormat::Av) {
            counts.vo_sections = 7;
            counts.top_bands = 5;
        }
        counts
    }
}

fn clamp(value: Option<i64>, default: i64, min: i64, max: i64) -> usize {
    // Bounds are small positive constants, so the cast is lossless.
    value.unwrap_or(default).clamp(min, max) as usize
}

/// Submitted title, trimmed, or the default title.
pub fn safe_title(title: Option<&str>) -> String {
    title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TITLE)
        .to_owned()
}

/// Rundown topic order.
///
/// Explicit topics win. Bulletins without topics use a single "General"
/// group; every other format uses the default cycle.
pub fn resolve_topics(format: Option<NewsFormat>, options: &FormatOptions) -> Vec<String> {
    match &options.topics {
        Some(topics) if !topics.is_empty() => topics.clone(),
        _ if format == Some(NewsFormat::Bulletin26m) => vec!["General".to_owned()],
        _ => DEFAULT_TOPICS.iter().map(|t| (*t).to_owned()).collect(),
    }
}

/// Spread `stories` across `topics` in order; the first `stories % n` topics
/// get one extra.
pub fn distribute_stories(stories: usize, topics: usize) -> Vec<usize> {
    let topics = topics.max(1);
    let base = stories / topics;
    let rem = stories % topics;
    (0..topics).map(|i| base + usize::from(i < rem)).collect()
}

/// Free-form article for `POST /api/news` when no content was supplied.
pub fn article_messages(story: &StoryBrief<'_>) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(ARTICLE_SYSTEM_PROMPT),
        ChatMessage::user(article_prompt(story)),
    ]
}

fn article_prompt(story: &StoryBrief<'_>) -> String {
    format!(
        "Write a complete news report. Output must be in Gujarati only.\n\
         Title: {title}\n\
         Category: {category}\n\
         Location: {location}\n\
         Brief/context: {brief}\n\
         \n\
         Requirements:\n\
         - Use a professional Gujarati news anchor tone: precise, neutral, formal, clear.\n\
         - 6-10 short paragraphs with clear sections and a concise intro.\n\
         - Include key facts, quotes (if not provided, mark as attributed or hypothetical), dates, numbers when relevant.\n\
         - Include a short summary at the end under 'સારાંશ'.\n\
         - Output markdown only and Gujarati only.",
        title = story.title,
        category = story.category(),
        location = story.location(),
        brief = story.brief(),
    )
}

/// Edit of a stored article (`PUT /api/news/{id}` with instructions).
pub fn edit_messages(current: &str, instructions: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(REWRITE_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Current article (markdown):\n\n{current}\n\nInstructions: {instructions}\n\n\
             Return the full updated article in Gujarati only, markdown only."
        )),
    ]
}

/// Rewrite of caller-supplied content for the generate endpoint.
pub fn rewrite_messages(
    story: &StoryBrief<'_>,
    base_content: Option<&str>,
    instructions: Option<&str>,
) -> Vec<ChatMessage> {
    let instructions = instructions
        .filter(|i| !i.trim().is_empty())
        .unwrap_or(DEFAULT_REWRITE_INSTRUCTIONS);
    vec![
        ChatMessage::system(REWRITE_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Title: {title}\nCategory: {category}\nLocation: {location}\nBrief/context: {brief}\n\n\
             Current article (markdown):\n\n{base}\n\nInstructions: {instructions}\n\n\
             Return the full updated article in Gujarati only, markdown only. \
             Include a 'સારાંશ' section at the end.",
            title = story.title,
            category = story.category(),
            location = story.location(),
            brief = story.brief(),
            base = base_content.unwrap_or(""),
        )),
    ]
}

/// Fresh generation in a broadcast format. `None` gives the generic article.
pub fn format_messages(
    story: &StoryBrief<'_>,
    format: Option<NewsFormat>,
    options: &FormatOptions,
) -> Vec<ChatMessage> {
    let user = match format {
        None => article_prompt(story),
        Some(format) => structured_prompt(story, format, options),
    };
    vec![
        ChatMessage::system(STRUCTURED_SYSTEM_PROMPT),
        ChatMessage::user(user),
    ]
}

fn structured_prompt(story: &StoryBrief<'_>, format: NewsFormat, options: &FormatOptions) -> String {
    let counts = FormatCounts::resolve(Some(format), options);
    let title = story.title;
    let header = format!(
        "શીર્ષક: {title}\nવિભાગ: {}\nસ્થળ: {}\nસંદર્ભ: {}",
        story.category(),
        story.location(),
        story.brief(),
    );
    let outline = "આઉટપુટ બંધારણ (Gujarati only, markdown only):";
    let top_bands = counts.top_bands;
    let bands = bullets(top_bands);

    match format {
        NewsFormat::Av => format!(
            "{header}\n\n{outline}\n# {title}\n\n## Anchor Script\n\
             (Write a single 300-word paragraph in Gujarati. Do NOT use any numbered format like 1), 2), 3). \
             Write one continuous flowing paragraph with complete sentences and detailed content.)\n\n\
             ## Top Band ({top_bands})\n{bands}"
        ),
        NewsFormat::Pkg => format!(
            "{header}\n\n{outline}\n# {title}\n\n## Anchor Opening (2 lines)\n{opening}\n\n{vo}\n\n\
             ## Anchor Closing Summary (5 lines)\n{closing}\n\n## Top Band ({top_bands})\n{bands}",
            opening = numbered(2),
            vo = vo_sections(counts.vo_sections, 15),
            closing = numbered(5),
        ),
        NewsFormat::AvGfx => format!(
            "{header}\n\n{outline}\n# {title}\n\n## Story\n\
             (Write a 150-word story in Gujarati. Keep it concise and focused on the key points.)\n\n\
             ## Top Bands ({top_bands})\n{bands}"
        ),
        NewsFormat::Express => format!(
            "{header}\n\n{outline}\n# {title}\n\n## Express Summary (2 lines)\n{lines}",
            lines = numbered(2),
        ),
        NewsFormat::Special => {
            let gfx = (1..=top_bands)
                .map(|i| format!("{i}) A)  B)  C)"))
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "{header}\n\n# {title}\n\n## Anchor Opening (8 lines)\n{opening}\n\n{vo}\n\n\
                 ## Anchor Closing Summary (5 lines)\n{closing}\n\n## Top Band ({top_bands})\n{bands}\n\n\
                 ## Top Band GFX ({top_bands} × 3 variants)\n{gfx}",
                opening = numbered(8),
                vo = vo_sections(counts.vo_sections, 30),
                closing = numbered(5),
            )
        }
        NewsFormat::Bulletin26m => bulletin_prompt(
            title,
            counts.stories,
            &resolve_topics(Some(format), options),
        ),
    }
}

fn bulletin_prompt(title: &str, stories: usize, topics: &[String]) -> String {
    let first = topics.first().map(String::as_str).unwrap_or("General");
    let second = topics.get(1).map(String::as_str).unwrap_or("");

    let mut rundown = String::new();
    let mut index = 1;
    for (topic, count) in topics.iter().zip(distribute_stories(stories, topics.len())) {
        for _ in 0..count {
            rundown.push_str(&format!("\n{index}) [{topic}] –"));
            index += 1;
        }
    }

    let secs = SECS_PER_STORY;
    format!(
        "# {title} – 26 મિનિટ બુલેટિન રૂન્ડાઉન\n\n## Rundown ({stories} stories)\n\
         (નોંધ: ટોપિક પ્રમાણે ગ્રૂપિંગ કરવું: પહેલા તમામ '{first}' પછી '{second}' વગેરે. \
         ક્રમ બદલો નહીં અને કુલ આઇટમ્સ બરાબર {stories} જ હોવા જોઇએ.){rundown}\n\n\
         ## Timing Guide\n\
         - Stories 1–6: ~{secs}s/Story\n- Break 1: ~{BREAK_SECS}s\n\
         - Stories 7–12: ~{secs}s/Story\n- Break 2: ~{BREAK_SECS}s\n\
         - Stories 13–18: ~{secs}s/Story\n- Break 3: ~{BREAK_SECS}s\n\
         - Stories 19–24: ~{secs}s/Story\n- Break 4: ~{BREAK_SECS}s\n\
         - Stories 25–30: ~{secs}s/Story"
    )
}

fn bullets(count: usize) -> String {
    vec!["- "; count].join("\n")
}

fn numbered(count: usize) -> String {
    (1..=count)
        .map(|i| format!("{i})"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn vo_sections(count: usize, lines: usize) -> String {
    (1..=count)
        .map(|i| {
            format!(
                "## VO Script {i} ({lines}-line paragraph)\n(Write a single {lines}-line paragraph in Gujarati)"
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fill numbered lines the model left empty (`"3)"`) with a stock sentence.
pub fn fill_blank_numbered_lines(content: &str) -> String {
    BLANK_NUMBERED_LINE
        .replace_all(content, |caps: &Captures<'_>| {
            format!("{}{AV_LINE_FILLER}", &caps[1])
        })
        .into_owned()
}

/// Apply format-specific cleanup to generated content.
pub fn post_process(format: Option<NewsFormat>, content: String) -> String {
    match format {
        Some(NewsFormat::Av) => fill_blank_numbered_lines(&content),
        _ => content,
    }
}

/// Text of the first top-level markdown heading, if any.
pub fn first_heading(content: &str) -> Option<&str> {
    FIRST_HEADING
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .find(|t| !t.is_empty())
}

/// Title to store: the first heading of the content, else `fallback`.
pub fn derive_title(content: &str, fallback: &str) -> String {
    first_heading(content).unwrap_or(fallback).to_owned()
}
