//! Card generation from an analyzed repository
//!
//! Files are grouped by feature directory: the first path component, or
//! `src/<component>` for files under `src/`. Each group becomes a snippet
//! card with one code screen per file. A README produces a leading overview
//! card.

use std::collections::BTreeMap;

use super::archive::SourceFile;
use super::github_client::GithubRepo;
use super::repo_analyzer::{is_readme, language_for_extension, RepoAnalysis};
use crate::models::card_feature::{
    CardType, ContentBlock, CreateCardFeatureRequest, Screen, Visibility, MAX_BLOCK_CHARS,
    MAX_DESCRIPTION_CHARS, MAX_TECH_CHARS, MAX_TITLE_CHARS,
};

/// Group for files directly in the repository root
pub const ROOT_GROUP: &str = "(root)";

/// Tag added to every imported card
pub const IMPORT_TAG: &str = "imported";

/// Generation limits
#[derive(Debug, Clone, Copy)]
pub struct GenerateLimits {
    pub max_cards: usize,
    pub max_screens_per_card: usize,
}

/// Card produced by the generator, before optional AI rewording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardDraft {
    /// Feature directory, or `None` for the overview card
    pub group: Option<String>,
    pub title: String,
    pub description: String,
    pub tech: String,
    pub language: String,
    pub card_type: CardType,
    pub screens: Vec<Screen>,
    pub tags: Vec<String>,
}

impl CardDraft {
    /// Source text handed to the LLM when rewording this card
    pub fn source_excerpt(&self, max_chars: usize) -> String {
        let mut out = String::new();
        for screen in &self.screens {
            for block in &screen.blocks {
                if out.chars().count() >= max_chars {
                    return truncate_chars(&out, max_chars);
                }
                out.push_str("### ");
                out.push_str(&screen.name);
                out.push('\n');
                out.push_str(&block.content);
                out.push_str("\n\n");
            }
        }
        truncate_chars(&out, max_chars)
    }

    /// Private, pre-approved card request for storage
    pub fn into_request(self) -> CreateCardFeatureRequest {
        CreateCardFeatureRequest {
            title: truncate_chars(self.title.trim(), MAX_TITLE_CHARS),
            tech: truncate_chars(self.tech.trim(), MAX_TECH_CHARS),
            language: Some(self.language),
            description: Some(truncate_chars(self.description.trim(), MAX_DESCRIPTION_CHARS)),
            card_type: Some(self.card_type),
            visibility: Some(Visibility::Private),
            screens: self.screens,
            tags: Some(self.tags),
        }
    }
}

/// Feature directory a file belongs to
pub fn group_key(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();
    match parts.as_slice() {
        [_file] => ROOT_GROUP.to_string(),
        ["src", _file] => "src".to_string(),
        ["src", component, _, ..] => format!("src/{}", component),
        [first, ..] => (*first).to_string(),
        [] => ROOT_GROUP.to_string(),
    }
}

/// Build card drafts for `files`
pub fn generate_cards(
    repo: &GithubRepo,
    analysis: &RepoAnalysis,
    files: &[SourceFile],
    limits: GenerateLimits,
) -> Vec<CardDraft> {
    let mut drafts = Vec::new();
    let base_tags = base_tags(analysis);

    if let Some(readme) = analysis
        .readme_path
        .as_deref()
        .and_then(|p| files.iter().find(|f| f.path == p))
    {
        drafts.push(overview_card(repo, analysis, readme, &base_tags));
    }

    let mut groups: BTreeMap<String, Vec<&SourceFile>> = BTreeMap::new();
    for file in files.iter().filter(|f| !is_readme(&f.path)) {
        groups.entry(group_key(&file.path)).or_default().push(file);
    }

    // Largest groups first; BTreeMap order breaks ties by name
    let mut groups: Vec<(String, Vec<&SourceFile>)> = groups.into_iter().collect();
    groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    groups.truncate(limits.max_cards);

    for (group, group_files) in groups {
        drafts.push(group_card(
            repo,
            analysis,
            &group,
            &group_files,
            limits.max_screens_per_card,
            &base_tags,
        ));
    }

    drafts
}

fn base_tags(analysis: &RepoAnalysis) -> Vec<String> {
    let mut tags = vec![IMPORT_TAG.to_string()];
    let tech = analysis.tech.to_lowercase();
    if !tech.is_empty() && tech != "unknown" {
        tags.push(tech);
    }
    if !analysis.language.is_empty() && !tags.contains(&analysis.language) {
        tags.push(analysis.language.clone());
    }
    tags
}

fn overview_card(
    repo: &GithubRepo,
    analysis: &RepoAnalysis,
    readme: &SourceFile,
    tags: &[String],
) -> CardDraft {
    let summary = readme_summary(&readme.content)
        .unwrap_or_else(|| format!("Overview of {}", repo.full_name()));

    CardDraft {
        group: None,
        title: format!("{} overview", repo.repo),
        description: format!("{}\n\nImported from {}", summary, repo.html_url()),
        tech: analysis.tech.clone(),
        language: analysis.language.clone(),
        card_type: CardType::Tutorial,
        screens: vec![Screen {
            name: readme.path.clone(),
            description: String::new(),
            blocks: vec![ContentBlock::text(truncate_chars(&readme.content, MAX_BLOCK_CHARS))],
        }],
        tags: tags.to_vec(),
    }
}

fn group_card(
    repo: &GithubRepo,
    analysis: &RepoAnalysis,
    group: &str,
    files: &[&SourceFile],
    max_screens: usize,
    tags: &[String],
) -> CardDraft {
    let screens: Vec<Screen> = files
        .iter()
        .take(max_screens.max(1))
        .map(|file| {
            let language = file
                .extension()
                .as_deref()
                .and_then(language_for_extension)
                .map(str::to_string);
            Screen {
                name: file.file_name().to_string(),
                description: String::new(),
                blocks: vec![ContentBlock::code(
                    truncate_chars(&file.content, MAX_BLOCK_CHARS),
                    language,
                    Some(file.path.clone()),
                )],
            }
        })
        .collect();

    let omitted = files.len().saturating_sub(screens.len());
    let mut description = format!(
        "{} file{} from `{}` in {}.",
        files.len(),
        if files.len() == 1 { "" } else { "s" },
        group,
        repo.full_name()
    );
    if omitted > 0 {
        description.push_str(&format!(" {} not shown.", omitted));
    }

    CardDraft {
        group: Some(group.to_string()),
        title: format!("{}: {}", repo.repo, humanize(group)),
        description,
        tech: analysis.tech.clone(),
        language: group_language(files).unwrap_or_else(|| analysis.language.clone()),
        card_type: CardType::Snippet,
        screens,
        tags: tags.to_vec(),
    }
}

/// Most common language in a group
fn group_language(files: &[&SourceFile]) -> Option<String> {
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for file in files {
        if let Some(language) = file.extension().as_deref().and_then(language_for_extension) {
            *counts.entry(language).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(language, _)| language.to_string())
}

/// `src/user-profile` → `User profile`
fn humanize(group: &str) -> String {
    if group == ROOT_GROUP {
        return "Project files".to_string();
    }
    let last = group.rsplit('/').next().unwrap_or(group);
    let words = last.replace(['-', '_'], " ");
    let mut chars = words.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => group.to_string(),
    }
}

/// First prose paragraph of a README (headings, badges and code skipped)
fn readme_summary(content: &str) -> Option<String> {
    let mut in_code = false;
    let mut paragraph: Vec<&str> = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            in_code = !in_code;
            continue;
        }
        if in_code {
            continue;
        }
        let is_prose = !trimmed.is_empty()
            && !trimmed.starts_with('#')
            && !trimmed.starts_with('!')
            && !trimmed.starts_with('[')
            && !trimmed.starts_with('<')
            && !trimmed.starts_with('|');
        if is_prose {
            paragraph.push(trimmed);
        } else if !paragraph.is_empty() {
            break;
        }
    }

    let summary = paragraph.join(" ");
    (!summary.is_empty()).then(|| truncate_chars(&summary, 500))
}

/// First `max` characters of `s`
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
