//! Repository analysis: technology and dominant language detection

use std::collections::BTreeMap;

use super::archive::SourceFile;

/// Analysis outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoAnalysis {
    /// Primary technology, e.g. `Next.js`, `Rust`
    pub tech: String,
    /// Dominant programming language by file count, e.g. `typescript`
    pub language: String,
    /// Path of the root README, if any
    pub readme_path: Option<String>,
    /// Source file count per language
    pub language_counts: BTreeMap<String, usize>,
}

/// Language for a file extension (lowercase, without the dot)
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    let language = match ext {
        "rs" => "rust",
        "ts" | "tsx" | "mts" | "cts" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "py" => "python",
        "go" => "go",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "rb" => "ruby",
        "php" => "php",
        "cs" => "csharp",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" => "cpp",
        "c" | "h" => "c",
        "swift" => "swift",
        "dart" => "dart",
        "scala" => "scala",
        "vue" => "vue",
        "svelte" => "svelte",
        "html" | "htm" => "html",
        "css" => "css",
        "scss" | "sass" => "scss",
        "sql" => "sql",
        "sh" | "bash" | "zsh" => "bash",
        "yml" | "yaml" => "yaml",
        "json" => "json",
        "toml" => "toml",
        "xml" => "xml",
        "md" | "mdx" => "markdown",
        _ => return None,
    };
    Some(language)
}

/// Languages that describe configuration or prose rather than code
fn is_auxiliary_language(language: &str) -> bool {
    matches!(
        language,
        "yaml" | "json" | "toml" | "xml" | "markdown" | "html" | "css" | "scss"
    )
}

/// Analyze extracted files
pub fn analyze(files: &[SourceFile]) -> RepoAnalysis {
    let mut language_counts: BTreeMap<String, usize> = BTreeMap::new();
    for file in files {
        if let Some(language) = file.extension().as_deref().and_then(language_for_extension) {
            *language_counts.entry(language.to_string()).or_default() += 1;
        }
    }

    let language = dominant_language(&language_counts).unwrap_or_default();
    let tech = detect_tech(files).unwrap_or_else(|| tech_for_language(&language));

    let readme_path = files
        .iter()
        .filter(|f| is_readme(&f.path))
        .min_by_key(|f| f.path.matches('/').count())
        .map(|f| f.path.clone());

    RepoAnalysis {
        tech,
        language,
        readme_path,
        language_counts,
    }
}

/// README at any depth (`README`, `README.md`, `readme.rst`, ...)
pub fn is_readme(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase();
    name == "readme" || name.starts_with("readme.")
}

fn dominant_language(counts: &BTreeMap<String, usize>) -> Option<String> {
    let pick = |code_only: bool| {
        counts
            .iter()
            .filter(|(lang, _)| !code_only || !is_auxiliary_language(lang))
            // Highest count wins; ties go to the alphabetically first
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(lang, _)| lang.clone())
    };
    pick(true).or_else(|| pick(false))
}

/// Technology from manifest files, shallowest manifest first
fn detect_tech(files: &[SourceFile]) -> Option<String> {
    let mut manifests: Vec<&SourceFile> = files.iter().filter(|f| is_manifest(f.file_name())).collect();
    manifests.sort_by_key(|f| (f.path.matches('/').count(), f.path.clone()));

    manifests.into_iter().find_map(tech_from_manifest)
}

fn is_manifest(name: &str) -> bool {
    matches!(
        name,
        "package.json"
            | "Cargo.toml"
            | "go.mod"
            | "requirements.txt"
            | "pyproject.toml"
            | "pom.xml"
            | "build.gradle"
            | "Gemfile"
            | "composer.json"
    )
}

fn tech_from_manifest(file: &SourceFile) -> Option<String> {
    let tech = match file.file_name() {
        "package.json" => return Some(tech_from_package_json(&file.content)),
        "Cargo.toml" => "Rust",
        "go.mod" => "Go",
        "requirements.txt" | "pyproject.toml" => "Python",
        "pom.xml" | "build.gradle" => "Java",
        "Gemfile" => "Ruby",
        "composer.json" => "PHP",
        _ => return None,
    };
    Some(tech.to_string())
}

fn tech_from_package_json(content: &str) -> String {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(content) else {
        return "Node.js".to_string();
    };

    let has_dep = |name: &str| {
        ["dependencies", "devDependencies", "peerDependencies"]
            .iter()
            .any(|section| json.get(section).and_then(|d| d.get(name)).is_some())
    };

    // Most specific framework first: Next.js projects also depend on react
    let tech = if has_dep("next") {
        "Next.js"
    } else if has_dep("react") {
        "React"
    } else if has_dep("vue") {
        "Vue"
    } else if has_dep("@angular/core") {
        "Angular"
    } else if has_dep("svelte") {
        "Svelte"
    } else if has_dep("express") {
        "Express"
    } else {
        "Node.js"
    };
    tech.to_string()
}

fn tech_for_language(language: &str) -> String {
    let tech = match language {
        "" => "Unknown",
        "rust" => "Rust",
        "typescript" => "TypeScript",
        "javascript" => "JavaScript",
        "python" => "Python",
        "go" => "Go",
        "java" => "Java",
        "kotlin" => "Kotlin",
        "ruby" => "Ruby",
        "php" => "PHP",
        "csharp" => "C#",
        "cpp" => "C++",
        "c" => "C",
        other => return other.to_string(),
    };
    tech.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, content: &str) -> SourceFile {
        SourceFile {
            path: path.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_next_wins_over_react() {
        let files = vec![
            file("package.json", r#"{"dependencies": {"react": "18", "next": "14"}}"#),
            file("app/page.tsx", ""),
            file("app/layout.tsx", ""),
            file("lib/db.ts", ""),
            file("README.md", "# Demo"),
        ];
        let analysis = analyze(&files);
        assert_eq!(analysis.tech, "Next.js");
        assert_eq!(analysis.language, "typescript");
        assert_eq!(analysis.readme_path.as_deref(), Some("README.md"));
    }

    #[test]
    fn test_express_from_dev_and_runtime_deps() {
        let files = vec![file("package.json", r#"{"dependencies": {"express": "4"}}"#), file("index.js", "")];
        assert_eq!(analyze(&files).tech, "Express");

        let files = vec![file("package.json", "not json"), file("index.js", "")];
        assert_eq!(analyze(&files).tech, "Node.js");
    }

    #[test]
    fn test_manifest_detection() {
        for (manifest, tech) in [
            ("Cargo.toml", "Rust"),
            ("go.mod", "Go"),
            ("requirements.txt", "Python"),
            ("pyproject.toml", "Python"),
            ("pom.xml", "Java"),
            ("Gemfile", "Ruby"),
            ("composer.json", "PHP"),
        ] {
            assert_eq!(analyze(&[file(manifest, "")]).tech, tech, "{}", manifest);
        }
    }

    #[test]
    fn test_shallowest_manifest_wins() {
        let files = vec![
            file("tools/web/package.json", r#"{"dependencies": {"vue": "3"}}"#),
            file("Cargo.toml", "[package]"),
            file("src/main.rs", ""),
        ];
        assert_eq!(analyze(&files).tech, "Rust");
    }

    #[test]
    fn test_language_fallback_without_manifest() {
        let files = vec![
            file("main.py", ""),
            file("util.py", ""),
            file("config.yaml", ""),
            file("a.yaml", ""),
            file("b.yaml", ""),
        ];
        let analysis = analyze(&files);
        // Config files never outvote code
        assert_eq!(analysis.language, "python");
        assert_eq!(analysis.tech, "Python");
    }

    #[test]
    fn test_nothing_recognised() {
        let analysis = analyze(&[file("LICENSE", "MIT")]);
        assert_eq!(analysis.language, "");
        assert_eq!(analysis.tech, "Unknown");
    }

    #[test]
    fn test_readme_detection() {
        assert!(is_readme("README.md"));
        assert!(is_readme("docs/readme.rst"));
        assert!(!is_readme("src/readme_parser.rs"));
    }
}
