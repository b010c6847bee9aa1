//! System prompt for the chat agent

use anyhow::Context;

use crate::config::Config;

const DEFAULT_PROMPT: &str = "\
You are a research assistant that helps people find, download and organise \
scientific papers from arXiv.

Tools:
- search_papers_from_arxiv: search arXiv. Use field prefixes such as `ti:` \
(title), `au:` (author) or `abs:` (abstract) when the user names one, and \
restrict `categories` to arXiv archives such as `cs`, `math` or `stat`.
- download_papers: search, then save every hit as a PDF.
- list_papers: show the PDFs already stored locally.
- delete_papers: remove local PDFs whose file names fuzzily match a query.

Ask for at most {max_results} papers unless the user wants a different number. \
Downloaded papers are stored under {output_dir}, one folder per category; use \
that directory unless the user names another one. Dates such as `date_from` \
and `date_to` may be written as `2024-01-31` or `January 2024`.

Downloading and deleting change the user's files and need their approval. If \
a tool result says the call was skipped, tell the user and do not retry it.

Answer concisely. When you list papers, give the title, the first authors, \
the publication date and the arXiv id.";

/// Fill `{output_dir}` and `{max_results}` into a prompt template
pub fn render(template: &str, config: &Config) -> String {
    template
        .replace("{output_dir}", &config.papers_dir.display().to_string())
        .replace("{max_results}", &config.max_results.to_string())
}

/// The configured prompt file, or the built-in prompt, rendered
pub fn system_prompt(config: &Config) -> anyhow::Result<String> {
    let template = match &config.prompt_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read prompt file {}", path.display()))?,
        None => DEFAULT_PROMPT.to_string(),
    };
    Ok(render(&template, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_prompt_is_rendered() {
        let config = Config {
            papers_dir: PathBuf::from("/srv/papers"),
            max_results: 7,
            ..Config::default()
        };
        let prompt = system_prompt(&config).unwrap();
        assert!(prompt.contains("stored under /srv/papers"));
        assert!(prompt.contains("at most 7 papers"));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn test_prompt_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arxiv.txt");
        std::fs::write(&path, "Save papers to {output_dir}.").unwrap();
        let config = Config {
            prompt_file: Some(path),
            papers_dir: PathBuf::from("/tmp/p"),
            ..Config::default()
        };
        assert_eq!(system_prompt(&config).unwrap(), "Save papers to /tmp/p.");
    }

    #[test]
    fn test_missing_prompt_file_is_an_error() {
        let config = Config {
            prompt_file: Some(PathBuf::from("/nonexistent/papyrus/prompt.txt")),
            ..Config::default()
        };
        let err = system_prompt(&config).unwrap_err();
        assert!(err.to_string().contains("failed to read prompt file"));
    }
}
