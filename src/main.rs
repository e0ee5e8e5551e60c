use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use std::sync::Arc;

use complexity_analyzer::models::{ComplexityReport, Dimension};
use complexity_analyzer::{create_provider, AnalysisPipeline, Config, GitHubClient};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Markdown,
}

#[derive(Parser, Debug)]
#[command(name = "complexity-analyzer")]
#[command(version = "0.1.0")]
#[command(about = "Score the code complexity of a GitHub repository with an LLM")]
struct Args {
    /// Repository to analyze (owner/name or GitHub URL)
    repository: String,

    /// LLM provider (anthropic, openai)
    #[arg(short, long)]
    provider: Option<String>,

    /// Model name (defaults to the provider's default)
    #[arg(short, long)]
    model: Option<String>,

    /// Maximum number of files to analyze
    #[arg(long)]
    max_files: Option<usize>,

    /// Glob of paths to exclude (repeatable; replaces the defaults)
    #[arg(short, long)]
    exclude: Vec<String>,

    /// Glob of paths to include (repeatable)
    #[arg(short, long)]
    include: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<String>,

    /// Show a progress bar while scoring
    #[arg(long)]
    progress: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("complexity_analyzer=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();

    let args = Args::parse();
    let Config {
        credentials,
        analysis: mut config,
    } = Config::from_env()?;

    if let Some(provider) = args.provider {
        config.llm_provider = provider;
    }
    if args.model.is_some() {
        config.model = args.model;
    }
    if let Some(max_files) = args.max_files {
        config.max_files = max_files;
    }
    if !args.exclude.is_empty() {
        config.exclude_patterns = args.exclude;
    }
    config.include_patterns = args.include;
    config.show_progress = args.progress;

    config.validate()?;
    let llm = create_provider(&config.llm_provider, config.model.as_deref(), &credentials)?;
    let github = GitHubClient::new(credentials.github_token.as_ref())?;
    let pipeline = AnalysisPipeline::new(Arc::new(github), llm, config)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    tracing::info!("Starting analysis of {}", args.repository);
    let report = pipeline
        .analyze_with_cancel(&args.repository, cancel)
        .await?;

    if report.has_warnings() {
        tracing::warn!(
            "Completed with warnings: {} files skipped",
            report.skipped.len()
        );
        for skipped in &report.skipped {
            tracing::warn!("  {} ({}): {}", skipped.path, skipped.category, skipped.reason);
        }
    }

    let output = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&report)?,
        OutputFormat::Markdown => format_markdown(&report),
        OutputFormat::Text => format_text(&report),
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, &output)?;
        tracing::info!("Output written to: {}", path);
    } else {
        println!("{}", output);
    }

    Ok(())
}

fn format_text(report: &ComplexityReport) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "\n=== Complexity Analysis: {} ===\n\n",
        report.repository
    ));
    output.push_str(&format!(
        "Model: {} ({})\n",
        report.metadata.model, report.metadata.provider
    ));
    output.push_str(&format!(
        "Files analyzed: {}/{}\n",
        report.metadata.analyzed_count, report.metadata.total_files
    ));
    output.push_str(&format!("Overall complexity: {:.1}/100\n", report.score));
    if let Some(top) = report.top_file.as_deref().and_then(|path| report.file(path)) {
        output.push_str(&format!("Most complex file: {}\n", top.path));
        if !top.patterns.is_empty() {
            output.push_str(&format!(
                "Design patterns detected: {}\n",
                top.patterns.join(", ")
            ));
        }
    }

    output.push_str("\nTop Files:\n");
    for file in report.files_above(0.0).iter().take(5) {
        let dims: Vec<_> = file
            .scores
            .iter()
            .map(|s| format!("{} {:.0}", s.dimension, s.value))
            .collect();
        output.push_str(&format!(
            "  - {}: {:.1} ({}; {} lines)\n",
            file.path,
            file.aggregate,
            dims.join(", "),
            file.line_count
        ));
    }

    let distribution = report.pattern_distribution();
    if !distribution.is_empty() {
        output.push_str("\nDesign Patterns:\n");
        for (pattern, count) in distribution.iter().take(10) {
            output.push_str(&format!("  - {}: {} files\n", pattern, count));
        }
    }

    if !report.skipped.is_empty() {
        output.push_str("\nSkipped:\n");
        for skipped in &report.skipped {
            output.push_str(&format!("  - {}: {}\n", skipped.path, skipped.reason));
        }
    }

    let usage = &report.metadata.usage;
    output.push_str(&format!(
        "\nTokens: {} in / {} out over {} requests (~${:.4})\n",
        usage.input_tokens, usage.output_tokens, usage.requests, usage.estimated_cost_usd
    ));
    output.push_str(&format!(
        "Analyzed on: {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    output
}

fn format_markdown(report: &ComplexityReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("# Complexity Analysis: {}\n\n", report.repository));

    output.push_str("## Summary\n\n");
    output.push_str("| Metric | Value |\n|--------|-------|\n");
    output.push_str(&format!("| Overall Score | {:.1} |\n", report.score));
    output.push_str(&format!(
        "| Files Analyzed | {} of {} |\n",
        report.metadata.analyzed_count, report.metadata.total_files
    ));
    output.push_str(&format!("| Chunks | {} |\n", report.metadata.chunk_count));
    output.push_str(&format!(
        "| Model | {} ({}) |\n",
        report.metadata.model, report.metadata.provider
    ));
    output.push_str(&format!(
        "| Estimated Cost | ${:.4} |\n",
        report.metadata.usage.estimated_cost_usd
    ));

    output.push_str("\n## Files\n\n");
    output.push_str("| File | Score | Cyclomatic | Architectural | Algorithmic | Lines | Patterns |\n");
    output.push_str("|------|-------|------------|---------------|-------------|-------|----------|\n");

    let cell = |value: Option<f64>| {
        value
            .map(|v| format!("{:.0}", v))
            .unwrap_or_else(|| "-".to_string())
    };
    for file in report.files_above(0.0) {
        output.push_str(&format!(
            "| `{}` | {:.1} | {} | {} | {} | {} | {} |\n",
            file.path,
            file.aggregate,
            cell(file.score(Dimension::Cyclomatic)),
            cell(file.score(Dimension::Architectural)),
            cell(file.score(Dimension::Algorithmic)),
            file.line_count,
            file.patterns.join(", "),
        ));
    }

    let distribution = report.pattern_distribution();
    if !distribution.is_empty() {
        output.push_str("\n## Design Patterns\n\n");
        output.push_str("| Pattern | Files |\n|---------|-------|\n");
        for (pattern, count) in &distribution {
            output.push_str(&format!("| {} | {} |\n", pattern, count));
        }
    }

    if !report.skipped.is_empty() {
        output.push_str("\n## Skipped\n\n");
        for skipped in &report.skipped {
            output.push_str(&format!(
                "- `{}` ({}): {}\n",
                skipped.path, skipped.category, skipped.reason
            ));
        }
    }

    output.push_str(&format!(
        "\n---\n*Analyzed on {}*\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use complexity_analyzer::models::{FileComplexity, ReportMetadata};

    fn report() -> ComplexityReport {
        let file = |path: &str, aggregate: f64, patterns: &[&str]| FileComplexity {
            path: path.to_string(),
            scores: Vec::new(),
            aggregate,
            chunk_count: 1,
            line_count: 120,
            function_count: Some(4),
            class_count: Some(1),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        };
        ComplexityReport {
            repository: "octo/demo".to_string(),
            analyzed_files: vec![
                file("src/a.rs", 30.0, &["Factory"]),
                file("src/b.rs", 80.0, &["Observer", "Strategy"]),
            ],
            score: 55.0,
            top_file: Some("src/b.rs".to_string()),
            skipped: Vec::new(),
            metadata: ReportMetadata::default(),
            generated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_text_output_names_top_file_patterns() {
        let text = format_text(&report());
        assert!(text.contains("Most complex file: src/b.rs\nDesign patterns detected: Observer, Strategy\n"));
        assert!(text.contains("  - Factory: 1 files\n"));
    }

    #[test]
    fn test_markdown_output_lists_patterns() {
        let markdown = format_markdown(&report());
        assert!(markdown.contains("| `src/b.rs` | 80.0 | - | - | - | 120 | Observer, Strategy |"));
        assert!(markdown.contains("## Design Patterns"));
        assert!(markdown.contains("| Strategy | 1 |"));
    }
}
