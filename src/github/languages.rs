/// `(extension, language, scored)`. Only `scored` entries are sent for
/// complexity analysis; the rest still get a language hint.
const EXTENSIONS: &[(&str, &str, bool)] = &[
    ("rs", "Rust", true),
    ("py", "Python", true),
    ("pyx", "Python", true),
    ("js", "JavaScript", true),
    ("mjs", "JavaScript", true),
    ("cjs", "JavaScript", true),
    ("jsx", "JavaScript", true),
    ("ts", "TypeScript", true),
    ("tsx", "TypeScript", true),
    ("go", "Go", true),
    ("java", "Java", true),
    ("kt", "Kotlin", true),
    ("kts", "Kotlin", true),
    ("scala", "Scala", true),
    ("c", "C", true),
    ("h", "C", true),
    ("cpp", "C++", true),
    ("cc", "C++", true),
    ("cxx", "C++", true),
    ("hpp", "C++", true),
    ("hxx", "C++", true),
    ("cs", "C#", true),
    ("swift", "Swift", true),
    ("rb", "Ruby", true),
    ("php", "PHP", true),
    ("ex", "Elixir", false),
    ("exs", "Elixir", false),
    ("hs", "Haskell", false),
    ("lua", "Lua", false),
    ("dart", "Dart", false),
    ("zig", "Zig", false),
    ("sh", "Shell", false),
    ("bash", "Shell", false),
    ("sql", "SQL", false),
    ("html", "HTML", false),
    ("css", "CSS", false),
    ("vue", "Vue", false),
    ("svelte", "Svelte", false),
    ("json", "JSON", false),
    ("yaml", "YAML", false),
    ("yml", "YAML", false),
    ("toml", "TOML", false),
    ("xml", "XML", false),
    ("proto", "Protocol Buffers", false),
    ("md", "Markdown", false),
    ("rst", "reStructuredText", false),
    ("txt", "Text", false),
];

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn lookup(path: &str) -> Option<(&'static str, bool)> {
    let name = file_name(path).to_lowercase();
    if name.ends_with(".d.ts") {
        return Some(("TypeScript", false));
    }
    let (_, extension) = name.rsplit_once('.')?;
    EXTENSIONS
        .iter()
        .find(|(ext, _, _)| *ext == extension)
        .map(|(_, lang, scored)| (*lang, *scored))
}

pub fn detect_language(path: &str) -> Option<String> {
    let name = file_name(path).to_lowercase();
    if name == "dockerfile" || name.starts_with("dockerfile.") {
        return Some("Dockerfile".to_string());
    }
    if name == "makefile" || name == "gnumakefile" {
        return Some("Makefile".to_string());
    }
    lookup(path).map(|(lang, _)| lang.to_string())
}

/// Whether a path is a source file worth scoring.
pub fn is_code_file(path: &str) -> bool {
    lookup(path).map(|(_, scored)| scored).unwrap_or(false)
}
