//! Template resolution for configuration fields.
//!
//! Templates use `${NAME}` tokens. Token names are matched case-insensitively against the
//! closed set of [`Variable`]s; any other name resolves to the literal name itself, so
//! `${Games}` becomes `Games`. List fields (categories, account allow-lists) use the same
//! syntax with one item per token: `${Games}${Emulators}`.
//!
//! Tokens may nest (`${${fuzzyTitle}}`): the outermost token wins and its name may itself contain
//! tokens. Those are only expanded when the caller asks for extra passes through `depth`.

use crate::models::{Configuration, OutputFile};
use camino::Utf8Path;
use indexmap::IndexSet;
use regex::{NoExpand, Regex};
use std::sync::LazyLock;

pub const DEFAULT_LEFT_MARKER: &str = "${";
pub const DEFAULT_RIGHT_MARKER: &str = "}";

static TITLE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\$\{title\}").expect("Invalid title token regex"));

/// Fields that are resolved through the template engine, each with a fixed expansion depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateField {
    Title,
    ExecutableArgs,
    CategoryList,
    AccountList,
    LocalImages,
    LocalIcons,
    OnlineImageQueries,
}

impl TemplateField {
    /// Number of extra passes over the substituted output.
    ///
    /// Only online image queries get one: a query term such as `${fuzzyTitle}` sits inside an
    /// outer `${...}` list shell and must still be expanded after the shell is peeled.
    pub const fn depth(self) -> usize {
        match self {
            TemplateField::OnlineImageQueries => 1,
            TemplateField::Title
            | TemplateField::ExecutableArgs
            | TemplateField::CategoryList
            | TemplateField::AccountList
            | TemplateField::LocalImages
            | TemplateField::LocalIcons => 0,
        }
    }
}

/// The known template variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    Separator,
    ExeDir,
    ExeExt,
    ExeName,
    ExePath,
    FileDir,
    FileExt,
    FileName,
    FilePath,
    FinalTitle,
    FuzzyFinalTitle,
    FuzzyTitle,
    RomDir,
    StartInDir,
    SteamDir,
    Title,
}

impl Variable {
    pub const ALL: [Variable; 16] = [
        Variable::Separator,
        Variable::ExeDir,
        Variable::ExeExt,
        Variable::ExeName,
        Variable::ExePath,
        Variable::FileDir,
        Variable::FileExt,
        Variable::FileName,
        Variable::FilePath,
        Variable::FinalTitle,
        Variable::FuzzyFinalTitle,
        Variable::FuzzyTitle,
        Variable::RomDir,
        Variable::StartInDir,
        Variable::SteamDir,
        Variable::Title,
    ];

    /// Canonical upper-case token name.
    pub const fn name(self) -> &'static str {
        match self {
            Variable::Separator => "/",
            Variable::ExeDir => "EXEDIR",
            Variable::ExeExt => "EXEEXT",
            Variable::ExeName => "EXENAME",
            Variable::ExePath => "EXEPATH",
            Variable::FileDir => "FILEDIR",
            Variable::FileExt => "FILEEXT",
            Variable::FileName => "FILENAME",
            Variable::FilePath => "FILEPATH",
            Variable::FinalTitle => "FINALTITLE",
            Variable::FuzzyFinalTitle => "FUZZYFINALTITLE",
            Variable::FuzzyTitle => "FUZZYTITLE",
            Variable::RomDir => "ROMDIR",
            Variable::StartInDir => "STARTINDIR",
            Variable::SteamDir => "STEAMDIR",
            Variable::Title => "TITLE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.to_uppercase();
        Self::ALL.into_iter().find(|v| v.name() == upper)
    }
}

/// Per-file values the variables resolve against.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariableContext<'a> {
    pub executable_location: &'a str,
    pub start_in_directory: &'a str,
    pub extracted_title: &'a str,
    pub fuzzy_title: &'a str,
    pub final_title: &'a str,
    pub fuzzy_final_title: &'a str,
    pub file_path: &'a str,
    pub rom_directory: &'a str,
    pub steam_directory: &'a str,
}

impl<'a> VariableContext<'a> {
    pub fn new(config: &'a Configuration, file: &'a OutputFile) -> Self {
        Self {
            executable_location: &file.executable_location,
            start_in_directory: &file.start_in_directory,
            extracted_title: &file.extracted_title,
            fuzzy_title: &file.fuzzy_title,
            final_title: &file.final_title,
            fuzzy_final_title: &file.fuzzy_final_title,
            file_path: &file.file_path,
            rom_directory: &config.rom_directory,
            steam_directory: &config.steam_directory,
        }
    }

    pub fn value(&self, variable: Variable) -> String {
        match variable {
            Variable::Separator => std::path::MAIN_SEPARATOR_STR.to_string(),
            Variable::ExeDir => dirname(self.executable_location),
            Variable::ExeExt => extname(self.executable_location),
            Variable::ExeName => stem(self.executable_location),
            Variable::ExePath => self.executable_location.to_string(),
            Variable::FileDir => dirname(self.file_path),
            Variable::FileExt => extname(self.file_path),
            Variable::FileName => stem(self.file_path),
            Variable::FilePath => self.file_path.to_string(),
            Variable::FinalTitle => self.final_title.to_string(),
            Variable::FuzzyFinalTitle => self.fuzzy_final_title.to_string(),
            Variable::FuzzyTitle => self.fuzzy_title.to_string(),
            Variable::RomDir => self.rom_directory.to_string(),
            Variable::StartInDir => self.start_in_directory.to_string(),
            Variable::SteamDir => self.steam_directory.to_string(),
            Variable::Title => self.extracted_title.to_string(),
        }
    }

    /// Value for a raw token name; unknown names come back unchanged.
    pub fn resolve(&self, name: &str) -> String {
        match Variable::from_name(name) {
            Some(variable) => self.value(variable),
            None => name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Token(String),
}

/// Tokenizer and substitution engine for delimiter-bounded variables.
#[derive(Debug, Clone)]
pub struct VariableParser {
    left: String,
    right: String,
    input: String,
    segments: Vec<Segment>,
    max_depth: usize,
}

impl VariableParser {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            input: String::new(),
            segments: Vec::new(),
            max_depth: 0,
        }
    }

    pub fn set_input(&mut self, input: impl Into<String>) -> &mut Self {
        self.input = input.into();
        self.segments.clear();
        self.max_depth = 0;
        self
    }

    /// Tokenize the input. Returns true if at least one token was found.
    ///
    /// `max_depth` is the number of extra passes [`expand`](Self::expand) makes over its own
    /// output.
    pub fn parse(&mut self, max_depth: usize) -> bool {
        self.segments = tokenize(&self.input, &self.left, &self.right);
        self.max_depth = max_depth;
        self.segments
            .iter()
            .any(|segment| matches!(segment, Segment::Token(_)))
    }

    /// Token names in input order, optionally without repeats.
    pub fn get_contents(&self, unique_only: bool) -> Vec<String> {
        let names = self.segments.iter().filter_map(|segment| match segment {
            Segment::Token(name) => Some(name.clone()),
            Segment::Text(_) => None,
        });

        if unique_only {
            names.collect::<IndexSet<_>>().into_iter().collect()
        } else {
            names.collect()
        }
    }

    /// Substitute tokens in order with `values`, which are index-aligned with
    /// `get_contents(false)`. A token without a value keeps its name.
    pub fn replace_variables(&self, values: &[String]) -> String {
        let mut index = 0;
        render(&self.segments, |name| {
            let value = values.get(index).cloned().unwrap_or_else(|| name.to_string());
            index += 1;
            value
        })
    }

    /// Substitute every token through `resolve`, then re-scan the output up to `max_depth`
    /// more times. Stops early once a pass finds no tokens.
    pub fn expand<F>(&self, mut resolve: F) -> String
    where
        F: FnMut(&str) -> String,
    {
        let mut output = render(&self.segments, &mut resolve);

        for _ in 0..self.max_depth {
            let segments = tokenize(&output, &self.left, &self.right);
            if !segments.iter().any(|s| matches!(s, Segment::Token(_))) {
                break;
            }
            output = render(&segments, &mut resolve);
        }

        output
    }
}

impl Default for VariableParser {
    fn default() -> Self {
        Self::new(DEFAULT_LEFT_MARKER, DEFAULT_RIGHT_MARKER)
    }
}

/// Resolve every variable in `input` against `context`, with `depth` extra passes.
pub fn replace_variables(input: &str, context: &VariableContext<'_>, depth: usize) -> String {
    let mut parser = VariableParser::default();
    if parser.set_input(input).parse(depth) {
        parser.expand(|name| context.resolve(name))
    } else {
        input.to_string()
    }
}

/// Apply a title template.
///
/// Every literal `${title}` (case-insensitive) is substituted, nested ones included, so
/// `${${title}}` becomes `${Foo}`. Other tokens stay verbatim.
pub fn replace_title(template: &str, title: &str) -> String {
    TITLE_TOKEN
        .replace_all(template, NoExpand(title))
        .into_owned()
}

/// Split a `${A}${B}` list template into its unique, non-empty items.
pub fn variable_string_to_array(input: &str) -> Vec<String> {
    let mut parser = VariableParser::default();
    if !parser.set_input(input).parse(0) {
        return Vec::new();
    }

    parser
        .get_contents(true)
        .into_iter()
        .filter(|item| !item.is_empty())
        .collect()
}

/// Resolve an online image query template into deduplicated search terms.
///
/// The outer tokens are the terms; each term is then resolved as its own template.
pub fn resolve_query_terms(template: &str, context: &VariableContext<'_>) -> Vec<String> {
    let depth = TemplateField::OnlineImageQueries.depth();
    let mut parser = VariableParser::default();
    if !parser.set_input(template).parse(0) {
        return Vec::new();
    }

    parser
        .get_contents(false)
        .iter()
        .map(|term| replace_variables(term, context, depth))
        .filter(|term| !term.is_empty())
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

fn tokenize(input: &str, left: &str, right: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut rest = input;

    if left.is_empty() || right.is_empty() {
        return vec![Segment::Text(input.to_string())];
    }

    while let Some(open) = rest.find(left) {
        let body = &rest[open + left.len()..];
        match find_close(body, left, right) {
            Some(close) => {
                text.push_str(&rest[..open]);
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Token(body[..close].to_string()));
                rest = &body[close + right.len()..];
            }
            None => {
                // Unterminated marker: keep it as text and keep scanning inside it.
                text.push_str(&rest[..open + left.len()]);
                rest = body;
            }
        }
    }

    text.push_str(rest);
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    segments
}

/// Byte offset of the right marker closing a token body, honoring nested tokens.
fn find_close(body: &str, left: &str, right: &str) -> Option<usize> {
    let mut nesting = 0usize;
    let mut i = 0;

    while i < body.len() {
        let tail = &body[i..];
        if tail.starts_with(left) {
            nesting += 1;
            i += left.len();
        } else if tail.starts_with(right) {
            if nesting == 0 {
                return Some(i);
            }
            nesting -= 1;
            i += right.len();
        } else {
            i += tail.chars().next().map_or(1, char::len_utf8);
        }
    }

    None
}

fn render<F>(segments: &[Segment], mut resolve: F) -> String
where
    F: FnMut(&str) -> String,
{
    let mut output = String::new();
    for segment in segments {
        match segment {
            Segment::Text(text) => output.push_str(text),
            Segment::Token(name) => output.push_str(&resolve(name)),
        }
    }
    output
}

fn dirname(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    match Utf8Path::new(path).parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.to_string(),
        Some(_) => ".".to_string(),
        None => path.to_string(),
    }
}

fn extname(path: &str) -> String {
    Utf8Path::new(path)
        .extension()
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

fn stem(path: &str) -> String {
    Utf8Path::new(path)
        .file_stem()
        .map(str::to_string)
        .unwrap_or_default()
}
