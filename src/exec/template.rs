// src/exec/template.rs

//! Basecaller argument template.
//!
//! The template is a single configuration string such as
//! `basecaller {config_path} {input_dir} --output-dir {output_dir}`.
//! It is split on whitespace into argument tokens first and placeholders are
//! substituted per token afterwards, so a substituted path that contains
//! spaces stays a single argument. `{{` and `}}` produce literal braces.

use std::ffi::OsString;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{|\}\}|\{([^{}]*)\}|\{|\}").expect("static template regex")
});

pub const INPUT_DIR: &str = "input_dir";
pub const OUTPUT_DIR: &str = "output_dir";
pub const CONFIG_PATH: &str = "config_path";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown placeholder {{{0}}} in argument template")]
    UnknownPlaceholder(String),

    #[error("unbalanced brace in argument template token {0:?}")]
    UnbalancedBrace(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// Parsed argument template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgTemplate {
    source: String,
    tokens: Vec<Vec<Segment>>,
}

/// Values substituted into the template for one run.
#[derive(Debug, Clone, Copy)]
pub struct TemplateVars<'a> {
    pub input_dir: &'a Path,
    pub output_dir: &'a Path,
    pub config_path: &'a Path,
}

impl TemplateVars<'_> {
    fn lookup(&self, name: &str) -> Option<&Path> {
        match name {
            INPUT_DIR => Some(self.input_dir),
            OUTPUT_DIR => Some(self.output_dir),
            CONFIG_PATH => Some(self.config_path),
            _ => None,
        }
    }
}

impl ArgTemplate {
    /// Parse a template string. Brace balance is checked here; placeholder
    /// names are only checked when rendering.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let tokens = source
            .split_whitespace()
            .map(parse_token)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: source.to_string(),
            tokens,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholder names used by the template, in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().flatten().filter_map(|seg| match seg {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Produce the argument list for one run.
    ///
    /// Paths are substituted as raw OS strings, so names that are not valid
    /// UTF-8 reach the process byte for byte.
    pub fn render(&self, vars: &TemplateVars<'_>) -> Result<Vec<OsString>, TemplateError> {
        self.tokens
            .iter()
            .map(|segments| {
                let mut arg = OsString::new();
                for seg in segments {
                    match seg {
                        Segment::Literal(text) => arg.push(text),
                        Segment::Placeholder(name) => {
                            let path = vars
                                .lookup(name)
                                .ok_or_else(|| TemplateError::UnknownPlaceholder(name.clone()))?;
                            arg.push(path.as_os_str());
                        }
                    }
                }
                Ok(arg)
            })
            .collect()
    }
}

fn parse_token(token: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut last = 0;

    for caps in TOKEN_RE.captures_iter(token) {
        let m = caps.get(0).expect("group 0 always matches");
        literal.push_str(&token[last..m.start()]);
        last = m.end();

        match m.as_str() {
            "{{" => literal.push('{'),
            "}}" => literal.push('}'),
            "{" | "}" => return Err(TemplateError::UnbalancedBrace(token.to_string())),
            _ => {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                let name = caps.get(1).map_or("", |n| n.as_str());
                segments.push(Segment::Placeholder(name.to_string()));
            }
        }
    }

    literal.push_str(&token[last..]);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}
