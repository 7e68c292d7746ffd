//! `{{ ... }}` name templates.
//!
//! A template is literal text with embedded pipelines such as
//! `{{ .Name }}-{{ arg 1 }}-{{ .Args | hash }}`. Each pipeline starts with a
//! value or a function call; every later stage receives the previous result
//! as its final argument.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::NamingError;

const SHORT_HASH_LEN: usize = 7;

/// Inputs available to a template.
#[derive(Debug, Clone, Copy)]
pub struct NamingContext<'a> {
    pub args: &'a [String],
    pub exec_date: NaiveDate,
    pub today: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Pipeline(Vec<Command>),
}

#[derive(Debug, Clone, PartialEq)]
struct Command {
    name: String,
    args: Vec<Token>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(usize),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    List(Vec<String>),
}

impl Value {
    fn into_string(self) -> String {
        match self {
            Value::Str(s) => s,
            Value::List(items) => items.join(" "),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NameTemplate {
    segments: Vec<Segment>,
}

fn expression_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{\{(.*?)\}\}").expect("valid expression regex"))
}

impl NameTemplate {
    pub fn parse(template: &str) -> Result<Self, NamingError> {
        let mut segments = Vec::new();
        let mut last = 0;
        for caps in expression_re().captures_iter(template) {
            let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            push_text(&mut segments, &template[last..whole.start()], last)?;
            segments.push(Segment::Pipeline(parse_pipeline(body.as_str())?));
            last = whole.end();
        }
        push_text(&mut segments, &template[last..], last)?;
        Ok(Self { segments })
    }

    pub fn render(&self, ctx: &NamingContext<'_>) -> Result<String, NamingError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Pipeline(commands) => {
                    out.push_str(&eval_pipeline(commands, ctx)?.into_string())
                }
            }
        }
        if out.trim().is_empty() {
            return Err(NamingError::EmptyName);
        }
        Ok(out)
    }
}

fn push_text(segments: &mut Vec<Segment>, text: &str, offset: usize) -> Result<(), NamingError> {
    if let Some(pos) = text.find("{{") {
        return Err(NamingError::Unterminated(offset + pos));
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text.to_string()));
    }
    Ok(())
}

fn parse_pipeline(body: &str) -> Result<Vec<Command>, NamingError> {
    let mut commands = Vec::new();
    for stage in split_stages(body) {
        let mut tokens = tokenize(stage)?.into_iter();
        let name = match tokens.next() {
            Some(Token::Ident(name)) => name,
            Some(Token::Str(s)) => return Err(NamingError::Unknown(format!("{s:?}"))),
            Some(Token::Int(n)) => return Err(NamingError::Unknown(n.to_string())),
            None => return Err(NamingError::EmptyExpression),
        };
        commands.push(Command {
            name,
            args: tokens.collect(),
        });
    }
    Ok(commands)
}

/// Split on `|` outside of quotes.
fn split_stages(body: &str) -> Vec<&str> {
    let mut stages = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '`') => quote = Some(c),
            (None, '|') => {
                stages.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    stages.push(&body[start..]);
    stages
}

fn tokenize(stage: &str) -> Result<Vec<Token>, NamingError> {
    let mut tokens = Vec::new();
    let mut chars = stage.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' || c == '`' {
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            for (_, ch) in chars.by_ref() {
                if ch == c {
                    closed = true;
                    break;
                }
                value.push(ch);
            }
            if !closed {
                return Err(NamingError::Unterminated(start));
            }
            tokens.push(Token::Str(value));
            continue;
        }
        let mut word = String::new();
        while let Some(&(_, ch)) = chars.peek() {
            if ch.is_whitespace() {
                break;
            }
            word.push(ch);
            chars.next();
        }
        match word.parse::<usize>() {
            Ok(n) => tokens.push(Token::Int(n)),
            Err(_) => tokens.push(Token::Ident(word)),
        }
    }
    Ok(tokens)
}

fn eval_pipeline(commands: &[Command], ctx: &NamingContext<'_>) -> Result<Value, NamingError> {
    let mut piped: Option<Value> = None;
    for command in commands {
        piped = Some(eval_command(command, piped.take(), ctx)?);
    }
    piped.ok_or(NamingError::EmptyExpression)
}

fn eval_command(
    command: &Command,
    piped: Option<Value>,
    ctx: &NamingContext<'_>,
) -> Result<Value, NamingError> {
    let name = command.name.as_str();
    let args = command.args.as_slice();
    let value = match name {
        ".Name" | ".Args" | ".ExecDate" | ".Today" => {
            if !args.is_empty() || piped.is_some() {
                return Err(NamingError::Unknown(format!("{name} with arguments")));
            }
            match name {
                ".Name" => Value::Str(base_name(ctx.args)),
                ".Args" => Value::List(ctx.args.to_vec()),
                ".ExecDate" => Value::Str(ctx.exec_date.format("%Y-%m-%d").to_string()),
                _ => Value::Str(ctx.today.format("%Y-%m-%d").to_string()),
            }
        }
        "arg" => match (args, piped) {
            ([Token::Int(index)], None) => {
                Value::Str(ctx.args.get(*index).cloned().unwrap_or_default())
            }
            _ => {
                return Err(NamingError::BadArguments {
                    func: "arg",
                    expected: "one integer index",
                })
            }
        },
        "last_arg" => {
            if !args.is_empty() || piped.is_some() {
                return Err(NamingError::BadArguments {
                    func: "last_arg",
                    expected: "no arguments",
                });
            }
            Value::Str(ctx.args.last().cloned().unwrap_or_default())
        }
        "env" | "must_env" => {
            let var = match (args, piped) {
                ([Token::Str(var)], None) => var,
                _ => {
                    return Err(NamingError::BadArguments {
                        func: if name == "env" { "env" } else { "must_env" },
                        expected: "one quoted variable name",
                    })
                }
            };
            match std::env::var(var) {
                Ok(v) => Value::Str(v),
                Err(_) if name == "env" => Value::Str(String::new()),
                Err(_) => return Err(NamingError::MissingEnv(var.clone())),
            }
        }
        "date" => match (args, piped) {
            ([], None) => Value::Str(ctx.exec_date.format("%Y-%m-%d").to_string()),
            ([Token::Str(fmt)], None) => Value::Str(ctx.exec_date.format(fmt).to_string()),
            _ => {
                return Err(NamingError::BadArguments {
                    func: "date",
                    expected: "an optional quoted strftime format",
                })
            }
        },
        "hash" | "sha256" | "upper" | "lower" => {
            let input = match (args, piped) {
                ([], Some(value)) => value,
                ([Token::Ident(ident)], None) if ident.starts_with('.') => eval_command(
                    &Command {
                        name: ident.clone(),
                        args: Vec::new(),
                    },
                    None,
                    ctx,
                )?,
                _ => {
                    return Err(NamingError::BadArguments {
                        func: filter_name(name),
                        expected: "a piped value",
                    })
                }
            };
            apply_filter(name, input)
        }
        other => return Err(NamingError::Unknown(other.to_string())),
    };
    Ok(value)
}

fn filter_name(name: &str) -> &'static str {
    match name {
        "hash" => "hash",
        "sha256" => "sha256",
        "upper" => "upper",
        _ => "lower",
    }
}

fn apply_filter(name: &str, input: Value) -> Value {
    let text = input.into_string();
    let out = match name {
        "hash" => {
            let mut digest = sha256_hex(&text);
            digest.truncate(SHORT_HASH_LEN);
            digest
        }
        "sha256" => sha256_hex(&text),
        "upper" => text.to_uppercase(),
        _ => text.to_lowercase(),
    };
    Value::Str(out)
}

fn sha256_hex(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

fn base_name(args: &[String]) -> String {
    args.first()
        .map(|first| {
            std::path::Path::new(first)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| first.clone())
        })
        .unwrap_or_default()
}
