//! Index page template with `{{ name }}` placeholders.

use common::models::RenderView;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_INDEX_TEMPLATE: &str = r#"<html>
   <head><title>Current IP Check</title></head>
   <body>Current IP Address: {{ ip }}<br/> TimeZone: {{ timezone }}<br/></body></html>"#;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template: unclosed placeholder at byte {0}")]
    Unclosed(usize),

    #[error("template: empty placeholder at byte {0}")]
    EmptyPlaceholder(usize),

    #[error("template: can't evaluate field `{0}`")]
    UnknownField(String),

    #[error("template: failed to read {path}: {message}")]
    Read { path: String, message: String },
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Field(String),
}

#[derive(Debug, Clone)]
pub struct IndexTemplate {
    segments: Vec<Segment>,
}

impl IndexTemplate {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                segments.push(Segment::Text(rest[..open].to_string()));
            }
            let after_open = &rest[open + 2..];
            let close = after_open
                .find("}}")
                .ok_or(TemplateError::Unclosed(offset + open))?;
            let name = after_open[..close].trim();
            if name.is_empty() {
                return Err(TemplateError::EmptyPlaceholder(offset + open));
            }
            segments.push(Segment::Field(name.to_string()));

            let consumed = open + 2 + close + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }

        Ok(Self { segments })
    }

    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let source = std::fs::read_to_string(path).map_err(|e| TemplateError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&source)
    }

    pub fn render(&self, view: &RenderView) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Field(name) => {
                    let value =
                        field(view, name).ok_or_else(|| TemplateError::UnknownField(name.clone()))?;
                    escape_into(&mut out, &value);
                }
            }
        }
        Ok(out)
    }
}

impl Default for IndexTemplate {
    fn default() -> Self {
        Self {
            segments: vec![
                Segment::Text(
                    "<html>\n   <head><title>Current IP Check</title></head>\n   <body>Current IP Address: "
                        .to_string(),
                ),
                Segment::Field("ip".to_string()),
                Segment::Text("<br/> TimeZone: ".to_string()),
                Segment::Field("timezone".to_string()),
                Segment::Text("<br/></body></html>".to_string()),
            ],
        }
    }
}

fn field(view: &RenderView, name: &str) -> Option<String> {
    let value = match name {
        "ip" => view.ip.clone(),
        "timezone" => view.timezone_id.clone(),
        "country" => view.country.clone(),
        "city" => view.city.clone(),
        "region" => view.region.clone(),
        "latitude" => view.latitude.to_string(),
        "longitude" => view.longitude.to_string(),
        _ => return None,
    };
    Some(value)
}

fn escape_into(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}
