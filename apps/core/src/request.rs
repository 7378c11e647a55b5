use std::borrow::Cow;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::special_type::SpecialType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Protocol,
    FileType,
    SpecialType,
    Unknown,
}

/// One parsed invocation. Built by [`Request::parse`] and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub raw_input: String,
    pub kind: RequestKind,
    /// Protocol name, extension without the dot, or special-type name.
    pub type_key: String,
    /// Storage key: `name:` for protocols, `.ext` for files, bare special types.
    pub routing_key: String,
    pub arguments: Vec<String>,
    pub file_path: Option<String>,
}

impl Request {
    /// Total: every input yields a request, falling back to [`RequestKind::Unknown`].
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::unknown(raw);
        }

        if let Some(request) = parse_call_form(raw, trimmed) {
            return request;
        }

        if is_remote_scheme(trimmed) {
            if let Some(request) = parse_uri_form(raw, trimmed) {
                return request;
            }
        }

        if let Some(local) = file_uri_to_path(trimmed) {
            return Self::local_path(raw, local);
        }

        if let Some(request) = parse_uri_form(raw, trimmed) {
            return request;
        }

        if let Some(request) = parse_hash_form(raw, trimmed) {
            return request;
        }

        if let Some(path) = parse_local_path(trimmed) {
            return Self::local_path(raw, path);
        }

        if let Some(special) = SpecialType::from_name(trimmed) {
            let name = special.as_str().to_string();
            return Self {
                raw_input: raw.to_string(),
                kind: RequestKind::SpecialType,
                type_key: name.clone(),
                routing_key: name,
                arguments: Vec::new(),
                file_path: None,
            };
        }

        Self::unknown(raw)
    }

    pub fn is_routable(&self) -> bool {
        !self.routing_key.is_empty()
    }

    /// Whether a handler registered under `key` can service this request:
    /// its own routing key, or the special type its extension belongs to.
    pub fn routes_through(&self, key: &str) -> bool {
        let key = key.trim().to_lowercase();
        if !self.is_routable() {
            return false;
        }
        if key == self.routing_key {
            return true;
        }
        self.extension()
            .and_then(SpecialType::for_extension)
            .is_some_and(|special| special.as_str() == key)
    }

    /// Lowercased extension (without the dot) of a file-type request.
    pub fn extension(&self) -> Option<&str> {
        if self.kind == RequestKind::FileType && !self.type_key.is_empty() {
            Some(&self.type_key)
        } else {
            None
        }
    }

    fn protocol(raw: &str, scheme: &str, arguments: Vec<String>) -> Self {
        let type_key = scheme.to_ascii_lowercase();
        Self {
            raw_input: raw.to_string(),
            kind: RequestKind::Protocol,
            routing_key: format!("{type_key}:"),
            type_key,
            arguments,
            file_path: None,
        }
    }

    fn local_path(raw: &str, path: String) -> Self {
        let (type_key, routing_key) = match file_extension(&path) {
            Some(ext) => {
                let ext = ext.to_ascii_lowercase();
                let routing_key = format!(".{ext}");
                (ext, routing_key)
            }
            None => (String::new(), String::new()),
        };
        Self {
            raw_input: raw.to_string(),
            kind: RequestKind::FileType,
            type_key,
            routing_key,
            arguments: vec![path.clone()],
            file_path: Some(path),
        }
    }

    fn unknown(raw: &str) -> Self {
        Self {
            raw_input: raw.to_string(),
            kind: RequestKind::Unknown,
            type_key: String::new(),
            routing_key: String::new(),
            arguments: Vec::new(),
            file_path: None,
        }
    }
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => chars.all(|c| c.is_ascii_alphanumeric()),
        _ => false,
    }
}

fn is_remote_scheme(input: &str) -> bool {
    input.contains("://") && !starts_with_ignore_case(input, "file://")
}

fn starts_with_ignore_case(input: &str, prefix: &str) -> bool {
    input
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn parse_call_form(raw: &str, input: &str) -> Option<Request> {
    let open = input.find('(')?;
    let body = input.strip_suffix(')')?;
    let name = &input[..open];
    if !is_identifier(name) {
        return None;
    }
    let arguments = split_call_arguments(&body[open + 1..]);
    Some(Request::protocol(raw, name, arguments))
}

fn split_call_arguments(body: &str) -> Vec<String> {
    if body.trim().is_empty() {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in body.chars() {
        match quote {
            Some(q) if ch == q => {
                quote = None;
                current.push(ch);
            }
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                current.push(ch);
            }
            None if ch == ',' => out.push(unquote(std::mem::take(&mut current).trim())),
            None => current.push(ch),
        }
    }
    out.push(unquote(current.trim()));
    out
}

fn unquote(value: &str) -> String {
    for q in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

fn parse_uri_form(raw: &str, input: &str) -> Option<Request> {
    let (scheme, rest) = input.split_once(':')?;
    if !is_identifier(scheme) {
        return None;
    }
    if scheme.len() == 1 && (rest.starts_with('\\') || rest.starts_with('/')) {
        return None;
    }

    let (locator, query) = match rest.split_once('?') {
        Some((locator, query)) => (locator, Some(query)),
        None => (rest, None),
    };

    let path = match locator.strip_prefix("//") {
        // The authority segment names the target host, not an argument.
        Some(hierarchical) => hierarchical
            .split_once('/')
            .map(|(_, path)| path)
            .unwrap_or_default(),
        None => locator,
    };

    let mut arguments = Vec::new();
    let path = path.trim_matches('/');
    if !path.is_empty() {
        arguments.push(percent_decode(path));
    }

    if let Some(query) = query {
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let value = match pair.split_once('=') {
                Some((_, value)) => value,
                None => pair,
            };
            arguments.push(percent_decode(value));
        }
    }

    Some(Request::protocol(raw, scheme, arguments))
}

fn percent_decode(value: &str) -> String {
    urlencoding::decode(value)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| value.to_string())
}

fn parse_hash_form(raw: &str, input: &str) -> Option<Request> {
    let body = input.strip_prefix('#')?;
    let (scheme, rest) = body.split_once('#')?;
    if !is_identifier(scheme) {
        return None;
    }
    Some(Request::protocol(raw, scheme, vec![rest.to_string()]))
}

fn file_uri_to_path(input: &str) -> Option<String> {
    if !starts_with_ignore_case(input, "file://") {
        return None;
    }
    let decoded = percent_decode(&input["file://".len()..]);
    let local = match decoded.strip_prefix('/') {
        Some(rest) if is_drive_path(rest) => rest.to_string(),
        Some(rest) => format!("/{rest}"),
        None if decoded.is_empty() => return None,
        None => format!(r"\\{}", decoded.replace('/', "\\")),
    };
    Some(local)
}

fn is_drive_path(input: &str) -> bool {
    let bytes = input.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

fn is_unc_path(input: &str) -> bool {
    input
        .strip_prefix(r"\\")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c != '\\' && c != '?')
}

fn is_relative_path(input: &str) -> bool {
    ["./", r".\", "../", r"..\"]
        .iter()
        .any(|prefix| input.starts_with(prefix))
}

fn is_rooted_unix_path(input: &str) -> bool {
    input.starts_with('/') && !input.starts_with("//")
}

fn parse_local_path(input: &str) -> Option<String> {
    if is_drive_path(input) || is_unc_path(input) || is_rooted_unix_path(input) {
        return Some(input.to_string());
    }
    if is_relative_path(input) {
        let relative = Path::new(input);
        let absolute = std::path::absolute(relative).unwrap_or_else(|_| PathBuf::from(input));
        return Some(absolute.to_string_lossy().into_owned());
    }
    None
}

fn file_extension(path: &str) -> Option<&str> {
    let file_name = path
        .rsplit(['\\', '/'])
        .next()
        .filter(|name| !name.is_empty())?;
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_alphanumeric()) {
        return None;
    }
    Some(ext)
}
