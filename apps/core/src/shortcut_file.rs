use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One installed-application shortcut found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutEntry {
    pub name: String,
    /// The shortcut file itself; opening it launches the application.
    pub shortcut_path: PathBuf,
    pub target_path: String,
    pub launch_arguments: String,
    pub icon_locator: Option<String>,
    pub cached_icon_path: Option<PathBuf>,
}

/// Reads shortcut files. Implementations may depend on shell objects that are
/// bound to the thread they were created on, so the index only ever calls a
/// reader from its dedicated worker thread.
pub trait ShortcutReader: Send + 'static {
    fn is_shortcut(&self, path: &Path) -> bool;
    fn read(&self, path: &Path) -> Option<ShortcutEntry>;
}

/// Understands `.lnk`, `.url` and `.desktop` files without any shell APIs.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileShortcutReader;

impl ShortcutReader for FileShortcutReader {
    fn is_shortcut(&self, path: &Path) -> bool {
        matches!(
            extension_lowercase(path).as_deref(),
            Some("lnk" | "url" | "desktop")
        )
    }

    fn read(&self, path: &Path) -> Option<ShortcutEntry> {
        match extension_lowercase(path)?.as_str() {
            "lnk" => read_shell_link(path),
            "url" => read_internet_shortcut(path),
            "desktop" => read_desktop_entry(path),
            _ => None,
        }
    }
}

fn extension_lowercase(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::trim)
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
}

fn read_shell_link(path: &Path) -> Option<ShortcutEntry> {
    let bytes = std::fs::read(path).ok()?;
    let link = parse_shell_link(&bytes)?;
    let target = link
        .target
        .or_else(|| {
            let relative = link.relative_path?;
            let base = path.parent()?;
            Some(base.join(relative).to_string_lossy().into_owned())
        })
        .unwrap_or_default();

    Some(ShortcutEntry {
        name: file_stem(path)?,
        shortcut_path: path.to_path_buf(),
        target_path: target,
        launch_arguments: link.arguments.unwrap_or_default(),
        icon_locator: link.icon_location.map(|icon| expand_env_vars(&icon)),
        cached_icon_path: None,
    })
}

fn read_internet_shortcut(path: &Path) -> Option<ShortcutEntry> {
    let raw = std::fs::read_to_string(path).ok()?;
    let section = ini_section(&raw, "InternetShortcut");
    let url = ini_value(&section, "URL")?;

    Some(ShortcutEntry {
        name: file_stem(path)?,
        shortcut_path: path.to_path_buf(),
        target_path: url.to_string(),
        launch_arguments: String::new(),
        icon_locator: ini_value(&section, "IconFile").map(str::to_string),
        cached_icon_path: None,
    })
}

fn read_desktop_entry(path: &Path) -> Option<ShortcutEntry> {
    let raw = std::fs::read_to_string(path).ok()?;
    let section = ini_section(&raw, "Desktop Entry");
    let hidden = ["NoDisplay", "Hidden"]
        .iter()
        .any(|key| ini_value(&section, key).is_some_and(|v| v.eq_ignore_ascii_case("true")));
    if hidden {
        return None;
    }

    let exec = ini_value(&section, "Exec")?;
    let mut tokens = exec
        .split_whitespace()
        .filter(|token| !is_field_code(token))
        .map(|token| token.trim_matches('"'));
    let target = tokens.next()?.to_string();
    let arguments = tokens.collect::<Vec<_>>().join(" ");

    let name = ini_value(&section, "Name")
        .map(str::to_string)
        .or_else(|| file_stem(path))?;

    Some(ShortcutEntry {
        name,
        shortcut_path: path.to_path_buf(),
        target_path: target,
        launch_arguments: arguments,
        icon_locator: ini_value(&section, "Icon").map(str::to_string),
        cached_icon_path: None,
    })
}

fn is_field_code(token: &str) -> bool {
    token.len() == 2 && token.starts_with('%')
}

/// Lines belonging to `[name]`, without comments.
fn ini_section<'a>(raw: &'a str, name: &str) -> Vec<&'a str> {
    let mut inside = false;
    let mut lines = Vec::new();
    for line in raw.lines().map(str::trim) {
        if line.starts_with('[') && line.ends_with(']') {
            inside = line[1..line.len() - 1].trim().eq_ignore_ascii_case(name);
            continue;
        }
        if inside && !line.is_empty() && !line.starts_with('#') && !line.starts_with(';') {
            lines.push(line);
        }
    }
    lines
}

fn ini_value<'a>(lines: &[&'a str], key: &str) -> Option<&'a str> {
    lines.iter().find_map(|line| {
        let (k, v) = line.split_once('=')?;
        (k.trim() == key)
            .then(|| v.trim())
            .filter(|v| !v.is_empty())
    })
}

/// Expands `%NAME%` references that are set in the environment.
fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('%') {
            Some(end) => {
                let name = &after[..end];
                match std::env::var(name) {
                    Ok(value) if !name.is_empty() => out.push_str(&value),
                    _ => {
                        out.push('%');
                        out.push_str(name);
                        out.push('%');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

const LINK_HEADER_SIZE: usize = 0x4C;
const HAS_TARGET_ID_LIST: u32 = 0x01;
const HAS_LINK_INFO: u32 = 0x02;
const HAS_NAME: u32 = 0x04;
const HAS_RELATIVE_PATH: u32 = 0x08;
const HAS_WORKING_DIR: u32 = 0x10;
const HAS_ARGUMENTS: u32 = 0x20;
const HAS_ICON_LOCATION: u32 = 0x40;
const IS_UNICODE: u32 = 0x80;
const VOLUME_ID_AND_LOCAL_BASE_PATH: u32 = 0x01;

#[derive(Debug, Default, PartialEq, Eq)]
struct ShellLink {
    target: Option<String>,
    relative_path: Option<String>,
    arguments: Option<String>,
    icon_location: Option<String>,
}

/// Decodes the parts of a Shell Link (.lnk) file a launcher needs.
fn parse_shell_link(bytes: &[u8]) -> Option<ShellLink> {
    if u32_at(bytes, 0)? as usize != LINK_HEADER_SIZE {
        return None;
    }
    let flags = u32_at(bytes, 20)?;
    let mut offset = LINK_HEADER_SIZE;
    let mut link = ShellLink::default();

    if flags & HAS_TARGET_ID_LIST != 0 {
        offset += 2 + u16_at(bytes, offset)? as usize;
    }

    if flags & HAS_LINK_INFO != 0 {
        link.target = link_info_target(bytes, offset);
        offset += u32_at(bytes, offset)? as usize;
    }

    let unicode = flags & IS_UNICODE != 0;
    let mut next_string = |present: bool| -> Option<Option<String>> {
        if !present {
            return Some(None);
        }
        read_counted_string(bytes, &mut offset, unicode).map(Some)
    };

    // Description and working directory are skipped over, not kept.
    next_string(flags & HAS_NAME != 0)?;
    link.relative_path = next_string(flags & HAS_RELATIVE_PATH != 0)?;
    next_string(flags & HAS_WORKING_DIR != 0)?;
    link.arguments = next_string(flags & HAS_ARGUMENTS != 0)?;
    link.icon_location = next_string(flags & HAS_ICON_LOCATION != 0)?;
    Some(link)
}

fn link_info_target(bytes: &[u8], start: usize) -> Option<String> {
    let header_size = u32_at(bytes, start + 4)?;
    let info_flags = u32_at(bytes, start + 8)?;
    if info_flags & VOLUME_ID_AND_LOCAL_BASE_PATH == 0 {
        return None;
    }

    let unicode_offsets = if header_size >= 0x24 {
        Some((u32_at(bytes, start + 28)?, u32_at(bytes, start + 32)?))
    } else {
        None
    };

    let (base, suffix) = match unicode_offsets {
        Some((base, suffix)) if base != 0 => (
            utf16_z_at(bytes, start + base as usize)?,
            utf16_z_at(bytes, start + suffix as usize).unwrap_or_default(),
        ),
        _ => (
            ansi_z_at(bytes, start + u32_at(bytes, start + 16)? as usize)?,
            ansi_z_at(bytes, start + u32_at(bytes, start + 24)? as usize).unwrap_or_default(),
        ),
    };

    let target = format!("{base}{suffix}");
    (!target.is_empty()).then_some(target)
}

fn read_counted_string(bytes: &[u8], offset: &mut usize, unicode: bool) -> Option<String> {
    let count = u16_at(bytes, *offset)? as usize;
    *offset += 2;
    let len = if unicode { count * 2 } else { count };
    let raw = bytes.get(*offset..*offset + len)?;
    *offset += len;
    Some(if unicode {
        decode_utf16(raw)
    } else {
        String::from_utf8_lossy(raw).into_owned()
    })
}

fn u16_at(bytes: &[u8], offset: usize) -> Option<u16> {
    let raw = bytes.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([raw[0], raw[1]]))
}

fn u32_at(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

fn ansi_z_at(bytes: &[u8], offset: usize) -> Option<String> {
    let tail = bytes.get(offset..)?;
    let end = tail.iter().position(|b| *b == 0)?;
    Some(String::from_utf8_lossy(&tail[..end]).into_owned())
}

fn utf16_z_at(bytes: &[u8], offset: usize) -> Option<String> {
    let tail = bytes.get(offset..)?;
    let end = tail
        .chunks_exact(2)
        .position(|pair| pair == [0, 0])?;
    Some(decode_utf16(&tail[..end * 2]))
}

fn decode_utf16(raw: &[u8]) -> String {
    let wide: Vec<u16> = raw
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&wide)
}
